pub mod starboard_message;
