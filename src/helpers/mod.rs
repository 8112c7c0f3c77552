pub mod client;
pub mod config_store;
pub mod content;
pub mod eligibility;
pub mod error;
pub mod post_index;
pub mod starboard;
pub mod starboard_manager;
pub mod threshold;
