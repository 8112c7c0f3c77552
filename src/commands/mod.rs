pub mod starboard;

use poise::Command;

use crate::types::{Data, Error};

pub fn all_commands() -> Vec<Command<Data, Error>> {
    vec![starboard::starboard()]
}
