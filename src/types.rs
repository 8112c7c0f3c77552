use std::sync::Arc;

use crate::helpers::starboard_manager::Starboard;

pub struct Data {
    pub starboard: Arc<Starboard>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Context<'a> = poise::Context<'a, Data, Error>;
