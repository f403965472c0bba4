//! Chat-facing side of the bot: command parsing, per-chat session state,
//! news pagination and the handler tying them to the store.

pub mod autopost;
pub mod callback;
pub mod commands;
pub mod handler;
pub mod pagination;
pub mod session;

pub use handler::{BotHandler, CallbackContext};
