pub mod client;
pub mod dispatcher;
pub mod types;

pub use client::{Messenger, TelegramMessenger};
pub use types::{Button, Keyboard, Outgoing};
