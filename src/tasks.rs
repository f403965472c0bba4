//! Background loops running next to the update dispatcher.

pub mod autopost;
pub mod feed_monitor;
pub mod retention;
pub mod scheduler;
pub mod types;

pub use scheduler::{run_every, shutdown_channel, Shutdown};
