pub mod bot;
pub mod config;
pub mod db;
pub mod errors;
pub mod feed;
pub mod models;
pub mod observability;
pub mod schema;
pub mod tasks;
pub mod telegram;
#[cfg(test)]
pub mod test_helpers;

pub use db::DbPool;
