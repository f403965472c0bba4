pub mod autopost;
pub mod news_item;
pub mod purged_link;
pub mod read_marker;
pub mod settings;
pub mod source;
pub mod subscription;
pub mod user;

/// Current time as Unix seconds, the representation used by every table.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
