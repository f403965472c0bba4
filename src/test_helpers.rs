use crate::config::AppConfig;
use crate::db::{ConnectionOptions, DbPool, MIGRATIONS};
use crate::models::source::Source;
use crate::models::user::User;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::MigrationHarness;
use std::time::Duration;
use tempfile::TempDir;

/// Create a test database with a temporary file
pub fn create_test_db() -> (TempDir, DbPool) {
    create_test_db_with_timeout(Duration::from_secs(30))
}

/// Like [`create_test_db`], but waiting at most `timeout` for the single
/// pooled connection.
pub fn create_test_db_with_timeout(timeout: Duration) -> (TempDir, DbPool) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let database_url = db_path.display().to_string();

    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .connection_timeout(timeout)
        .connection_customizer(Box::new(ConnectionOptions::default()))
        .build(manager)
        .expect("Failed to create pool");

    // Run migrations
    let mut conn = pool.get().expect("Failed to get connection");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

/// Create an in-memory test database connection
pub fn get_test_db_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:")
        .unwrap_or_else(|_| panic!("Error connecting to in-memory SQLite database"));

    ConnectionOptions::default()
        .apply(&mut conn)
        .expect("Failed to enable foreign keys");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");
    conn
}

pub const TEST_ADMIN: i64 = 1;

/// Defaults with a single admin and UTC as the local timezone
pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "BOT_TOKEN" => Some("123456:test-token".to_string()),
        "ADMIN_IDS" => Some(TEST_ADMIN.to_string()),
        "TIMEZONE" => Some("UTC".to_string()),
        _ => None,
    })
    .expect("Failed to build test config")
}

/// Registers a user subscribed to the given sources, creating the sources.
pub fn seed_subscriber(conn: &mut SqliteConnection, user_id: i64, sources: &[&str]) {
    User::ensure(conn, user_id).expect("Failed to create user");
    for url in sources {
        Source::upsert(conn, url, None).expect("Failed to create source");
        crate::models::subscription::Subscription::subscribe(conn, user_id, url)
            .expect("Failed to subscribe");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_db() {
        let (_temp_dir, pool) = create_test_db();
        let mut conn = pool.get().expect("Failed to get connection");

        let count: i64 = crate::schema::users::table
            .count()
            .get_result(&mut conn)
            .expect("Failed to query test database");

        assert_eq!(count, 0);
    }

    #[test]
    fn test_seed_subscriber() {
        let mut conn = get_test_db_connection();
        seed_subscriber(&mut conn, 7, &["https://a.example/rss", "https://b.example/rss"]);
        let sources =
            crate::models::subscription::Subscription::list_user_sources(&mut conn, 7).unwrap();
        assert_eq!(sources.len(), 2);
    }
}
