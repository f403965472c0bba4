use crate::errors::{AppError, AppResult};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Applied to every pooled connection: SQLite keeps foreign key enforcement
/// off unless asked, and the cascades in the schema depend on it.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

impl ConnectionOptions {
    pub fn apply(&self, conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        self.apply(conn).map_err(r2d2::Error::QueryError)
    }
}

pub fn initialize_db_pool(database_url: &str) -> AppResult<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions::default()))
        .build(manager)
        .map_err(|e| AppError::config(format!("cannot open database {database_url}: {e}")))
}

pub fn run_migrations(pool: &DbPool) -> AppResult<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| AppError::config(format!("failed to run migrations: {e}")))?;
    tracing::info!(count = applied.len(), "Database migrations applied");
    Ok(())
}
