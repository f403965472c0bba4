use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::AppResult;
use crate::log_error_with_context;
use crate::models::news_item::NewsItem;
use crate::models::purged_link::PurgedLink;
use crate::models::settings::{Setting, LAST_RETENTION_SWEEP_AT};
use crate::tasks::scheduler::{run_every, Shutdown};
use crate::tasks::types::RETENTION_CHECK_INTERVAL;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Purged(usize),
    /// the previous sweep is more recent than the horizon
    Skipped,
}

pub async fn start(pool: DbPool, config: Arc<AppConfig>, shutdown: Shutdown) {
    run_every("retention", RETENTION_CHECK_INTERVAL, shutdown, || {
        let pool = pool.clone();
        let config = config.clone();
        async move {
            if let Err(e) = sweep(&pool, &config, Utc::now()) {
                log_error_with_context!(e, { "task": "retention" });
            }
        }
    })
    .await
}

/// Deletes news published before `now - retention`. Read markers of the
/// deleted items cascade with them; their links are kept as tombstones until
/// no feed has listed them for a whole horizon.
pub fn sweep(pool: &DbPool, config: &AppConfig, now: DateTime<Utc>) -> AppResult<SweepOutcome> {
    let mut conn = pool.get()?;

    if let Some(last) = Setting::get_timestamp(&mut conn, LAST_RETENTION_SWEEP_AT)? {
        // ticks drift against the wall clock; one landing a little early
        // must not push the purge back a whole horizon
        let due_after = config.retention.num_seconds() - (RETENTION_CHECK_INTERVAL.as_secs() / 2) as i64;
        if now.timestamp() - last < due_after {
            log::debug!("Retention sweep skipped, last one ran at {last}");
            return Ok(SweepOutcome::Skipped);
        }
    }

    let cutoff = now - config.retention;
    let purged = NewsItem::purge_older_than(&mut conn, cutoff, now)?;
    let forgotten = PurgedLink::forget_unseen_since(&mut conn, cutoff)?;
    Setting::set_timestamp(&mut conn, LAST_RETENTION_SWEEP_AT, now.timestamp())?;

    tracing::info!(purged, forgotten, cutoff = %cutoff, "Retention sweep finished");
    Ok(SweepOutcome::Purged(purged))
}
