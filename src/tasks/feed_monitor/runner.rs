use crate::config::{AppConfig, DeliveryMode};
use crate::db::DbPool;
use crate::errors::AppResult;
use crate::feed::{fetch_all, FetchFeed, FetchedItem, NormalizedItem};
use crate::log_error_with_context;
use crate::models::news_item::NewNewsItem;
use crate::models::purged_link::PurgedLink;
use crate::models::read_marker::ReadMarker;
use crate::models::settings::{Setting, LAST_INGEST_AT};
use crate::models::source::Source;
use crate::models::subscription::Subscription;
use crate::tasks::scheduler::{run_every, Shutdown};
use crate::telegram::{Messenger, Outgoing};
use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use std::sync::Arc;

/// What one ingestion cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub sources: usize,
    pub failed_sources: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub stale: usize,
    pub delivered: usize,
}

pub async fn start<F, M>(
    pool: DbPool,
    fetcher: Arc<F>,
    messenger: Arc<M>,
    config: Arc<AppConfig>,
    shutdown: Shutdown,
) where
    F: FetchFeed + Send + Sync + 'static,
    M: Messenger + 'static,
{
    run_every("feed_monitor", config.poll_interval, shutdown, || {
        let pool = pool.clone();
        let fetcher = fetcher.clone();
        let messenger = messenger.clone();
        let config = config.clone();
        async move {
            if let Err(e) = run_cycle(&pool, fetcher.as_ref(), messenger.as_ref(), &config, Utc::now()).await {
                log_error_with_context!(e, { "task": "feed_monitor" });
            }
        }
    })
    .await
}

/// Fetches every source once, in order, then stores each source's items.
/// A source that fails to fetch or persist is logged and skipped; the cycle
/// itself only fails when the store is unreachable.
pub async fn run_cycle<F, M>(
    pool: &DbPool,
    fetcher: &F,
    messenger: &M,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> AppResult<IngestReport>
where
    F: FetchFeed,
    M: Messenger,
{
    let sources = {
        let mut conn = pool.get()?;
        Source::list(&mut conn)?
    };
    if sources.is_empty() {
        log::info!("No sources found");
    }

    let batch = fetch_all(fetcher, &sources).await;
    let mut report = IngestReport {
        sources: sources.len(),
        failed_sources: batch.failed.len(),
        fetched: batch.items.len(),
        ..Default::default()
    };

    let cutoff = now - config.retention;
    for group in batch.items.chunk_by(|a, b| a.source_url == b.source_url) {
        let url = group[0].source_url.as_str();
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("Error getting DB connection: {e:?}");
                report.failed_sources += 1;
                continue;
            }
        };

        let (fresh, stale): (Vec<&FetchedItem>, Vec<&FetchedItem>) =
            group.iter().partition(|f| f.item.published_at >= cutoff);
        report.stale += stale.len();

        let new_items = persist(&mut conn, url, &fresh, now);
        report.inserted += new_items.len();
        if new_items.is_empty() {
            continue;
        }

        let subscribers = match Subscription::subscribers_of(&mut conn, url) {
            Ok(subscribers) => subscribers,
            Err(e) => {
                log::warn!("Error getting subscribers of {url}: {e:?}");
                continue;
            }
        };
        match config.delivery_mode {
            DeliveryMode::Pull => log::debug!(
                "{} new items from {url} waiting for {} subscribers",
                new_items.len(),
                subscribers.len()
            ),
            DeliveryMode::Push => {
                report.delivered += push(&mut conn, messenger, &subscribers, &new_items).await;
            }
        }
    }

    let mut conn = pool.get()?;
    Setting::set_timestamp(&mut conn, LAST_INGEST_AT, now.timestamp())?;

    tracing::info!(
        sources = report.sources,
        failed = report.failed_sources,
        fetched = report.fetched,
        inserted = report.inserted,
        stale = report.stale,
        delivered = report.delivered,
        "Ingestion cycle finished"
    );
    Ok(report)
}

/// Stores the items and returns the ones that were not known before. Links
/// the retention sweep already removed are not stored again.
fn persist<'a>(
    conn: &mut SqliteConnection,
    source_url: &str,
    items: &[&'a FetchedItem],
    now: DateTime<Utc>,
) -> Vec<&'a NormalizedItem> {
    let mut added = Vec::new();
    for &fetched in items {
        let item = &fetched.item;
        match PurgedLink::seen_again(conn, &item.link, now) {
            Ok(true) => {
                log::debug!("Item was purged before: {:?}", item.link);
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("Error checking purged links for {}: {e:?}", item.link);
                continue;
            }
        }
        match NewNewsItem::from_normalized(item, source_url).ingest(conn) {
            Ok(true) => added.push(item),
            Ok(false) => log::debug!("Item already exists: {:?}", item.link),
            Err(e) => log::warn!("Error inserting item {}: {e:?}", item.link),
        }
    }
    log::info!("Added {} of {} items from {source_url}", added.len(), items.len());
    added
}

pub fn format_push(item: &NormalizedItem) -> Outgoing {
    Outgoing::plain(format!("📰 {}\n🔗 {}", item.title, item.link))
}

async fn push<M: Messenger>(
    conn: &mut SqliteConnection,
    messenger: &M,
    subscribers: &[i64],
    items: &[&NormalizedItem],
) -> usize {
    let mut delivered = 0;
    for &user_id in subscribers {
        for item in items {
            if let Err(e) = messenger.send(user_id, format_push(item)).await {
                log::warn!("Error delivering {} to {user_id}: {e}", item.link);
                continue;
            }
            delivered += 1;
            if let Err(e) = ReadMarker::mark_read(conn, user_id, &item.link) {
                log::warn!("Error marking {} read for {user_id}: {e:?}", item.link);
            }
        }
    }
    delivered
}
