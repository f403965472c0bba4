use crate::bot::pagination::news_line;
use crate::config::{AppConfig, DigestMode};
use crate::db::DbPool;
use crate::errors::AppResult;
use crate::log_error_with_context;
use crate::models::autopost::AutopostSchedule;
use crate::models::news_item::NewsItem;
use crate::models::read_marker::ReadMarker;
use crate::tasks::scheduler::{run_every, Shutdown};
use crate::tasks::types::AUTOPOST_CHECK_INTERVAL;
use crate::telegram::{Messenger, Outgoing};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::SqliteConnection;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Users already served in the current local minute. Ticks that land in the
/// same minute twice must not deliver a second digest.
#[derive(Debug, Default)]
pub struct FiredSlots {
    minute: String,
    users: HashSet<i64>,
}

impl FiredSlots {
    /// `true` the first time `user_id` is claimed for `minute`.
    pub fn claim(&mut self, minute: &str, user_id: i64) -> bool {
        if self.minute != minute {
            self.minute = minute.to_string();
            self.users.clear();
        }
        self.users.insert(user_id)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub due: usize,
    pub sent: usize,
    pub empty: usize,
    pub failed: usize,
}

pub async fn start<M>(pool: DbPool, messenger: Arc<M>, config: Arc<AppConfig>, shutdown: Shutdown)
where
    M: Messenger + 'static,
{
    let fired = Arc::new(Mutex::new(FiredSlots::default()));
    run_every("autopost", AUTOPOST_CHECK_INTERVAL, shutdown, || {
        let pool = pool.clone();
        let messenger = messenger.clone();
        let config = config.clone();
        let fired = fired.clone();
        async move {
            let mut fired = fired.lock().await;
            if let Err(e) = run_tick(&pool, messenger.as_ref(), &config, &mut fired, Utc::now()).await {
                log_error_with_context!(e, { "task": "autopost" });
            }
        }
    })
    .await
}

/// Sends a digest to every user with an autopost time equal to the current
/// local "HH:MM", at most once per user and minute.
pub async fn run_tick<M: Messenger>(
    pool: &DbPool,
    messenger: &M,
    config: &AppConfig,
    fired: &mut FiredSlots,
    now: DateTime<Utc>,
) -> AppResult<DigestReport> {
    let local = now.with_timezone(&config.timezone);
    let time = local.format("%H:%M").to_string();
    let minute = local.format("%Y-%m-%d %H:%M").to_string();

    let schedules = {
        let mut conn = pool.get()?;
        AutopostSchedule::all(&mut conn)?
    };
    let due: Vec<i64> = schedules
        .into_iter()
        .filter(|(_, times)| times.contains(&time))
        .map(|(user_id, _)| user_id)
        .collect();

    let mut report = DigestReport::default();
    for user_id in due {
        if !fired.claim(&minute, user_id) {
            log::debug!("Digest for {user_id} already handled at {minute}");
            continue;
        }
        report.due += 1;

        let items = match pool.get() {
            Ok(mut conn) => match digest_items(&mut conn, user_id, config, now) {
                Ok(items) => items,
                Err(e) => {
                    log::warn!("Error collecting digest for {user_id}: {e:?}");
                    report.failed += 1;
                    continue;
                }
            },
            Err(e) => {
                log::error!("Error getting DB connection: {e:?}");
                report.failed += 1;
                continue;
            }
        };
        if items.is_empty() {
            log::debug!("Nothing to send to {user_id} at {time}");
            report.empty += 1;
            continue;
        }

        if let Err(e) = messenger
            .send(user_id, format_digest(&items, &time, config.timezone))
            .await
        {
            log::warn!("Error sending digest to {user_id}: {e}");
            report.failed += 1;
            continue;
        }
        report.sent += 1;
        log::info!("Digest with {} items sent to {user_id}", items.len());

        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("Error getting DB connection to mark digest for {user_id} read: {e:?}");
                report.failed += 1;
                continue;
            }
        };
        for item in &items {
            if let Err(e) = ReadMarker::mark_read(&mut conn, user_id, &item.link) {
                log::warn!("Error marking {} read for {user_id}: {e:?}", item.link);
            }
        }
    }

    if report.due > 0 {
        tracing::info!(
            time = %time,
            due = report.due,
            sent = report.sent,
            empty = report.empty,
            failed = report.failed,
            "Autopost tick finished"
        );
    }
    Ok(report)
}

fn digest_items(
    conn: &mut SqliteConnection,
    user_id: i64,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<Vec<NewsItem>, diesel::result::Error> {
    match config.digest_mode {
        DigestMode::Unread => NewsItem::unread_for(conn, user_id, config.digest_limit),
        DigestMode::Recent => {
            let mut items = NewsItem::recent_since(conn, user_id, now - config.retention)?;
            items.truncate(config.digest_limit as usize);
            Ok(items)
        }
    }
}

pub fn format_digest(items: &[NewsItem], time: &str, tz: Tz) -> Outgoing {
    let lines: Vec<String> = items.iter().map(|item| news_line(item, tz)).collect();
    Outgoing::html(format!(
        "🗞 <b>Your news digest</b> ({time})\n\n{}",
        lines.join("\n\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NormalizedItem;
    use crate::models::news_item::NewNewsItem;
    use crate::telegram::client::tests::RecordingMessenger;
    use crate::errors::AppError;
    use crate::test_helpers::{create_test_db, create_test_db_with_timeout, seed_subscriber, test_config};
    use chrono::TimeZone;
    use diesel::r2d2::{ConnectionManager, PooledConnection};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    const SRC: &str = "https://a.example/rss";

    /// 09:00 in Moscow
    fn nine_msk() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    fn moscow_config() -> AppConfig {
        let mut config = test_config();
        config.timezone = chrono_tz::Europe::Moscow;
        config
    }

    fn seed(pool: &DbPool, user_id: i64, times: &[&str], items: u32) {
        let mut conn = pool.get().unwrap();
        seed_subscriber(&mut conn, user_id, &[SRC]);
        AutopostSchedule::set(&mut conn, user_id, times).unwrap();
        for i in 0..items {
            let item = NormalizedItem {
                title: format!("News {i}"),
                link: format!("https://a.example/{i}"),
                published_at: nine_msk() - chrono::Duration::minutes(i as i64 + 1),
            };
            NewNewsItem::from_normalized(&item, SRC).ingest(&mut conn).unwrap();
        }
    }

    #[test]
    fn test_claim_resets_each_minute() {
        let mut fired = FiredSlots::default();
        assert!(fired.claim("2024-05-01 09:00", 1));
        assert!(!fired.claim("2024-05-01 09:00", 1));
        assert!(fired.claim("2024-05-01 09:00", 2));
        assert!(fired.claim("2024-05-01 09:01", 1));
    }

    #[tokio::test]
    async fn test_digest_fires_at_local_time_and_marks_read() {
        let (_dir, pool) = create_test_db();
        seed(&pool, 10, &["09:00"], 3);
        seed(&pool, 11, &["10:00"], 0);
        let messenger = RecordingMessenger::default();
        let config = moscow_config();
        let mut fired = FiredSlots::default();

        let report = run_tick(&pool, &messenger, &config, &mut fired, nine_msk()).await.unwrap();

        assert_eq!(report, DigestReport { due: 1, sent: 1, empty: 0, failed: 0 });
        let digest = messenger.last_text(10);
        assert!(digest.contains("(09:00)"));
        assert!(digest.contains("News 0"));
        assert!(messenger.sent_to(11).is_empty());

        let mut conn = pool.get().unwrap();
        assert!(NewsItem::unread_for(&mut conn, 10, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_minute_is_delivered_once() {
        let (_dir, pool) = create_test_db();
        seed(&pool, 10, &["09:00"], 2);
        let messenger = RecordingMessenger::default();
        let mut config = moscow_config();
        // recent digests ignore read markers, so only the minute guard stops a repeat
        config.digest_mode = DigestMode::Recent;
        let mut fired = FiredSlots::default();

        run_tick(&pool, &messenger, &config, &mut fired, nine_msk()).await.unwrap();
        let again = nine_msk() + chrono::Duration::seconds(40);
        let report = run_tick(&pool, &messenger, &config, &mut fired, again).await.unwrap();

        assert_eq!(report.due, 0);
        assert_eq!(messenger.sent_to(10).len(), 1);

        let next_day = nine_msk() + chrono::Duration::days(1);
        let report = run_tick(&pool, &messenger, &config, &mut fired, next_day).await.unwrap();
        // the items are older than the retention window by then
        assert_eq!(report.empty, 1);
    }

    #[tokio::test]
    async fn test_digest_is_limited_and_skipped_when_empty() {
        let (_dir, pool) = create_test_db();
        seed(&pool, 10, &["09:00"], 12);
        let messenger = RecordingMessenger::default();
        let mut config = moscow_config();
        config.digest_limit = 5;
        let mut fired = FiredSlots::default();

        run_tick(&pool, &messenger, &config, &mut fired, nine_msk()).await.unwrap();
        assert_eq!(messenger.last_text(10).matches("<a href").count(), 5);

        let mut conn = pool.get().unwrap();
        assert_eq!(NewsItem::unread_for(&mut conn, 10, 100).unwrap().len(), 7);
        drop(conn);

        // once the leftovers are read there is nothing to send
        let mut fired = FiredSlots::default();
        let mut conn = pool.get().unwrap();
        for link in (5..12).map(|i| format!("https://a.example/{i}")) {
            ReadMarker::mark_read(&mut conn, 10, &link).unwrap();
        }
        drop(conn);
        let report = run_tick(&pool, &messenger, &config, &mut fired, nine_msk()).await.unwrap();
        assert_eq!(report.empty, 1);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_items_unread() {
        let (_dir, pool) = create_test_db();
        seed(&pool, 10, &["09:00"], 2);
        let messenger = RecordingMessenger::failing_for(&[10]);
        let mut fired = FiredSlots::default();

        let report = run_tick(&pool, &messenger, &moscow_config(), &mut fired, nine_msk())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        let mut conn = pool.get().unwrap();
        assert_eq!(NewsItem::unread_for(&mut conn, 10, 10).unwrap().len(), 2);
    }

    /// Takes the only pooled connection on every send and keeps it, so the
    /// store is unreachable for the rest of the tick.
    struct ExhaustingMessenger {
        pool: DbPool,
        held: StdMutex<Vec<PooledConnection<ConnectionManager<SqliteConnection>>>>,
    }

    impl Messenger for ExhaustingMessenger {
        async fn send(&self, _chat_id: i64, _message: Outgoing) -> AppResult<i32> {
            let conn = self.pool.get().map_err(|e| AppError::Pool(e.to_string()))?;
            self.held.lock().unwrap().push(conn);
            Ok(1)
        }

        async fn edit(&self, _chat_id: i64, _message_id: i32, _message: Outgoing) -> AppResult<()> {
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_error_after_send_moves_on_to_next_user() {
        let (_dir, pool) = create_test_db_with_timeout(Duration::from_millis(100));
        seed(&pool, 10, &["09:00"], 2);
        seed(&pool, 11, &["09:00"], 0);
        let messenger = ExhaustingMessenger {
            pool: pool.clone(),
            held: StdMutex::new(Vec::new()),
        };
        let mut fired = FiredSlots::default();

        let report = run_tick(&pool, &messenger, &moscow_config(), &mut fired, nine_msk())
            .await
            .unwrap();

        // user 10 got the digest but could not be marked; user 11 was still tried
        assert_eq!(report, DigestReport { due: 2, sent: 1, empty: 0, failed: 2 });

        drop(messenger);
        let mut conn = pool.get().unwrap();
        assert_eq!(NewsItem::unread_for(&mut conn, 10, 10).unwrap().len(), 2);
    }
}
