use super::autopost;
use super::callback::{resolve_source, CallbackAction};
use super::commands::{help_text, Command, PUBLIC_COMMANDS};
use super::pagination::{self, load_page, render, scope_for, Nav};
use super::session::{PendingAction, SessionStore, SourceAction};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{AppError, AppResult};
use crate::models::autopost::{AddOutcome, AutopostSchedule};
use crate::models::news_item::NewsItem;
use crate::models::settings::{Setting, LAST_INGEST_AT};
use crate::models::source::Source;
use crate::models::subscription::Subscription;
use crate::models::user::User;
use crate::telegram::{Button, Keyboard, Messenger, Outgoing};
use crate::{log_error_with_context, log_user_action};
use chrono::{TimeZone, Utc};
use diesel::SqliteConnection;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// A button press as delivered by the transport.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    pub callback_id: String,
    pub chat_id: i64,
    pub message_id: i32,
    pub data: String,
}

/// Turns inbound chat events into store operations and replies.
pub struct BotHandler<M> {
    pool: DbPool,
    messenger: Arc<M>,
    config: Arc<AppConfig>,
    sessions: SessionStore,
}

impl<M: Messenger> BotHandler<M> {
    pub fn new(pool: DbPool, messenger: Arc<M>, config: Arc<AppConfig>) -> Self {
        Self {
            pool,
            messenger,
            config,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle_text(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.dispatch_text(chat_id, text).await {
            self.report(chat_id, e).await;
        }
    }

    pub async fn handle_callback(&self, ctx: CallbackContext) {
        let result = match CallbackAction::parse(&ctx.data) {
            Some(action) => self.dispatch_callback(&ctx, action).await,
            None => {
                log::debug!("Ignoring unknown callback data {:?} from {}", ctx.data, ctx.chat_id);
                Ok(None)
            }
        };
        let toast = match result {
            Ok(toast) => toast,
            Err(e) => {
                log_failure(ctx.chat_id, &e);
                Some(e.user_message())
            }
        };
        if let Err(e) = self
            .messenger
            .answer_callback(&ctx.callback_id, toast.as_deref())
            .await
        {
            log::warn!("Error answering callback from {}: {e}", ctx.chat_id);
        }
    }

    async fn report(&self, chat_id: i64, err: AppError) {
        log_failure(chat_id, &err);
        if let Err(e) = self.reply(chat_id, Outgoing::plain(err.user_message())).await {
            log::warn!("Error reporting failure to {chat_id}: {e}");
        }
    }

    async fn reply(&self, chat_id: i64, message: Outgoing) -> AppResult<()> {
        self.messenger.send(chat_id, message).await.map(|_| ())
    }

    fn require_admin(&self, chat_id: i64) -> AppResult<()> {
        if self.config.is_admin(chat_id) {
            Ok(())
        } else {
            log::info!("Rejected admin action from {chat_id}");
            Err(AppError::Forbidden)
        }
    }

    fn register(&self, conn: &mut SqliteConnection, chat_id: i64) -> AppResult<bool> {
        let created = User::ensure(conn, chat_id)?;
        if created {
            log_user_action!(chat_id, "register", {});
        }
        Ok(created)
    }

    async fn dispatch_text(&self, chat_id: i64, text: &str) -> AppResult<()> {
        {
            let mut conn = self.pool.get()?;
            self.register(&mut conn, chat_id)?;
        }
        match Command::parse(text) {
            Some(command) => self.handle_command(chat_id, command).await,
            None => self.handle_plain(chat_id, text.trim()).await,
        }
    }

    async fn handle_command(&self, chat_id: i64, command: Command) -> AppResult<()> {
        if command.is_admin_only() {
            self.require_admin(chat_id)?;
        }
        match command {
            Command::Start => {
                let profile = self.profile(chat_id)?;
                self.reply(chat_id, Outgoing::plain(profile)).await
            }
            Command::Help => {
                let help = help_text(self.config.is_admin(chat_id));
                self.reply(chat_id, Outgoing::plain(help)).await
            }
            Command::Latest => self.show_latest(chat_id, None, None).await,
            Command::MySources => {
                let menu = {
                    let mut conn = self.pool.get()?;
                    sources_menu(&mut conn, chat_id)?
                };
                self.reply(chat_id, menu).await
            }
            Command::Autopost(times) => self.configure_autopost(chat_id, &times).await,
            Command::Cancel => {
                let text = if self.sessions.clear_pending(chat_id).await {
                    "Operation cancelled."
                } else {
                    "Nothing to cancel."
                };
                self.reply(chat_id, Outgoing::plain(text)).await
            }
            Command::AddSource(Some(url)) => self.add_source(chat_id, &url).await,
            Command::AddSource(None) => {
                self.prompt(chat_id, PendingAction::AwaitingSourceUrl(SourceAction::Add))
                    .await
            }
            Command::RemoveSource(Some(url)) => self.remove_source(chat_id, &url).await,
            Command::RemoveSource(None) => {
                self.prompt(chat_id, PendingAction::AwaitingSourceUrl(SourceAction::Remove))
                    .await
            }
            Command::ListSources => {
                let list = {
                    let mut conn = self.pool.get()?;
                    admin_sources_list(&mut conn)?
                };
                self.reply(chat_id, list).await
            }
            Command::Broadcast(Some(text)) => self.broadcast(chat_id, &text).await,
            Command::Broadcast(None) => self.prompt(chat_id, PendingAction::AwaitingBroadcastText).await,
            Command::Unknown(name) => {
                log::debug!("Unknown command {name} from {chat_id}");
                self.reply(chat_id, Outgoing::plain("Unknown command. See /help."))
                    .await
            }
        }
    }

    /// Plain text completes a pending action; without one it is ignored.
    async fn handle_plain(&self, chat_id: i64, text: &str) -> AppResult<()> {
        let Some(action) = self.sessions.take_pending(chat_id).await else {
            log::debug!("Ignoring message from {chat_id} with nothing pending");
            return Ok(());
        };
        self.require_admin(chat_id)?;
        match action {
            PendingAction::AwaitingSourceUrl(SourceAction::Add) => self.add_source(chat_id, text).await,
            PendingAction::AwaitingSourceUrl(SourceAction::Remove) => {
                self.remove_source(chat_id, text).await
            }
            PendingAction::AwaitingBroadcastText => self.broadcast(chat_id, text).await,
        }
    }

    async fn prompt(&self, chat_id: i64, action: PendingAction) -> AppResult<()> {
        self.sessions.set_pending(chat_id, action).await;
        let text = match action {
            PendingAction::AwaitingSourceUrl(SourceAction::Add) => "Send the feed URL to add.",
            PendingAction::AwaitingSourceUrl(SourceAction::Remove) => "Send the feed URL to remove.",
            PendingAction::AwaitingBroadcastText => "Send the text to broadcast to all users.",
        };
        let cancel = Keyboard::default().row(vec![Button::new(
            "✖️ Cancel",
            CallbackAction::AdminCancel.encode(),
        )]);
        self.reply(chat_id, Outgoing::plain(text).with_keyboard(cancel)).await
    }

    fn profile(&self, chat_id: i64) -> AppResult<String> {
        let mut conn = self.pool.get()?;
        let subscriptions = Subscription::count_for_user(&mut conn, chat_id)?;
        if !self.config.is_admin(chat_id) {
            return Ok(format!(
                "👤 Your profile\n🆔 Telegram ID: {chat_id}\n📌 Subscriptions: {subscriptions}\n\nCommands:\n{PUBLIC_COMMANDS}"
            ));
        }

        let total = User::count(&mut conn)?;
        let active = User::count_active(&mut conn)?;
        let autopost = AutopostSchedule::count_enabled(&mut conn)?;
        let last_ingest = Setting::get_timestamp(&mut conn, LAST_INGEST_AT)?
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .map(|at| {
                at.with_timezone(&self.config.timezone)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_else(|| "never".to_string());
        Ok(format!(
            "👑 Admin profile\n🆔 Telegram ID: {chat_id}\n📌 Subscriptions: {subscriptions}\n\
             📊 Active users: {active}\n🌐 Total users: {total}\n⏰ Users with autopost: {autopost}\n\
             🔄 Last ingestion: {last_ingest}\n\n{}",
            help_text(true)
        ))
    }

    /// Sends page 1 as a new message, or moves the cursor and edits the
    /// message the navigation button belongs to.
    async fn show_latest(&self, chat_id: i64, nav: Option<Nav>, message_id: Option<i32>) -> AppResult<()> {
        let current = self.sessions.page(chat_id).await;
        let scope = scope_for(self.config.latest_scope, Utc::now(), self.config.timezone);
        let page_size = self.config.page_size;

        let view = {
            let mut conn = self.pool.get()?;
            let requested = match nav {
                None => 1,
                Some(nav) => {
                    let total = NewsItem::count_in(&mut conn, chat_id, scope)?;
                    nav.apply(current, pagination::total_pages(total, page_size))
                }
            };
            load_page(&mut conn, chat_id, scope, requested, page_size)?
        };
        self.sessions.set_page(chat_id, view.page).await;

        let message = render(&view, scope, self.config.timezone);
        match message_id {
            Some(message_id) => self.messenger.edit(chat_id, message_id, message).await,
            None => self.reply(chat_id, message).await,
        }
    }

    async fn configure_autopost(&self, chat_id: i64, times: &[String]) -> AppResult<()> {
        let tz = self.config.timezone;
        if times.is_empty() {
            let current = {
                let mut conn = self.pool.get()?;
                AutopostSchedule::get(&mut conn, chat_id)?
            };
            return self.reply(chat_id, autopost::menu(&current, tz)).await;
        }

        let saved = {
            let mut conn = self.pool.get()?;
            AutopostSchedule::set(&mut conn, chat_id, times)?
        };
        log_user_action!(chat_id, "autopost_set", { "times": saved });
        self.reply(
            chat_id,
            Outgoing::plain(format!("✅ Autopost times saved ({tz}): {}", saved.join(", "))),
        )
        .await
    }

    async fn add_source(&self, chat_id: i64, raw: &str) -> AppResult<()> {
        let url = validate_source_url(raw)?;
        let created = {
            let mut conn = self.pool.get()?;
            Source::upsert(&mut conn, &url, Some(chat_id))?
        };
        let text = if created {
            log_user_action!(chat_id, "add_source", { "url": url });
            format!("✅ Source added: {url}")
        } else {
            format!("ℹ️ Source already exists: {url}")
        };
        self.reply(chat_id, Outgoing::plain(text)).await
    }

    async fn remove_source(&self, chat_id: i64, raw: &str) -> AppResult<()> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(AppError::invalid_input("url", "Please send the URL of the source to remove."));
        }
        let removed = {
            let mut conn = self.pool.get()?;
            Source::remove(&mut conn, url)?
        };
        if !removed {
            return Err(AppError::source_not_found(url));
        }
        log_user_action!(chat_id, "remove_source", { "url": url });
        self.reply(chat_id, Outgoing::plain(format!("🗑 Source removed: {url}")))
            .await
    }

    async fn broadcast(&self, chat_id: i64, raw: &str) -> AppResult<()> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(AppError::invalid_input("text", "Broadcast text cannot be empty."));
        }
        let recipients = {
            let mut conn = self.pool.get()?;
            User::get_all_ids(&mut conn)?
        };

        let (mut delivered, mut failed) = (0, 0);
        for user_id in recipients {
            match self.messenger.send(user_id, Outgoing::plain(format!("📢 {text}"))).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    log::warn!("Error delivering broadcast to {user_id}: {e}");
                    failed += 1;
                }
            }
        }
        log_user_action!(chat_id, "broadcast", { "delivered": delivered, "failed": failed });
        self.reply(
            chat_id,
            Outgoing::plain(format!("📢 Broadcast delivered to {delivered} users, {failed} failed.")),
        )
        .await
    }

    /// Returns the toast to show for the press.
    async fn dispatch_callback(&self, ctx: &CallbackContext, action: CallbackAction) -> AppResult<Option<String>> {
        let chat_id = ctx.chat_id;
        match action {
            CallbackAction::Toggle(token) => {
                let (subscribed, menu) = {
                    let mut conn = self.pool.get()?;
                    self.register(&mut conn, chat_id)?;
                    let sources = Source::list(&mut conn)?;
                    let url = resolve_source(&token, &sources).ok_or_else(|| AppError::source_not_found(&token))?;
                    let subscribed = Subscription::toggle(&mut conn, chat_id, &url)?;
                    log_user_action!(chat_id, if subscribed { "subscribe" } else { "unsubscribe" }, { "url": url });
                    (subscribed, sources_menu(&mut conn, chat_id)?)
                };
                self.messenger.edit(chat_id, ctx.message_id, menu).await?;
                Ok(Some(if subscribed { "✅ Subscribed" } else { "❌ Unsubscribed" }.to_string()))
            }
            CallbackAction::AutopostSet(time) => {
                let (outcome, times) = {
                    let mut conn = self.pool.get()?;
                    let outcome = AutopostSchedule::add_time(&mut conn, chat_id, &time)?;
                    (outcome, AutopostSchedule::get(&mut conn, chat_id)?)
                };
                match outcome {
                    AddOutcome::AlreadySelected => Ok(Some(format!("{time} is already selected"))),
                    AddOutcome::Added => {
                        log_user_action!(chat_id, "autopost_add", { "time": time });
                        self.messenger
                            .edit(chat_id, ctx.message_id, autopost::menu(&times, self.config.timezone))
                            .await?;
                        Ok(Some(format!("✅ {time} added")))
                    }
                }
            }
            CallbackAction::AutopostDisable => {
                {
                    let mut conn = self.pool.get()?;
                    AutopostSchedule::disable(&mut conn, chat_id)?;
                }
                log_user_action!(chat_id, "autopost_disable", {});
                self.messenger
                    .edit(chat_id, ctx.message_id, autopost::menu(&[], self.config.timezone))
                    .await?;
                Ok(Some("Autopost disabled".to_string()))
            }
            CallbackAction::Latest(nav) => {
                self.show_latest(chat_id, Some(nav), Some(ctx.message_id)).await?;
                Ok(None)
            }
            CallbackAction::AdminRemove(token) => {
                self.require_admin(chat_id)?;
                let list = {
                    let mut conn = self.pool.get()?;
                    let sources = Source::list(&mut conn)?;
                    let url = resolve_source(&token, &sources).ok_or_else(|| AppError::source_not_found(&token))?;
                    if !Source::remove(&mut conn, &url)? {
                        return Err(AppError::source_not_found(&url));
                    }
                    log_user_action!(chat_id, "remove_source", { "url": url });
                    admin_sources_list(&mut conn)?
                };
                self.messenger.edit(chat_id, ctx.message_id, list).await?;
                Ok(Some("🗑 Source removed".to_string()))
            }
            CallbackAction::AdminCancel => {
                let text = if self.sessions.clear_pending(chat_id).await {
                    "Operation cancelled."
                } else {
                    "Nothing to cancel."
                };
                self.messenger
                    .edit(chat_id, ctx.message_id, Outgoing::plain(text))
                    .await?;
                Ok(None)
            }
        }
    }
}

fn log_failure(chat_id: i64, err: &AppError) {
    match err {
        AppError::Forbidden | AppError::InvalidInput { .. } | AppError::SourceNotFound { .. } => {
            log::info!("Rejected request from {chat_id}: {err}")
        }
        _ => {
            log_error_with_context!(err, { "chat_id": chat_id });
        }
    }
}

/// Accepts absolute http(s) URLs; returns the trimmed input unchanged.
pub fn validate_source_url(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::invalid_input("url", "Please send a non-empty feed URL."));
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(raw.to_string()),
        _ => Err(AppError::invalid_input(
            "url",
            &format!("'{raw}' is not a valid http(s) URL. Send it again with /addsource."),
        )),
    }
}

fn source_label(source_url: &str) -> String {
    Url::parse(source_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| source_url.to_string())
}

/// Every known source as a toggle button, ticked when subscribed.
fn sources_menu(conn: &mut SqliteConnection, chat_id: i64) -> AppResult<Outgoing> {
    let all = Source::list(conn)?;
    if all.is_empty() {
        return Ok(Outgoing::plain("No sources are available yet."));
    }
    let mine: HashSet<String> = Subscription::list_user_sources(conn, chat_id)?
        .into_iter()
        .collect();

    let keyboard = all.iter().fold(Keyboard::default(), |keyboard, src| {
        let label = source_label(src);
        let label = if mine.contains(src) { format!("✅ {label}") } else { label };
        keyboard.row(vec![Button::new(label, CallbackAction::toggle(src).encode())])
    });
    Ok(Outgoing::plain("Your sources (tap to subscribe or unsubscribe):").with_keyboard(keyboard))
}

fn admin_sources_list(conn: &mut SqliteConnection) -> AppResult<Outgoing> {
    let all = Source::list(conn)?;
    if all.is_empty() {
        return Ok(Outgoing::plain("No sources yet. Add one with /addsource."));
    }
    let mut text = format!("📚 Sources ({}):", all.len());
    let mut keyboard = Keyboard::default();
    for (i, src) in all.iter().enumerate() {
        text.push_str(&format!("\n{}. {src}", i + 1));
        keyboard = keyboard.row(vec![Button::new(
            format!("🗑 {}", source_label(src)),
            CallbackAction::admin_remove(src).encode(),
        )]);
    }
    Ok(Outgoing::plain(text).with_keyboard(keyboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatestScope;
    use crate::feed::NormalizedItem;
    use crate::models::news_item::NewNewsItem;
    use crate::telegram::client::tests::RecordingMessenger;
    use crate::test_helpers::{create_test_db, seed_subscriber, test_config, TEST_ADMIN};
    use tempfile::TempDir;

    const USER: i64 = 500;
    const SRC: &str = "https://example.com/rss";

    struct Harness {
        _dir: TempDir,
        pool: DbPool,
        messenger: Arc<RecordingMessenger>,
        handler: BotHandler<RecordingMessenger>,
    }

    fn harness_with(config: AppConfig, messenger: RecordingMessenger) -> Harness {
        let (dir, pool) = create_test_db();
        let messenger = Arc::new(messenger);
        let handler = BotHandler::new(pool.clone(), messenger.clone(), Arc::new(config));
        Harness {
            _dir: dir,
            pool,
            messenger,
            handler,
        }
    }

    fn harness() -> Harness {
        harness_with(test_config(), RecordingMessenger::default())
    }

    fn press(chat_id: i64, data: &str) -> CallbackContext {
        CallbackContext {
            callback_id: "cb".to_string(),
            chat_id,
            message_id: 77,
            data: data.to_string(),
        }
    }

    fn sources(h: &Harness) -> Vec<String> {
        let mut conn = h.pool.get().unwrap();
        Source::list(&mut conn).unwrap()
    }

    fn seed_news(h: &Harness, count: u32) {
        let mut conn = h.pool.get().unwrap();
        seed_subscriber(&mut conn, USER, &[SRC]);
        let now = Utc::now();
        for i in 0..count {
            let item = NormalizedItem {
                title: format!("Story {i}"),
                link: format!("https://example.com/{i}"),
                published_at: now - chrono::Duration::seconds(i as i64),
            };
            NewNewsItem::from_normalized(&item, SRC).ingest(&mut conn).unwrap();
        }
    }

    #[tokio::test]
    async fn test_two_step_addsource() {
        let h = harness();

        h.handler.handle_text(TEST_ADMIN, "/addsource").await;
        assert_eq!(
            h.handler.sessions().pending(TEST_ADMIN).await,
            Some(PendingAction::AwaitingSourceUrl(SourceAction::Add))
        );
        assert_eq!(h.messenger.last_text(TEST_ADMIN), "Send the feed URL to add.");

        h.handler.handle_text(TEST_ADMIN, "https://example.com/rss").await;
        assert_eq!(sources(&h), vec![SRC.to_string()]);
        assert_eq!(h.handler.sessions().pending(TEST_ADMIN).await, None);

        h.handler.handle_text(TEST_ADMIN, "/listsources").await;
        let listing = h.messenger.last_text(TEST_ADMIN);
        assert_eq!(listing.matches(SRC).count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_action() {
        let h = harness();

        h.handler.handle_text(TEST_ADMIN, "/addsource").await;
        h.handler.handle_text(TEST_ADMIN, "/cancel").await;
        assert_eq!(h.messenger.last_text(TEST_ADMIN), "Operation cancelled.");
        assert_eq!(h.handler.sessions().pending(TEST_ADMIN).await, None);

        // no longer consumed as a URL
        h.handler.handle_text(TEST_ADMIN, "https://example.com/rss").await;
        assert!(sources(&h).is_empty());

        h.handler.handle_text(TEST_ADMIN, "/cancel").await;
        assert_eq!(h.messenger.last_text(TEST_ADMIN), "Nothing to cancel.");
    }

    #[tokio::test]
    async fn test_cancel_button_matches_cancel_command() {
        let h = harness();
        h.handler.handle_text(TEST_ADMIN, "/broadcast").await;
        h.handler.handle_callback(press(TEST_ADMIN, "admin:cancel")).await;

        assert_eq!(h.handler.sessions().pending(TEST_ADMIN).await, None);
        assert_eq!(h.messenger.edits()[0].text, "Operation cancelled.");
        assert_eq!(h.messenger.answers(), vec![None]);
    }

    #[tokio::test]
    async fn test_non_admin_is_denied_without_state_change() {
        let h = harness();
        h.handler.handle_text(USER, "/addsource").await;

        assert!(h.messenger.last_text(USER).contains("administrators only"));
        assert_eq!(h.handler.sessions().pending(USER).await, None);

        h.handler.handle_text(USER, "/addsource https://example.com/rss").await;
        assert!(sources(&h).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_clears_pending_state() {
        let h = harness();
        h.handler.handle_text(TEST_ADMIN, "/addsource").await;
        h.handler.handle_text(TEST_ADMIN, "not a url").await;

        assert!(h.messenger.last_text(TEST_ADMIN).contains("not a valid http(s) URL"));
        assert_eq!(h.handler.sessions().pending(TEST_ADMIN).await, None);
        assert!(sources(&h).is_empty());
    }

    #[tokio::test]
    async fn test_other_commands_keep_pending_action() {
        let h = harness();
        h.handler.handle_text(TEST_ADMIN, "/addsource").await;
        h.handler.handle_text(TEST_ADMIN, "/help").await;
        h.handler.handle_text(TEST_ADMIN, SRC).await;
        assert_eq!(sources(&h), vec![SRC.to_string()]);
    }

    #[tokio::test]
    async fn test_remove_source() {
        let h = harness();
        h.handler.handle_text(TEST_ADMIN, "/addsource https://example.com/rss").await;
        h.handler.handle_text(TEST_ADMIN, "/addsource https://example.com/rss").await;
        assert!(h.messenger.last_text(TEST_ADMIN).contains("already exists"));

        h.handler.handle_text(TEST_ADMIN, "/removesource https://missing.example/rss").await;
        assert_eq!(h.messenger.last_text(TEST_ADMIN), "⚠️ Source not found.");

        h.handler.handle_text(TEST_ADMIN, "/removesource").await;
        h.handler.handle_text(TEST_ADMIN, SRC).await;
        assert!(sources(&h).is_empty());
    }

    #[tokio::test]
    async fn test_remove_button_in_source_list() {
        let h = harness();
        h.handler.handle_text(TEST_ADMIN, "/addsource https://example.com/rss").await;
        h.handler.handle_text(TEST_ADMIN, "/listsources").await;

        h.handler.handle_callback(press(USER, "admin:remove:https://example.com/rss")).await;
        assert_eq!(sources(&h).len(), 1);

        h.handler.handle_callback(press(TEST_ADMIN, "admin:remove:https://example.com/rss")).await;
        assert!(sources(&h).is_empty());
        assert!(h.messenger.edits()[0].text.contains("No sources yet"));
    }

    #[tokio::test]
    async fn test_broadcast_reports_counts() {
        let h = harness_with(test_config(), RecordingMessenger::failing_for(&[USER + 1]));
        h.handler.handle_text(USER, "/start").await;
        h.handler.handle_text(USER + 1, "/start").await;

        h.handler.handle_text(TEST_ADMIN, "/broadcast").await;
        h.handler.handle_text(TEST_ADMIN, "Maintenance tonight").await;

        assert_eq!(h.messenger.last_text(USER), "📢 Maintenance tonight");
        assert_eq!(
            h.messenger.last_text(TEST_ADMIN),
            "📢 Broadcast delivered to 2 users, 1 failed."
        );
    }

    #[tokio::test]
    async fn test_start_shows_profile() {
        let h = harness();
        h.handler.handle_text(USER, "/start").await;
        let profile = h.messenger.last_text(USER);
        assert!(profile.contains("Your profile"));
        assert!(profile.contains(&USER.to_string()));
        assert!(!profile.contains("/addsource"));

        h.handler.handle_text(TEST_ADMIN, "/start").await;
        let admin = h.messenger.last_text(TEST_ADMIN);
        assert!(admin.contains("Admin profile"));
        assert!(admin.contains("Total users: 2"));
        assert!(admin.contains("Last ingestion: never"));
    }

    #[tokio::test]
    async fn test_latest_paginates_and_clamps() {
        let mut config = test_config();
        config.latest_scope = LatestScope::All;
        let h = harness_with(config, RecordingMessenger::default());
        seed_news(&h, 10);

        h.handler.handle_text(USER, "/latest").await;
        let first = h.messenger.sent_to(USER).pop().unwrap();
        assert!(first.text.contains("Page 1/3"));
        assert!(first.text.contains("Story 0"));

        h.handler.handle_callback(press(USER, "latest_last")).await;
        assert!(h.messenger.edits().last().unwrap().text.contains("Page 3/3"));
        assert_eq!(h.handler.sessions().page(USER).await, 3);

        h.handler.handle_callback(press(USER, "latest_next")).await;
        assert!(h.messenger.edits().last().unwrap().text.contains("Page 3/3"));

        h.handler.handle_callback(press(USER, "latest_prev")).await;
        assert!(h.messenger.edits().last().unwrap().text.contains("Page 2/3"));

        // /latest always starts over on a new message
        h.handler.handle_text(USER, "/latest").await;
        assert_eq!(h.handler.sessions().page(USER).await, 1);
        assert_eq!(h.messenger.sent_to(USER).len(), 2);
    }

    #[tokio::test]
    async fn test_latest_snaps_back_when_items_disappear() {
        let mut config = test_config();
        config.latest_scope = LatestScope::All;
        let h = harness_with(config, RecordingMessenger::default());
        seed_news(&h, 10);
        h.handler.sessions().set_page(USER, 3).await;

        {
            let mut conn = h.pool.get().unwrap();
            Subscription::unsubscribe(&mut conn, USER, SRC).unwrap();
        }
        h.handler.handle_callback(press(USER, "latest_next")).await;

        assert!(h.messenger.edits()[0].text.contains("No news"));
        assert_eq!(h.handler.sessions().page(USER).await, 1);
    }

    #[tokio::test]
    async fn test_latest_today_does_not_mark_read() {
        let h = harness();
        seed_news(&h, 2);

        h.handler.handle_text(USER, "/latest").await;
        assert!(h.messenger.last_text(USER).contains("Today's news"));

        let mut conn = h.pool.get().unwrap();
        assert_eq!(NewsItem::unread_for(&mut conn, USER, 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_toggle_subscription_from_menu() {
        let h = harness();
        h.handler.handle_text(TEST_ADMIN, "/addsource https://example.com/rss").await;

        h.handler.handle_text(USER, "/mysources").await;
        let menu = h.messenger.sent_to(USER).pop().unwrap();
        let button = menu.keyboard.unwrap().rows[0][0].clone();
        assert_eq!(button.text, "example.com");

        h.handler.handle_callback(press(USER, &button.data)).await;
        assert_eq!(h.messenger.edits()[0].keyboard.as_ref().unwrap().rows[0][0].text, "✅ example.com");

        h.handler.handle_callback(press(USER, &button.data)).await;
        assert_eq!(
            h.messenger.answers(),
            vec![Some("✅ Subscribed".to_string()), Some("❌ Unsubscribed".to_string())]
        );
        let mut conn = h.pool.get().unwrap();
        assert!(Subscription::list_user_sources(&mut conn, USER).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_autopost_command_and_buttons() {
        let h = harness();

        h.handler.handle_text(USER, "/autopost 09:00 09:00").await;
        assert_eq!(h.messenger.last_text(USER), "✅ Autopost times saved (UTC): 09:00");

        h.handler
            .handle_text(USER, "/autopost 01:00 02:00 03:00 04:00 05:00 06:00 07:00")
            .await;
        assert!(h.messenger.last_text(USER).contains("at most 6"));

        h.handler.handle_text(USER, "/autopost 25:00").await;
        assert!(h.messenger.last_text(USER).contains("not a valid time"));

        h.handler.handle_callback(press(USER, "autopost:set:09:00")).await;
        h.handler.handle_callback(press(USER, "autopost:set:10:00")).await;
        assert_eq!(
            h.messenger.answers(),
            vec![
                Some("09:00 is already selected".to_string()),
                Some("✅ 10:00 added".to_string())
            ]
        );

        let mut conn = h.pool.get().unwrap();
        assert_eq!(AutopostSchedule::get(&mut conn, USER).unwrap(), vec!["09:00", "10:00"]);
        drop(conn);

        h.handler.handle_callback(press(USER, "autopost:disable")).await;
        let mut conn = h.pool.get().unwrap();
        assert!(AutopostSchedule::get(&mut conn, USER).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plain_text_without_pending_is_ignored() {
        let h = harness();
        h.handler.handle_text(USER, "hello there").await;
        assert!(h.messenger.sent_to(USER).is_empty());

        h.handler.handle_text(USER, "/frobnicate").await;
        assert_eq!(h.messenger.last_text(USER), "Unknown command. See /help.");
    }

    #[test]
    fn test_validate_source_url() {
        assert_eq!(validate_source_url("  https://a.example/rss ").unwrap(), "https://a.example/rss");
        assert!(validate_source_url("").is_err());
        assert!(validate_source_url("ftp://a.example/rss").is_err());
        assert!(validate_source_url("example.com/rss").is_err());
    }
}
