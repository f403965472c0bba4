use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A page cursor not moved for this long is forgotten.
pub const PAGE_CURSOR_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    Add,
    Remove,
}

/// What the next plain-text message from a chat will be taken as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    AwaitingSourceUrl(SourceAction),
    AwaitingBroadcastText,
}

#[derive(Debug, Default, Clone, Copy)]
struct ChatState {
    pending: Option<PendingAction>,
    /// last page shown by /latest past the first, 0 otherwise
    page: i64,
    page_set_at: Option<Instant>,
}

impl ChatState {
    fn is_idle(&self) -> bool {
        self.pending.is_none() && self.page == 0
    }

    fn cursor(&self, now: Instant) -> i64 {
        match self.page_set_at {
            Some(at) if now.duration_since(at) < PAGE_CURSOR_TTL => self.page.max(1),
            _ => 1,
        }
    }

    fn reset_cursor(&mut self) {
        self.page = 0;
        self.page_set_at = None;
    }
}

/// Per-chat conversation state. Lives in memory only; a restart drops any
/// half-finished command and every page cursor.
#[derive(Debug, Default)]
pub struct SessionStore {
    chats: Mutex<HashMap<i64, ChatState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_pending(&self, chat_id: i64, action: PendingAction) {
        self.chats.lock().await.entry(chat_id).or_default().pending = Some(action);
    }

    pub async fn pending(&self, chat_id: i64) -> Option<PendingAction> {
        self.chats.lock().await.get(&chat_id).and_then(|s| s.pending)
    }

    /// Removes and returns the pending action, leaving the chat idle.
    pub async fn take_pending(&self, chat_id: i64) -> Option<PendingAction> {
        let mut chats = self.chats.lock().await;
        let state = chats.get_mut(&chat_id)?;
        let taken = state.pending.take();
        if state.is_idle() {
            chats.remove(&chat_id);
        }
        taken
    }

    /// Returns `true` when something was pending.
    pub async fn clear_pending(&self, chat_id: i64) -> bool {
        self.take_pending(chat_id).await.is_some()
    }

    /// Page last shown to the chat, 1 when none or when the cursor expired.
    pub async fn page(&self, chat_id: i64) -> i64 {
        let now = Instant::now();
        self.chats
            .lock()
            .await
            .get(&chat_id)
            .map(|s| s.cursor(now))
            .unwrap_or(1)
    }

    /// Moves the cursor. Page 1 is the default, so it is stored as no cursor
    /// and an otherwise idle chat is dropped; expired cursors of other chats
    /// are swept on the way.
    pub async fn set_page(&self, chat_id: i64, page: i64) {
        let now = Instant::now();
        let mut chats = self.chats.lock().await;
        chats.retain(|_, state| {
            if state.cursor(now) == 1 {
                state.reset_cursor();
            }
            !state.is_idle()
        });

        if page > 1 {
            let state = chats.entry(chat_id).or_default();
            state.page = page;
            state.page_set_at = Some(now);
        } else if let Some(state) = chats.get_mut(&chat_id) {
            state.reset_cursor();
            if state.is_idle() {
                chats.remove(&chat_id);
            }
        }
    }

    pub async fn active_chats(&self) -> usize {
        self.chats.lock().await.len()
    }
}
