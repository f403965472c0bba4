use super::pagination::Nav;
use crate::telegram::types::MAX_CALLBACK_DATA_LEN;
use sha2::{Digest, Sha256};

const TOGGLE: &str = "toggle:";
const AUTOPOST_SET: &str = "autopost:set:";
const AUTOPOST_DISABLE: &str = "autopost:disable";
const ADMIN_REMOVE: &str = "admin:remove:";
const ADMIN_CANCEL: &str = "admin:cancel";

/// Payload of an inline button.
///
/// Sources are carried as a token: the URL itself, or `#<16 hex digits>`
/// when the URL would push the data past Telegram's 64-byte limit. Hashed
/// tokens are resolved with [`resolve_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Toggle(String),
    AutopostSet(String),
    AutopostDisable,
    Latest(Nav),
    AdminRemove(String),
    AdminCancel,
}

impl CallbackAction {
    pub fn toggle(source_url: &str) -> Self {
        CallbackAction::Toggle(source_token(TOGGLE, source_url))
    }

    pub fn admin_remove(source_url: &str) -> Self {
        CallbackAction::AdminRemove(source_token(ADMIN_REMOVE, source_url))
    }

    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "latest_first" => CallbackAction::Latest(Nav::First),
            "latest_prev" => CallbackAction::Latest(Nav::Prev),
            "latest_next" => CallbackAction::Latest(Nav::Next),
            "latest_last" => CallbackAction::Latest(Nav::Last),
            AUTOPOST_DISABLE => CallbackAction::AutopostDisable,
            ADMIN_CANCEL => CallbackAction::AdminCancel,
            _ => {
                if let Some(token) = data.strip_prefix(TOGGLE) {
                    CallbackAction::Toggle(token.to_string())
                } else if let Some(time) = data.strip_prefix(AUTOPOST_SET) {
                    CallbackAction::AutopostSet(time.to_string())
                } else if let Some(token) = data.strip_prefix(ADMIN_REMOVE) {
                    CallbackAction::AdminRemove(token.to_string())
                } else {
                    return None;
                }
            }
        };
        Some(action)
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Toggle(token) => format!("{TOGGLE}{token}"),
            CallbackAction::AutopostSet(time) => format!("{AUTOPOST_SET}{time}"),
            CallbackAction::AutopostDisable => AUTOPOST_DISABLE.to_string(),
            CallbackAction::Latest(Nav::First) => "latest_first".to_string(),
            CallbackAction::Latest(Nav::Prev) => "latest_prev".to_string(),
            CallbackAction::Latest(Nav::Next) => "latest_next".to_string(),
            CallbackAction::Latest(Nav::Last) => "latest_last".to_string(),
            CallbackAction::AdminRemove(token) => format!("{ADMIN_REMOVE}{token}"),
            CallbackAction::AdminCancel => ADMIN_CANCEL.to_string(),
        }
    }
}

/// `#` and the first 16 hex digits of the URL's SHA-256.
fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("#{}", &digest[..16])
}

fn source_token(prefix: &str, url: &str) -> String {
    if prefix.len() + url.len() <= MAX_CALLBACK_DATA_LEN {
        url.to_string()
    } else {
        url_hash(url)
    }
}

/// Maps a token back to a source URL. Plain tokens are URLs already; hashed
/// ones must match a currently known source.
pub fn resolve_source(token: &str, sources: &[String]) -> Option<String> {
    if !token.starts_with('#') {
        return Some(token.to_string());
    }
    sources.iter().find(|url| url_hash(url) == token).cloned()
}
