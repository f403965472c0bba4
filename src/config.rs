use crate::errors::{AppError, AppResult};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "newsbot.db";

/// How new items reach subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// users pull with /latest; scheduled digests are the only push
    Pull,
    /// every newly ingested item is sent to its subscribers right away
    Push,
}

/// What /latest paginates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestScope {
    Today,
    Unread,
    All,
}

/// What a scheduled digest contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMode {
    Unread,
    Recent,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pull" => Ok(DeliveryMode::Pull),
            "push" => Ok(DeliveryMode::Push),
            other => Err(format!("unknown delivery mode '{other}' (expected pull or push)")),
        }
    }
}

impl FromStr for LatestScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(LatestScope::Today),
            "unread" => Ok(LatestScope::Unread),
            "all" => Ok(LatestScope::All),
            other => Err(format!("unknown latest scope '{other}' (expected today, unread or all)")),
        }
    }
}

impl FromStr for DigestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(DigestMode::Unread),
            "recent" => Ok(DigestMode::Recent),
            other => Err(format!("unknown digest mode '{other}' (expected unread or recent)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub admin_ids: HashSet<i64>,
    pub timezone: Tz,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub page_size: i64,
    pub retention: chrono::Duration,
    pub delivery_mode: DeliveryMode,
    pub latest_scope: LatestScope,
    pub digest_mode: DigestMode,
    pub digest_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::config("BOT_TOKEN not set"))?;

        let database_url = match lookup("DATABASE_URL").filter(|p| !p.trim().is_empty()) {
            Some(path) => {
                log::info!("Using database path from DATABASE_URL: {}", path);
                path
            }
            None => {
                log::info!("Using default database path: {}", DEFAULT_DATABASE_URL);
                DEFAULT_DATABASE_URL.to_string()
            }
        };

        let admin_ids = parse_admin_ids(&lookup("ADMIN_IDS").unwrap_or_default())?;
        if admin_ids.is_empty() {
            log::warn!("ADMIN_IDS is empty; admin commands are disabled");
        }

        let timezone: Tz = parse_or("TIMEZONE", &lookup, chrono_tz::Europe::Moscow)?;
        let poll_secs: u64 = parse_or("POLL_INTERVAL_SECS", &lookup, 600)?;
        let fetch_secs: u64 = parse_or("FETCH_TIMEOUT_SECS", &lookup, 15)?;
        let page_size: i64 = parse_or("PAGE_SIZE", &lookup, 4)?;
        let retention_hours: i64 = parse_or("RETENTION_HOURS", &lookup, 24)?;
        let digest_limit: i64 = parse_or("DIGEST_LIMIT", &lookup, 10)?;

        if poll_secs == 0 || fetch_secs == 0 {
            return Err(AppError::config("POLL_INTERVAL_SECS and FETCH_TIMEOUT_SECS must be positive"));
        }
        if page_size < 1 || retention_hours < 1 || digest_limit < 1 {
            return Err(AppError::config("PAGE_SIZE, RETENTION_HOURS and DIGEST_LIMIT must be positive"));
        }

        Ok(AppConfig {
            bot_token,
            database_url,
            admin_ids,
            timezone,
            poll_interval: Duration::from_secs(poll_secs),
            fetch_timeout: Duration::from_secs(fetch_secs),
            page_size,
            retention: chrono::Duration::hours(retention_hours),
            delivery_mode: parse_or("DELIVERY_MODE", &lookup, DeliveryMode::Pull)?,
            latest_scope: parse_or("LATEST_SCOPE", &lookup, LatestScope::Today)?,
            digest_mode: parse_or("DIGEST_MODE", &lookup, DigestMode::Unread)?,
            digest_limit,
        })
    }

    pub fn is_admin(&self, chat_id: i64) -> bool {
        self.admin_ids.contains(&chat_id)
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::config(format!("invalid {key}: {e}"))),
        _ => Ok(default),
    }
}

fn parse_admin_ids(raw: &str) -> AppResult<HashSet<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::config(format!("invalid admin id '{s}' in ADMIN_IDS")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppResult<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.database_url, "newsbot.db");
        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
        assert_eq!(config.poll_interval, Duration::from_secs(600));
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.page_size, 4);
        assert_eq!(config.retention, chrono::Duration::hours(24));
        assert_eq!(config.delivery_mode, DeliveryMode::Pull);
        assert_eq!(config.latest_scope, LatestScope::Today);
        assert_eq!(config.digest_mode, DigestMode::Unread);
        assert!(config.admin_ids.is_empty());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        assert!(matches!(config_from(&[]), Err(AppError::Config(_))));
        assert!(matches!(config_from(&[("BOT_TOKEN", "  ")]), Err(AppError::Config(_))));
    }

    #[test]
    fn test_admin_ids_are_parsed() {
        let config = config_from(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "839986298, 42,")]).unwrap();
        assert!(config.is_admin(839986298));
        assert!(config.is_admin(42));
        assert!(!config.is_admin(7));

        assert!(config_from(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "abc")]).is_err());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = config_from(&[
            ("BOT_TOKEN", "t"),
            ("TIMEZONE", "UTC"),
            ("DELIVERY_MODE", "PUSH"),
            ("LATEST_SCOPE", "unread"),
            ("PAGE_SIZE", "5"),
        ])
        .unwrap();
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.delivery_mode, DeliveryMode::Push);
        assert_eq!(config.latest_scope, LatestScope::Unread);
        assert_eq!(config.page_size, 5);

        assert!(config_from(&[("BOT_TOKEN", "t"), ("TIMEZONE", "Mars/Olympus")]).is_err());
        assert!(config_from(&[("BOT_TOKEN", "t"), ("PAGE_SIZE", "0")]).is_err());
        assert!(config_from(&[("BOT_TOKEN", "t"), ("DIGEST_MODE", "weekly")]).is_err());
    }
}
