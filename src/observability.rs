use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging settings read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("LOG_FORMAT").ok(),
        )
    }

    fn from_values(level: Option<String>, format: Option<String>) -> Self {
        let log_format = match format.as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self {
            log_level: level
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| "info".to_string()),
            log_format,
        }
    }
}

/// Initialize structured logging and tracing
pub fn init_logging() {
    let config = ObservabilityConfig::from_env();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // `try_init` also installs the `log` bridge, so model code using `log::*` ends up here too
    let installed = match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init(),
    };

    if installed.is_err() {
        return;
    }

    info!(
        service = "newsbot",
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Logging initialized"
    );
}

/// Structured logging macros for consistent log format
#[macro_export]
macro_rules! log_user_action {
    ($chat_id:expr, $action:expr, $details:tt) => {
        tracing::info!(
            chat_id = $chat_id,
            action = $action,
            details = %serde_json::json!($details),
            "User action performed"
        );
    };
}

#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:tt) => {
        tracing::error!(
            error = %$error,
            context = %serde_json::json!($context),
            "Application error occurred"
        );
    };
}
