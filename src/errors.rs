use crate::feed::FeedError;
use thiserror::Error;

/// Application-wide error types with user-friendly messages
#[derive(Debug, Error)]
pub enum AppError {
    // Authorization
    #[error("Access denied")]
    Forbidden,

    // Validation Errors
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },
    #[error("Source not found: {url}")]
    SourceNotFound { url: String },

    // Feed-related Errors
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    // Database Errors
    #[error("Database error: {0}")]
    Database(diesel::result::Error),
    #[error("Database pool error: {0}")]
    Pool(String),

    // External Service Errors
    #[error("Telegram transport error: {0}")]
    Transport(String),

    // System Errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Helper functions for common error conversions
impl AppError {
    pub fn invalid_input(field: &str, message: &str) -> Self {
        AppError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn source_not_found(url: &str) -> Self {
        AppError::SourceNotFound {
            url: url.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::Config(message.into())
    }

    /// Short text shown in the chat when a command fails.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Forbidden => "🚫 This command is available to administrators only.".to_string(),
            AppError::InvalidInput { message, .. } => format!("⚠️ {message}"),
            AppError::SourceNotFound { .. } => "⚠️ Source not found.".to_string(),
            AppError::Feed(_) => "⚠️ Unable to load the feed.".to_string(),
            AppError::Database(_) | AppError::Pool(_) => {
                "⚠️ A database error occurred, please try again.".to_string()
            }
            AppError::Transport(_) | AppError::Config(_) => {
                "⚠️ An unexpected error occurred, please try again.".to_string()
            }
        }
    }
}

/// Convert database connection pool errors
impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        log::error!("Database connection pool error: {}", err);
        AppError::Pool(err.to_string())
    }
}

/// Convert diesel database errors
impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        log::error!("Database error: {}", err);
        AppError::Database(err)
    }
}

/// Convert Telegram request errors
impl From<teloxide::RequestError> for AppError {
    fn from(err: teloxide::RequestError) -> Self {
        log::warn!("Telegram request error: {}", err);
        AppError::Transport(err.to_string())
    }
}
