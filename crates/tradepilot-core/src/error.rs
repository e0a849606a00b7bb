//! Error types for the Tradepilot system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Exchange error: {message}")]
    Exchange { message: String, status: Option<u16> },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Decision not actionable: {0}")]
    DecisionNotActionable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
