//! Error types for the auto-trader system.

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

    #[error("Exchange API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Exchange error: {message}")]
    Exchange { message: String },

    #[error("Order error: {message}")]
    Order { message: String },

    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
}

pub type Result<T> = std::result::Result<T, Error>;
