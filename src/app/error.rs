use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenbookError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("List parsing error: {0}")]
    ListParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema validation failed for {id}: {reason}")]
    SchemaValidation { id: String, reason: String },

    #[error("List not found: {0}")]
    ListNotFound(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Clonable variant carried on the scheduler's broadcast channel.
pub type SharedError = Arc<TokenbookError>;

pub type Result<T> = std::result::Result<T, TokenbookError>;
