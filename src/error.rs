//! Top-level error type for infrastructure and IO failures.
//!
//! [`domain::error::DomainError`](crate::domain::error::DomainError) covers semantic
//! validation failures raised by the Creation and Lifecycle services; this type wraps
//! those plus everything that can go wrong talking to the store, the notifier, or an
//! exchange feed.

use thiserror::Error;

use crate::domain::error::DomainError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store error: {0}")]
    Store(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("notifier error: {0}")]
    Notifier(String),

    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
