//! Error types shared across the GetUp crates.

use thiserror::Error;

/// Errors raised by stores, transports and configuration loading.
///
/// Ineligible task writes are not errors; they are reported through tagged
/// results in the scheduler crate.
#[derive(Debug, Error)]
pub enum GetUpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Push transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GetUpError>;
