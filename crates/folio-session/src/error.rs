//! Session error types

use folio_config::ConfigError;
use folio_document::DocumentError;
use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised while opening or driving a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),
}
