//! Storage error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// The write would push the store past its byte quota
    #[error("Storage quota exceeded writing {key}: {required} bytes needed, limit is {limit}")]
    QuotaExceeded {
        key: String,
        required: usize,
        limit: usize,
    },

    /// File read/write failed
    #[error("IO error on {path} ({operation}): {source}")]
    IoError {
        path: PathBuf,
        operation: IoOperation,
        source: std::io::Error,
    },

    /// Key cannot be mapped onto the backend
    #[error("Invalid storage key {key:?}: {message}")]
    InvalidKey { key: String, message: String },

    /// Backend specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy)]
pub enum IoOperation {
    Read,
    Write,
    Delete,
    Move,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
            IoOperation::Delete => write!(f, "delete"),
            IoOperation::Move => write!(f, "move"),
        }
    }
}

impl StorageError {
    /// Create a quota exceeded error
    pub fn quota_exceeded(key: impl Into<String>, required: usize, limit: usize) -> Self {
        StorageError::QuotaExceeded {
            key: key.into(),
            required,
            limit,
        }
    }

    /// Create an IO error
    pub fn io_error(path: PathBuf, operation: IoOperation, source: std::io::Error) -> Self {
        StorageError::IoError {
            path,
            operation,
            source,
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::InvalidKey {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend(message.into())
    }

    /// Whether this error signals storage pressure rather than a hard failure
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}
