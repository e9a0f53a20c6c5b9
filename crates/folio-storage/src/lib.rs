//! Durable storage for Folio
//!
//! A small string-keyed, string-valued store contract ([`KeyValueStore`]) with an
//! in-memory backend and a directory-backed file backend. Both backends can be
//! given a byte quota; writes that would exceed it fail with
//! [`StorageError::QuotaExceeded`] so callers can apply their own recovery policy.

pub mod error;
pub mod file;
pub mod keys;
pub mod memory;

use std::fmt;

pub use error::{IoOperation, StorageError, StorageResult};
pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;

/// String-keyed, string-valued durable storage
///
/// Implementations must be cheap to share behind an `Arc` and safe to call from
/// any task. A failed `set` must leave the previous value for that key intact.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// List all keys currently stored
    fn keys(&self) -> StorageResult<Vec<String>>;
}
