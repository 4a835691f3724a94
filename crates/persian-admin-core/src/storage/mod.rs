//! Local key-value storage for the session slot.
//!
//! This module provides:
//! - `SessionStorage`: the string slot contract the session manager writes to
//! - `FileStorage`: one JSON file per key, survives process restarts
//! - `MemoryStorage`: in-process map with switchable write rejection
//!
//! Each call is atomic on its own; callers need no further locking.

pub mod error;
pub mod file;
pub mod memory;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;

pub trait SessionStorage: Send + Sync {
    /// Read the raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
