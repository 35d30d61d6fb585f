pub mod file;
pub mod memory;
pub mod repository;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use repository::{ReminderRepository, UserRepository};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Contract the persistence backend has to satisfy: plain string get/set,
/// no transactions, writes may be lost to a concurrent writer.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
