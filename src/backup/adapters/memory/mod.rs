//! In-memory adapters for tests and embedded use.

mod catalog;
mod repository;
mod storage;

pub use catalog::InMemoryDestinationCatalog;
pub use repository::InMemoryBackupRepository;
pub use storage::InMemoryBackupStorage;
