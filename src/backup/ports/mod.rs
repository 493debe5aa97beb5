//! Port contracts for backup definitions, runs, destinations and storage.
//!
//! Ports define infrastructure-agnostic interfaces used by backup services.

pub mod destination;
pub mod repository;
pub mod storage;

pub use destination::{DestinationCatalog, DestinationCatalogError, DestinationCatalogResult};
pub use repository::{
    BackupDefinitionRepository, BackupRepositoryError, BackupRepositoryResult,
    BackupRunRepository, DefinitionListing, FaultedDefinition,
};
pub use storage::{BackupStorage, BackupStorageError, BackupStorageResult, DumpRequest};

#[cfg(test)]
pub use destination::MockDestinationCatalog;
