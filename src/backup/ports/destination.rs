//! Lookup port for remote storage destinations.

use crate::backup::domain::{DestinationId, RemoteDestination};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for destination catalog operations.
pub type DestinationCatalogResult<T> = Result<T, DestinationCatalogError>;

/// Read access to the registered remote destinations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Finds a destination by identifier; `None` when it does not exist.
    async fn find_destination(
        &self,
        id: DestinationId,
    ) -> DestinationCatalogResult<Option<RemoteDestination>>;
}

/// Errors returned by destination catalog adapters.
#[derive(Debug, Clone, Error)]
pub enum DestinationCatalogError {
    /// Lookup failed.
    #[error("destination catalog error: {0}")]
    Lookup(Arc<dyn std::error::Error + Send + Sync>),
}

impl DestinationCatalogError {
    /// Wraps a lookup error.
    pub fn lookup(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Lookup(Arc::new(err))
    }
}
