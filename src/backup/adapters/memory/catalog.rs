//! In-memory destination catalog.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::backup::{
    domain::{DestinationId, RemoteDestination},
    ports::{DestinationCatalog, DestinationCatalogError, DestinationCatalogResult},
};

/// Thread-safe catalog of remote destinations.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDestinationCatalog {
    destinations: Arc<RwLock<HashMap<DestinationId, RemoteDestination>>>,
}

impl InMemoryDestinationCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a destination.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationCatalogError`] when the internal lock is
    /// poisoned.
    pub fn register(&self, destination: RemoteDestination) -> DestinationCatalogResult<()> {
        let mut destinations = self.destinations.write().map_err(|err| {
            DestinationCatalogError::lookup(std::io::Error::other(err.to_string()))
        })?;
        destinations.insert(destination.id, destination);
        Ok(())
    }
}

#[async_trait]
impl DestinationCatalog for InMemoryDestinationCatalog {
    async fn find_destination(
        &self,
        id: DestinationId,
    ) -> DestinationCatalogResult<Option<RemoteDestination>> {
        let destinations = self.destinations.read().map_err(|err| {
            DestinationCatalogError::lookup(std::io::Error::other(err.to_string()))
        })?;
        Ok(destinations.get(&id).cloned())
    }
}
