//! `PostgreSQL` lookup of remote destinations.

use super::{models::DestinationRow, repository::BackupPgPool, schema::destinations};
use crate::backup::{
    domain::{DestinationId, RemoteDestination},
    ports::{DestinationCatalog, DestinationCatalogError, DestinationCatalogResult},
};
use async_trait::async_trait;
use diesel::prelude::*;

/// Reads destinations owned by the destinations service.
#[derive(Debug, Clone)]
pub struct PostgresDestinationCatalog {
    pool: BackupPgPool,
}

impl PostgresDestinationCatalog {
    /// Creates a catalog from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: BackupPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DestinationCatalog for PostgresDestinationCatalog {
    async fn find_destination(
        &self,
        id: DestinationId,
    ) -> DestinationCatalogResult<Option<RemoteDestination>> {
        let pool = self.pool.clone();
        let row = tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(DestinationCatalogError::lookup)?;
            destinations::table
                .filter(destinations::id.eq(id.into_inner()))
                .select(DestinationRow::as_select())
                .first::<DestinationRow>(&mut connection)
                .optional()
                .map_err(DestinationCatalogError::lookup)
        })
        .await
        .map_err(DestinationCatalogError::lookup)??;
        Ok(row.map(row_to_destination))
    }
}

fn row_to_destination(row: DestinationRow) -> RemoteDestination {
    RemoteDestination {
        id: DestinationId::from_uuid(row.id),
        name: row.name,
        bucket_name: row.bucket_name,
        region: row.region,
        endpoint: row.endpoint,
    }
}
