//! Maps a definition's destination mode and directory to a write location.

use crate::backup::{
    domain::{
        BackupDefinition, BackupDomainError, DestinationDir, DestinationId, DestinationMode,
        DestinationRoot, ResolvedDestination,
    },
    ports::{DestinationCatalog, DestinationCatalogError},
};
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Reasons a destination cannot be resolved.
#[derive(Debug, Clone, Error)]
pub enum DestinationError {
    /// The remote destination does not exist.
    #[error("destination {0} not found")]
    DestinationNotFound(DestinationId),
    /// The directory could escape the destination root.
    #[error(transparent)]
    UnsafePath(BackupDomainError),
    /// The destination catalog failed.
    #[error(transparent)]
    Catalog(#[from] DestinationCatalogError),
}

/// Result type for destination resolution.
pub type DestinationResult<T> = Result<T, DestinationError>;

/// Resolves destinations against the local root and the remote catalog.
///
/// Resolution never touches the filesystem.
#[derive(Clone)]
pub struct DestinationResolver<L>
where
    L: DestinationCatalog,
{
    catalog: Arc<L>,
    local_root: Utf8PathBuf,
}

impl<L> DestinationResolver<L>
where
    L: DestinationCatalog,
{
    /// Creates a resolver rooting local destinations at `local_root`.
    #[must_use]
    pub fn new(catalog: Arc<L>, local_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            catalog,
            local_root: local_root.into(),
        }
    }

    /// Returns the configured local root.
    #[must_use]
    pub const fn local_root(&self) -> &Utf8PathBuf {
        &self.local_root
    }

    /// Validates `relative_dir` and resolves the root for `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError::UnsafePath`] for a directory that is
    /// empty, relative, ends with `/` or contains `..`, and
    /// [`DestinationError::DestinationNotFound`] for an unknown remote.
    pub async fn resolve(
        &self,
        mode: DestinationMode,
        relative_dir: &str,
    ) -> DestinationResult<ResolvedDestination> {
        let directory = DestinationDir::new(relative_dir).map_err(DestinationError::UnsafePath)?;
        self.resolve_dir(mode, directory).await
    }

    /// Resolves the destination of a stored definition.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub async fn resolve_definition(
        &self,
        definition: &BackupDefinition,
    ) -> DestinationResult<ResolvedDestination> {
        self.resolve_dir(definition.destination(), definition.dest_dir().clone())
            .await
    }

    async fn resolve_dir(
        &self,
        mode: DestinationMode,
        directory: DestinationDir,
    ) -> DestinationResult<ResolvedDestination> {
        let root = match mode {
            DestinationMode::Local => DestinationRoot::Local(self.local_root.clone()),
            DestinationMode::Remote(id) => {
                let destination = self
                    .catalog
                    .find_destination(id)
                    .await?
                    .ok_or(DestinationError::DestinationNotFound(id))?;
                DestinationRoot::Remote(destination)
            }
        };
        Ok(ResolvedDestination::new(root, directory))
    }
}
