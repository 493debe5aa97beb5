//! In-memory repository for definitions and their runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backup::{
    domain::{BackupDefinition, BackupDefinitionId, BackupRun, BackupRunId},
    ports::{
        BackupDefinitionRepository, BackupRepositoryError, BackupRepositoryResult,
        BackupRunRepository, DefinitionListing, FaultedDefinition,
    },
};

/// Thread-safe in-memory store implementing both repository ports.
///
/// Definitions and runs share one lock so deleting a definition removes its
/// runs atomically, mirroring the cascading foreign key of the SQL schema.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackupRepository {
    state: Arc<RwLock<InMemoryBackupState>>,
}

#[derive(Debug, Default)]
struct InMemoryBackupState {
    definitions: HashMap<BackupDefinitionId, BackupDefinition>,
    runs: HashMap<BackupRunId, BackupRun>,
    corrupt: HashMap<BackupDefinitionId, String>,
}

impl InMemoryBackupRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stored entry that no longer reconstructs into a definition.
    ///
    /// The entry replaces any valid definition with the same identifier and
    /// is reported by [`BackupDefinitionRepository::list`] as faulted.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRepositoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn insert_corrupt(
        &self,
        id: BackupDefinitionId,
        reason: impl Into<String>,
    ) -> BackupRepositoryResult<()> {
        let mut state = self.write()?;
        state.definitions.remove(&id);
        state.corrupt.insert(id, reason.into());
        Ok(())
    }

    fn read(&self) -> BackupRepositoryResult<RwLockReadGuard<'_, InMemoryBackupState>> {
        self.state.read().map_err(|err| {
            BackupRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> BackupRepositoryResult<RwLockWriteGuard<'_, InMemoryBackupState>> {
        self.state.write().map_err(|err| {
            BackupRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl BackupDefinitionRepository for InMemoryBackupRepository {
    async fn store(&self, definition: &BackupDefinition) -> BackupRepositoryResult<()> {
        let mut state = self.write()?;
        if state.definitions.contains_key(&definition.id()) {
            return Err(BackupRepositoryError::DuplicateDefinition(definition.id()));
        }
        state
            .definitions
            .insert(definition.id(), definition.clone());
        Ok(())
    }

    async fn update(&self, definition: &BackupDefinition) -> BackupRepositoryResult<()> {
        let mut state = self.write()?;
        let slot = state
            .definitions
            .get_mut(&definition.id())
            .ok_or(BackupRepositoryError::DefinitionNotFound(definition.id()))?;
        *slot = definition.clone();
        Ok(())
    }

    async fn delete(&self, id: BackupDefinitionId) -> BackupRepositoryResult<()> {
        let mut state = self.write()?;
        let removed = state.definitions.remove(&id).is_some();
        if state.corrupt.remove(&id).is_none() && !removed {
            return Err(BackupRepositoryError::DefinitionNotFound(id));
        }
        state.runs.retain(|_, run| run.definition_id() != id);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: BackupDefinitionId,
    ) -> BackupRepositoryResult<Option<BackupDefinition>> {
        let state = self.read()?;
        if let Some(reason) = state.corrupt.get(&id) {
            return Err(BackupRepositoryError::persistence(std::io::Error::other(
                reason.clone(),
            )));
        }
        Ok(state.definitions.get(&id).cloned())
    }

    async fn list(&self) -> BackupRepositoryResult<DefinitionListing> {
        let state = self.read()?;
        let mut definitions: Vec<BackupDefinition> = state.definitions.values().cloned().collect();
        definitions.sort_by_key(|definition| (definition.created_at(), definition.id()));
        let mut faulted: Vec<FaultedDefinition> = state
            .corrupt
            .iter()
            .map(|(id, reason)| FaultedDefinition {
                id: *id,
                reason: reason.clone(),
            })
            .collect();
        faulted.sort_by_key(|entry| entry.id);
        Ok(DefinitionListing {
            definitions,
            faulted,
        })
    }
}

#[async_trait]
impl BackupRunRepository for InMemoryBackupRepository {
    async fn store_run(&self, run: &BackupRun) -> BackupRepositoryResult<()> {
        let mut state = self.write()?;
        if !state.definitions.contains_key(&run.definition_id()) {
            return Err(BackupRepositoryError::DefinitionNotFound(run.definition_id()));
        }
        if state.runs.contains_key(&run.id()) {
            return Err(BackupRepositoryError::DuplicateRun(run.id()));
        }
        state.runs.insert(run.id(), run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &BackupRun) -> BackupRepositoryResult<()> {
        let mut state = self.write()?;
        let slot = state
            .runs
            .get_mut(&run.id())
            .ok_or(BackupRepositoryError::RunNotFound(run.id()))?;
        *slot = run.clone();
        Ok(())
    }

    async fn list_runs(
        &self,
        definition_id: BackupDefinitionId,
    ) -> BackupRepositoryResult<Vec<BackupRun>> {
        let mut runs: Vec<BackupRun> = self
            .read()?
            .runs
            .values()
            .filter(|run| run.definition_id() == definition_id)
            .cloned()
            .collect();
        runs.sort_by(|left, right| {
            right
                .scheduled_for()
                .cmp(&left.scheduled_for())
                .then_with(|| right.started_at().cmp(&left.started_at()))
        });
        Ok(runs)
    }
}
