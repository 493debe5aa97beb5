//! In-memory dump and artifact storage.

use async_trait::async_trait;
use mockable::Clock;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, Semaphore};

use crate::backup::{
    domain::{Artifact, ArtifactId, ResolvedDestination},
    ports::{BackupStorage, BackupStorageError, BackupStorageResult, DumpRequest},
};
use chrono::{DateTime, Utc};

/// Storage double that records dumps as artifact keys stamped with the
/// clock's current time.
///
/// Failures can be scripted with [`Self::fail_next_dump`] and
/// [`Self::fail_deletes`]; [`Self::with_gate`] holds dumps until permits are
/// released so concurrent dispatch can be observed.
#[derive(Debug, Clone)]
pub struct InMemoryBackupStorage<C: Clock + Send + Sync> {
    state: Arc<Mutex<StorageState>>,
    clock: C,
    gate: Option<Arc<Semaphore>>,
    dump_started: Arc<Notify>,
}

#[derive(Debug, Default)]
struct StorageState {
    artifacts: BTreeMap<ArtifactId, DateTime<Utc>>,
    requests: Vec<DumpRequest>,
    scripted_failures: VecDeque<String>,
    failing_deletes: bool,
}

impl<C: Clock + Send + Sync> InMemoryBackupStorage<C> {
    /// Creates empty storage using `clock` for artifact timestamps.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(StorageState::default())),
            clock,
            gate: None,
            dump_started: Arc::new(Notify::new()),
        }
    }

    /// Makes every dump wait for a permit from `gate`.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Notified each time a dump begins.
    #[must_use]
    pub fn dump_started(&self) -> Arc<Notify> {
        Arc::clone(&self.dump_started)
    }

    /// Makes the next dump fail with `message`.
    pub fn fail_next_dump(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.lock() {
            state.scripted_failures.push_back(message.into());
        }
    }

    /// Makes artifact deletion fail while `failing` is set.
    pub fn fail_deletes(&self, failing: bool) {
        if let Ok(mut state) = self.lock() {
            state.failing_deletes = failing;
        }
    }

    /// Seeds an artifact as if an earlier run had produced it.
    pub fn insert_artifact(&self, artifact: Artifact) {
        if let Ok(mut state) = self.lock() {
            state.artifacts.insert(artifact.id, artifact.created_at);
        }
    }

    /// Returns every stored artifact, oldest first.
    #[must_use]
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.lock()
            .map(|state| sorted_artifacts(&state.artifacts, |_| true))
            .unwrap_or_default()
    }

    /// Returns the dump requests received so far.
    #[must_use]
    pub fn dump_requests(&self) -> Vec<DumpRequest> {
        self.lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> BackupStorageResult<MutexGuard<'_, StorageState>> {
        self.state
            .lock()
            .map_err(|err| BackupStorageError::io(std::io::Error::other(err.to_string())))
    }
}

fn sorted_artifacts(
    artifacts: &BTreeMap<ArtifactId, DateTime<Utc>>,
    keep: impl Fn(&ArtifactId) -> bool,
) -> Vec<Artifact> {
    let mut listed: Vec<Artifact> = artifacts
        .iter()
        .filter(|(id, _)| keep(id))
        .map(|(id, created_at)| Artifact::new(id.clone(), *created_at))
        .collect();
    listed.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    listed
}

#[async_trait]
impl<C: Clock + Send + Sync> BackupStorage for InMemoryBackupStorage<C> {
    async fn run_dump(&self, request: &DumpRequest) -> BackupStorageResult<ArtifactId> {
        self.dump_started.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(BackupStorageError::io)?.forget();
        }

        let mut state = self.lock()?;
        state.requests.push(request.clone());
        if let Some(message) = state.scripted_failures.pop_front() {
            return Err(BackupStorageError::DumpFailed(message));
        }
        state
            .artifacts
            .insert(request.artifact_key.clone(), self.clock.utc());
        Ok(request.artifact_key.clone())
    }

    async fn list_artifacts(
        &self,
        destination: &ResolvedDestination,
    ) -> BackupStorageResult<Vec<Artifact>> {
        let state = self.lock()?;
        Ok(sorted_artifacts(&state.artifacts, |id| {
            destination.contains(id)
        }))
    }

    async fn delete_artifact(
        &self,
        _destination: &ResolvedDestination,
        artifact: &ArtifactId,
    ) -> BackupStorageResult<()> {
        let mut state = self.lock()?;
        if state.failing_deletes {
            return Err(BackupStorageError::io(std::io::Error::other(format!(
                "refusing to delete {artifact}"
            ))));
        }
        state
            .artifacts
            .remove(artifact)
            .map(|_| ())
            .ok_or_else(|| BackupStorageError::ArtifactNotFound(artifact.clone()))
    }
}
