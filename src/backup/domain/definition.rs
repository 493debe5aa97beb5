//! Backup definition aggregate root.

use super::{
    BackupDefinitionId, DatabaseId, DestinationDir, DestinationMode, DumpOptions, RetentionDays,
    RetentionPolicy, Schedule,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Normalized, validated content of a definition.
///
/// Produced only by [`super::normalize`] or by reloading persisted rows;
/// every field already satisfies its invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionSettings {
    /// Database to dump.
    pub database_id: DatabaseId,
    /// Local filesystem or a remote destination.
    pub destination: DestinationMode,
    /// Human-readable name, trimmed.
    pub name: String,
    /// Cron expression and timezone.
    pub schedule: Schedule,
    /// Whether the scheduler fires this definition.
    pub is_active: bool,
    /// Directory under the destination root.
    pub dest_dir: DestinationDir,
    /// Days artifacts are kept; `0` keeps them forever.
    pub retention: RetentionDays,
    /// Dump tool switches.
    pub options: DumpOptions,
}

/// A persisted backup policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDefinition {
    id: BackupDefinitionId,
    settings: DefinitionSettings,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedDefinitionData {
    /// Persisted identifier.
    pub id: BackupDefinitionId,
    /// Persisted settings.
    pub settings: DefinitionSettings,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BackupDefinition {
    /// Creates a new definition from validated settings.
    #[must_use]
    pub fn new(settings: DefinitionSettings, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: BackupDefinitionId::new(),
            settings,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a definition from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedDefinitionData) -> Self {
        Self {
            id: data.id,
            settings: data.settings,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the definition identifier.
    #[must_use]
    pub const fn id(&self) -> BackupDefinitionId {
        self.id
    }

    /// Returns the full validated settings.
    #[must_use]
    pub const fn settings(&self) -> &DefinitionSettings {
        &self.settings
    }

    /// Returns the database reference.
    #[must_use]
    pub const fn database_id(&self) -> DatabaseId {
        self.settings.database_id
    }

    /// Returns the destination mode.
    #[must_use]
    pub const fn destination(&self) -> DestinationMode {
        self.settings.destination
    }

    /// Returns the definition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Returns the schedule.
    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.settings.schedule
    }

    /// Returns whether the definition is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.settings.is_active
    }

    /// Returns the destination directory.
    #[must_use]
    pub const fn dest_dir(&self) -> &DestinationDir {
        &self.settings.dest_dir
    }

    /// Returns the retention window.
    #[must_use]
    pub const fn retention(&self) -> RetentionDays {
        self.settings.retention
    }

    /// Returns the retention policy derived from the window.
    #[must_use]
    pub const fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.settings.retention)
    }

    /// Returns the dump switches.
    #[must_use]
    pub const fn options(&self) -> DumpOptions {
        self.settings.options
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces every field with freshly validated settings.
    pub fn replace_settings(&mut self, settings: DefinitionSettings, clock: &impl Clock) {
        self.settings = settings;
        self.touch(clock);
    }

    /// Flips the active flag; run history is untouched.
    pub fn set_active(&mut self, active: bool, clock: &impl Clock) {
        self.settings.is_active = active;
        self.touch(clock);
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
