//! Retention window and expiry decisions for produced artifacts.

use super::{ArtifactId, BackupDomainError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Number of days an artifact is kept; `0` disables expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RetentionDays(u16);

impl RetentionDays {
    /// Largest accepted window, one hundred years.
    pub const MAX: u16 = 36_500;

    /// Retention disabled.
    pub const NEVER_EXPIRE: Self = Self(0);

    /// Creates a validated retention window.
    ///
    /// # Errors
    ///
    /// Returns [`BackupDomainError::RetentionOutOfRange`] for negative values
    /// or values above [`Self::MAX`].
    pub fn new(days: i64) -> Result<Self, BackupDomainError> {
        u16::try_from(days)
            .ok()
            .filter(|value| *value <= Self::MAX)
            .map(Self)
            .ok_or(BackupDomainError::RetentionOutOfRange(days))
    }

    /// Returns the number of days.
    #[must_use]
    pub const fn days(self) -> u16 {
        self.0
    }

    /// Returns whether retention is disabled.
    #[must_use]
    pub const fn is_disabled(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i64> for RetentionDays {
    type Error = BackupDomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RetentionDays> for i64 {
    fn from(value: RetentionDays) -> Self {
        Self::from(value.0)
    }
}

impl fmt::Display for RetentionDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored artifact as reported by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Storage key.
    pub id: ArtifactId,
    /// When the artifact was written.
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Creates an artifact listing entry.
    #[must_use]
    pub const fn new(id: ArtifactId, created_at: DateTime<Utc>) -> Self {
        Self { id, created_at }
    }
}

/// Decides which artifacts have outlived their retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: RetentionDays,
}

impl RetentionPolicy {
    /// Creates a policy for the given window.
    #[must_use]
    pub const fn new(window: RetentionDays) -> Self {
        Self { window }
    }

    /// Returns the artifacts to delete.
    ///
    /// The newest artifact (every artifact sharing the latest `created_at`)
    /// is never returned, whatever its age. Others expire when strictly
    /// older than the window; an artifact exactly at the edge survives.
    #[must_use]
    pub fn expired(&self, artifacts: &[Artifact], now: DateTime<Utc>) -> BTreeSet<ArtifactId> {
        if self.window.is_disabled() {
            return BTreeSet::new();
        }
        let Some(newest) = artifacts.iter().map(|artifact| artifact.created_at).max() else {
            return BTreeSet::new();
        };
        let window = TimeDelta::days(i64::from(self.window.days()));

        artifacts
            .iter()
            .filter(|artifact| artifact.created_at < newest)
            .filter(|artifact| now.signed_duration_since(artifact.created_at) > window)
            .map(|artifact| artifact.id.clone())
            .collect()
    }
}
