//! Destination directories and resolved write locations.

use super::{ArtifactId, BackupDomainError, BackupRunId, DestinationId, TimeZoneName};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory relative to a destination root, written as `/a/b`.
///
/// Starts with `/`, does not end with `/`, contains no whitespace and no
/// `..` segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DestinationDir(String);

impl DestinationDir {
    /// Validates a destination directory without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`BackupDomainError::UnsafePath`] when the value is empty,
    /// not rooted, has a trailing slash, contains whitespace or would escape
    /// the destination root through a `..` segment.
    pub fn new(value: impl Into<String>) -> Result<Self, BackupDomainError> {
        let raw = value.into();
        let reason = if raw.is_empty() {
            Some("must not be empty")
        } else if !raw.starts_with('/') {
            Some("must start with '/'")
        } else if raw.ends_with('/') {
            Some("must not end with '/'")
        } else if raw.chars().any(char::is_whitespace) {
            Some("must not contain whitespace")
        } else if raw.split('/').any(|segment| segment == "..") {
            Some("must not contain '..' segments")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(BackupDomainError::UnsafePath { path: raw, reason }),
            None => Ok(Self(raw)),
        }
    }

    /// Returns the directory as written, including the leading slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the directory without its leading slash, suitable for
    /// joining onto a root or using as an object-key prefix.
    #[must_use]
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches('/')
    }
}

impl TryFrom<String> for DestinationDir {
    type Error = BackupDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DestinationDir> for String {
    fn from(value: DestinationDir) -> Self {
        value.0
    }
}

impl fmt::Display for DestinationDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a definition writes its artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "destination_id", rename_all = "snake_case")]
pub enum DestinationMode {
    /// The host filesystem under the configured local backup root.
    Local,
    /// A named remote storage target.
    Remote(DestinationId),
}

impl DestinationMode {
    /// Returns whether artifacts are written to the local filesystem.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }

    /// Returns the remote destination reference, if any.
    #[must_use]
    pub const fn destination_id(self) -> Option<DestinationId> {
        match self {
            Self::Local => None,
            Self::Remote(id) => Some(id),
        }
    }
}

/// A remote storage target registered outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDestination {
    /// Destination identifier.
    pub id: DestinationId,
    /// Human-readable name.
    pub name: String,
    /// Bucket receiving artifacts.
    pub bucket_name: String,
    /// Storage region.
    pub region: String,
    /// Service endpoint.
    pub endpoint: String,
}

/// Concrete root a resolved destination writes under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationRoot {
    /// Local filesystem root.
    Local(Utf8PathBuf),
    /// Remote storage target.
    Remote(RemoteDestination),
}

/// Transient write location for one run: a root plus a verified directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    root: DestinationRoot,
    directory: DestinationDir,
}

impl ResolvedDestination {
    /// Combines a root with a validated directory.
    #[must_use]
    pub const fn new(root: DestinationRoot, directory: DestinationDir) -> Self {
        Self { root, directory }
    }

    /// Returns the destination root.
    #[must_use]
    pub const fn root(&self) -> &DestinationRoot {
        &self.root
    }

    /// Returns the verified directory.
    #[must_use]
    pub const fn directory(&self) -> &DestinationDir {
        &self.directory
    }

    /// Local directory receiving artifacts, when the root is local.
    #[must_use]
    pub fn local_directory(&self) -> Option<Utf8PathBuf> {
        match &self.root {
            DestinationRoot::Local(root) => Some(root.join(self.directory.relative())),
            DestinationRoot::Remote(_) => None,
        }
    }

    /// Key of the artifact a run produces, relative to the destination root.
    ///
    /// Layout is `<dir>/<YYYY>/<MM>/<DD>/dump-<YYYYMMDD>-<HHMMSS>-<run>.zip`
    /// with the date rendered in the definition's timezone at the scheduled
    /// fire instant.
    #[must_use]
    pub fn artifact_key(
        &self,
        scheduled_for: DateTime<Utc>,
        time_zone: TimeZoneName,
        run_id: BackupRunId,
    ) -> ArtifactId {
        let local = scheduled_for.with_timezone(&time_zone.tz());
        let day_dir = local.format("%Y/%m/%d");
        let stamp = local.format("%Y%m%d-%H%M%S");
        let key = Utf8Path::new(self.directory.relative())
            .join(day_dir.to_string())
            .join(format!("dump-{stamp}-{run_id}.zip"));
        ArtifactId::new(key.into_string())
    }

    /// Returns whether `artifact` lives under this destination's directory.
    #[must_use]
    pub fn contains(&self, artifact: &ArtifactId) -> bool {
        Utf8Path::new(artifact.as_str()).starts_with(self.directory.relative())
    }
}
