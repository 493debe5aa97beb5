//! Process configuration for the backup core.
//!
//! Settings come from an optional JSON file, then environment overrides,
//! then validation. Missing keys fall back to their defaults.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Overrides [`BackupSettings::local_backup_root`].
pub const LOCAL_ROOT_ENV: &str = "PGBACKUP_LOCAL_ROOT";
/// Overrides [`SchedulerSettings::max_sleep_secs`].
pub const MAX_SLEEP_ENV: &str = "PGBACKUP_MAX_SLEEP_SECS";
/// Overrides [`LogSettings::filter`].
pub const LOG_FILTER_ENV: &str = "PGBACKUP_LOG";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// File that failed to load.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid JSON for [`BackupSettings`].
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride {
        /// Environment variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
    /// The local root must be absolute.
    #[error("local backup root must be absolute, got {0}")]
    RelativeLocalRoot(Utf8PathBuf),
    /// The scheduler would never wake.
    #[error("scheduler.max_sleep_secs must be greater than zero")]
    ZeroSleep,
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSettings {
    /// Root directory for definitions using local storage.
    pub local_backup_root: Utf8PathBuf,
    /// Timer loop settings.
    pub scheduler: SchedulerSettings,
    /// Log output settings.
    pub log: LogSettings,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            local_backup_root: Utf8PathBuf::from("/backups"),
            scheduler: SchedulerSettings::default(),
            log: LogSettings::default(),
        }
    }
}

/// Timer loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Longest single sleep, so wall-clock jumps are noticed.
    pub max_sleep_secs: u64,
}

impl SchedulerSettings {
    /// Returns the sleep cap as a [`Duration`].
    #[must_use]
    pub const fn max_sleep(self) -> Duration {
        Duration::from_secs(self.max_sleep_secs)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self { max_sleep_secs: 60 }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Default `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
    /// Whether to emit ANSI colours.
    pub ansi: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            ansi: true,
        }
    }
}

impl BackupSettings {
    /// Parses settings from JSON without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown keys.
    pub fn from_json(contents: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Loads settings from `path`, applies process environment overrides
    /// and validates the result. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, an
    /// override is malformed, or validation fails.
    pub fn load(path: &Utf8Path) -> ConfigResult<Self> {
        let mut settings = match read_settings_file(path)? {
            Some(contents) => Self::from_json(&contents)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies overrides obtained from `lookup`, keyed by variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for a non-numeric sleep bound.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(root) = lookup(LOCAL_ROOT_ENV) {
            self.local_backup_root = Utf8PathBuf::from(root);
        }
        if let Some(raw) = lookup(MAX_SLEEP_ENV) {
            self.scheduler.max_sleep_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                    key: MAX_SLEEP_ENV,
                    value: raw.clone(),
                })?;
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV) {
            self.log.filter = filter;
        }
        Ok(())
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelativeLocalRoot`] or [`ConfigError::ZeroSleep`].
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.local_backup_root.is_absolute() {
            return Err(ConfigError::RelativeLocalRoot(self.local_backup_root.clone()));
        }
        if self.scheduler.max_sleep_secs == 0 {
            return Err(ConfigError::ZeroSleep);
        }
        Ok(())
    }
}

fn read_settings_file(path: &Utf8Path) -> ConfigResult<Option<String>> {
    let read_error = |source| ConfigError::Read {
        path: path.to_owned(),
        source,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| read_error(std::io::Error::other("path must include a file name")))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(read_error(err)),
    };
    match dir.read_to_string(file_name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(read_error(err)),
    }
}
