//! Diesel row models for backup persistence.

use super::schema::{backup_definitions, backup_runs, destinations};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Row shape of `backup_definitions`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = backup_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "mirrors the boolean columns of the table"
)]
pub struct BackupDefinitionRow {
    /// Definition identifier.
    pub id: uuid::Uuid,
    /// Database being dumped.
    pub database_id: uuid::Uuid,
    /// Remote destination; `None` for local backups.
    pub destination_id: Option<uuid::Uuid>,
    /// Whether artifacts go to the local filesystem.
    pub is_local: bool,
    /// Human-readable name.
    pub name: String,
    /// Normalized cron expression.
    pub cron_expression: String,
    /// IANA timezone identifier.
    pub time_zone: String,
    /// Whether the scheduler fires the definition.
    pub is_active: bool,
    /// Directory under the destination root.
    pub dest_dir: String,
    /// Retention window in days.
    pub retention_days: i32,
    /// `--data-only` switch.
    pub opt_data_only: bool,
    /// `--schema-only` switch.
    pub opt_schema_only: bool,
    /// `--clean` switch.
    pub opt_clean: bool,
    /// `--if-exists` switch.
    pub opt_if_exists: bool,
    /// `--create` switch.
    pub opt_create: bool,
    /// `--no-comments` switch.
    pub opt_no_comments: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row shape of `backup_runs`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = backup_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct BackupRunRow {
    /// Run identifier.
    pub id: uuid::Uuid,
    /// Owning definition.
    pub definition_id: uuid::Uuid,
    /// Fire instant.
    pub scheduled_for: DateTime<Utc>,
    /// Run status.
    pub status: String,
    /// Dump start.
    pub started_at: Option<DateTime<Utc>>,
    /// Run end.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Produced artifact key.
    pub artifact_key: Option<String>,
    /// When retention removed the artifact.
    pub artifact_pruned_at: Option<DateTime<Utc>>,
}

/// Row shape of `destinations`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = destinations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DestinationRow {
    /// Destination identifier.
    pub id: uuid::Uuid,
    /// Human-readable name.
    pub name: String,
    /// Bucket receiving artifacts.
    pub bucket_name: String,
    /// Storage region.
    pub region: String,
    /// Service endpoint.
    pub endpoint: String,
}
