//! `PostgreSQL` repository implementation for definitions and runs.

use super::{
    models::{BackupDefinitionRow, BackupRunRow},
    schema::{backup_definitions, backup_runs},
};
use crate::backup::{
    domain::{
        ArtifactId, BackupDefinition, BackupDefinitionId, BackupRun, BackupRunId, CronSpec,
        DatabaseId, DefinitionSettings, DestinationDir, DestinationId, DestinationMode,
        DumpOptions, PersistedDefinitionData, PersistedRunData, RetentionDays, RunStatus,
        Schedule, TimeZoneName,
    },
    ports::{
        BackupDefinitionRepository, BackupRepositoryError, BackupRepositoryResult,
        BackupRunRepository, DefinitionListing, FaultedDefinition,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::warn;

/// `PostgreSQL` connection pool type used by backup adapters.
pub type BackupPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed store implementing both repository ports.
#[derive(Debug, Clone)]
pub struct PostgresBackupRepository {
    pool: BackupPgPool,
}

impl PostgresBackupRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: BackupPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> BackupRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> BackupRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(BackupRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(BackupRepositoryError::persistence)?
    }
}

#[async_trait]
impl BackupDefinitionRepository for PostgresBackupRepository {
    async fn store(&self, definition: &BackupDefinition) -> BackupRepositoryResult<()> {
        let definition_id = definition.id();
        let row = definition_to_row(definition)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(backup_definitions::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        BackupRepositoryError::DuplicateDefinition(definition_id)
                    }
                    _ => BackupRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, definition: &BackupDefinition) -> BackupRepositoryResult<()> {
        let definition_id = definition.id();
        let row = definition_to_row(definition)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                backup_definitions::table.filter(backup_definitions::id.eq(row.id)),
            )
            .set(&row)
            .execute(connection)
            .map_err(BackupRepositoryError::persistence)?;
            if updated == 0 {
                return Err(BackupRepositoryError::DefinitionNotFound(definition_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: BackupDefinitionId) -> BackupRepositoryResult<()> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, BackupRepositoryError, _>(|tx| {
                diesel::delete(
                    backup_runs::table.filter(backup_runs::definition_id.eq(id.into_inner())),
                )
                .execute(tx)?;
                let deleted = diesel::delete(
                    backup_definitions::table.filter(backup_definitions::id.eq(id.into_inner())),
                )
                .execute(tx)?;
                if deleted == 0 {
                    return Err(BackupRepositoryError::DefinitionNotFound(id));
                }
                Ok(())
            })
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: BackupDefinitionId,
    ) -> BackupRepositoryResult<Option<BackupDefinition>> {
        self.run_blocking(move |connection| {
            let row = backup_definitions::table
                .filter(backup_definitions::id.eq(id.into_inner()))
                .select(BackupDefinitionRow::as_select())
                .first::<BackupDefinitionRow>(connection)
                .optional()
                .map_err(BackupRepositoryError::persistence)?;
            row.map(row_to_definition).transpose()
        })
        .await
    }

    async fn list(&self) -> BackupRepositoryResult<DefinitionListing> {
        self.run_blocking(|connection| {
            let rows = backup_definitions::table
                .order((backup_definitions::created_at.asc(), backup_definitions::id.asc()))
                .select(BackupDefinitionRow::as_select())
                .load::<BackupDefinitionRow>(connection)?;
            Ok(rows_to_listing(rows))
        })
        .await
    }
}

#[async_trait]
impl BackupRunRepository for PostgresBackupRepository {
    async fn store_run(&self, run: &BackupRun) -> BackupRepositoryResult<()> {
        let run_id = run.id();
        let definition_id = run.definition_id();
        let row = run_to_row(run);
        self.run_blocking(move |connection| {
            diesel::insert_into(backup_runs::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        BackupRepositoryError::DefinitionNotFound(definition_id)
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        BackupRepositoryError::DuplicateRun(run_id)
                    }
                    _ => BackupRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_run(&self, run: &BackupRun) -> BackupRepositoryResult<()> {
        let run_id = run.id();
        let row = run_to_row(run);
        self.run_blocking(move |connection| {
            let updated = diesel::update(backup_runs::table.filter(backup_runs::id.eq(row.id)))
                .set(&row)
                .execute(connection)
                .map_err(BackupRepositoryError::persistence)?;
            if updated == 0 {
                return Err(BackupRepositoryError::RunNotFound(run_id));
            }
            Ok(())
        })
        .await
    }

    async fn list_runs(
        &self,
        definition_id: BackupDefinitionId,
    ) -> BackupRepositoryResult<Vec<BackupRun>> {
        self.run_blocking(move |connection| {
            backup_runs::table
                .filter(backup_runs::definition_id.eq(definition_id.into_inner()))
                .order((
                    backup_runs::scheduled_for.desc(),
                    backup_runs::started_at.desc(),
                ))
                .select(BackupRunRow::as_select())
                .load::<BackupRunRow>(connection)
                .map_err(BackupRepositoryError::persistence)?
                .into_iter()
                .map(row_to_run)
                .collect()
        })
        .await
    }

}

impl From<DieselError> for BackupRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// Splits loaded rows into valid definitions and faulted ids.
pub(super) fn rows_to_listing(rows: Vec<BackupDefinitionRow>) -> DefinitionListing {
    let mut listing = DefinitionListing::default();
    for row in rows {
        let id = BackupDefinitionId::from_uuid(row.id);
        match row_to_definition(row) {
            Ok(definition) => listing.definitions.push(definition),
            Err(err) => {
                warn!(definition_id = %id, error = %err, "stored definition no longer validates");
                listing.faulted.push(FaultedDefinition {
                    id,
                    reason: err.to_string(),
                });
            }
        }
    }
    listing
}

pub(super) fn definition_to_row(
    definition: &BackupDefinition,
) -> BackupRepositoryResult<BackupDefinitionRow> {
    let settings = definition.settings();
    let retention_days =
        i32::try_from(settings.retention.days()).map_err(BackupRepositoryError::persistence)?;
    Ok(BackupDefinitionRow {
        id: definition.id().into_inner(),
        database_id: settings.database_id.into_inner(),
        destination_id: settings
            .destination
            .destination_id()
            .map(DestinationId::into_inner),
        is_local: settings.destination.is_local(),
        name: settings.name.clone(),
        cron_expression: settings.schedule.cron().as_str().to_owned(),
        time_zone: settings.schedule.time_zone().as_str().to_owned(),
        is_active: settings.is_active,
        dest_dir: settings.dest_dir.as_str().to_owned(),
        retention_days,
        opt_data_only: settings.options.data_only,
        opt_schema_only: settings.options.schema_only,
        opt_clean: settings.options.clean,
        opt_if_exists: settings.options.if_exists,
        opt_create: settings.options.create,
        opt_no_comments: settings.options.no_comments,
        created_at: definition.created_at(),
        updated_at: definition.updated_at(),
    })
}

pub(super) fn row_to_definition(
    row: BackupDefinitionRow,
) -> BackupRepositoryResult<BackupDefinition> {
    let destination = match (row.is_local, row.destination_id) {
        (true, _) => DestinationMode::Local,
        (false, Some(id)) => DestinationMode::Remote(DestinationId::from_uuid(id)),
        (false, None) => {
            return Err(BackupRepositoryError::persistence(std::io::Error::other(
                format!("remote definition {} has no destination", row.id),
            )));
        }
    };
    let cron = CronSpec::parse(&row.cron_expression).map_err(BackupRepositoryError::persistence)?;
    let time_zone = TimeZoneName::new(&row.time_zone).map_err(BackupRepositoryError::persistence)?;
    let dest_dir = DestinationDir::new(row.dest_dir).map_err(BackupRepositoryError::persistence)?;
    let retention = RetentionDays::new(i64::from(row.retention_days))
        .map_err(BackupRepositoryError::persistence)?;

    let settings = DefinitionSettings {
        database_id: DatabaseId::from_uuid(row.database_id),
        destination,
        name: row.name,
        schedule: Schedule::new(cron, time_zone),
        is_active: row.is_active,
        dest_dir,
        retention,
        options: DumpOptions {
            data_only: row.opt_data_only,
            schema_only: row.opt_schema_only,
            clean: row.opt_clean,
            if_exists: row.opt_if_exists,
            create: row.opt_create,
            no_comments: row.opt_no_comments,
        },
    };
    Ok(BackupDefinition::from_persisted(PersistedDefinitionData {
        id: BackupDefinitionId::from_uuid(row.id),
        settings,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn run_to_row(run: &BackupRun) -> BackupRunRow {
    BackupRunRow {
        id: run.id().into_inner(),
        definition_id: run.definition_id().into_inner(),
        scheduled_for: run.scheduled_for(),
        status: run.status().as_str().to_owned(),
        started_at: run.started_at(),
        finished_at: run.finished_at(),
        error_message: run.error().map(str::to_owned),
        artifact_key: run.artifact().map(|artifact| artifact.as_str().to_owned()),
        artifact_pruned_at: run.artifact_pruned_at(),
    }
}

pub(super) fn row_to_run(row: BackupRunRow) -> BackupRepositoryResult<BackupRun> {
    let status =
        RunStatus::try_from(row.status.as_str()).map_err(BackupRepositoryError::persistence)?;
    Ok(BackupRun::from_persisted(PersistedRunData {
        id: BackupRunId::from_uuid(row.id),
        definition_id: BackupDefinitionId::from_uuid(row.definition_id),
        scheduled_for: row.scheduled_for,
        status,
        started_at: row.started_at,
        finished_at: row.finished_at,
        error: row.error_message,
        artifact: row.artifact_key.map(ArtifactId::new),
        artifact_pruned_at: row.artifact_pruned_at,
    }))
}
