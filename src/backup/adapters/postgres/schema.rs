//! Diesel schema for backup persistence.

diesel::table! {
    /// Backup policies.
    backup_definitions (id) {
        /// Definition identifier.
        id -> Uuid,
        /// Database being dumped.
        database_id -> Uuid,
        /// Remote destination; null for local backups.
        destination_id -> Nullable<Uuid>,
        /// Whether artifacts go to the local filesystem.
        is_local -> Bool,
        /// Human-readable name.
        #[max_length = 255]
        name -> Varchar,
        /// Normalized five-field cron expression.
        #[max_length = 255]
        cron_expression -> Varchar,
        /// IANA timezone identifier.
        #[max_length = 100]
        time_zone -> Varchar,
        /// Whether the scheduler fires the definition.
        is_active -> Bool,
        /// Directory under the destination root.
        dest_dir -> Text,
        /// Retention window in days, 0 disables expiry.
        retention_days -> Int4,
        /// `--data-only` switch.
        opt_data_only -> Bool,
        /// `--schema-only` switch.
        opt_schema_only -> Bool,
        /// `--clean` switch.
        opt_clean -> Bool,
        /// `--if-exists` switch.
        opt_if_exists -> Bool,
        /// `--create` switch.
        opt_create -> Bool,
        /// `--no-comments` switch.
        opt_no_comments -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Execution attempts, cascaded on definition deletion.
    backup_runs (id) {
        /// Run identifier.
        id -> Uuid,
        /// Owning definition.
        definition_id -> Uuid,
        /// Fire instant.
        scheduled_for -> Timestamptz,
        /// Run status.
        #[max_length = 20]
        status -> Varchar,
        /// Dump start.
        started_at -> Nullable<Timestamptz>,
        /// Run end.
        finished_at -> Nullable<Timestamptz>,
        /// Failure message.
        error_message -> Nullable<Text>,
        /// Produced artifact key.
        artifact_key -> Nullable<Text>,
        /// When retention removed the artifact.
        artifact_pruned_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Remote storage destinations, owned by the destinations service.
    destinations (id) {
        /// Destination identifier.
        id -> Uuid,
        /// Human-readable name.
        #[max_length = 255]
        name -> Varchar,
        /// Bucket receiving artifacts.
        #[max_length = 255]
        bucket_name -> Varchar,
        /// Storage region.
        #[max_length = 255]
        region -> Varchar,
        /// Service endpoint.
        #[max_length = 255]
        endpoint -> Varchar,
    }
}

diesel::joinable!(backup_runs -> backup_definitions (definition_id));
diesel::allow_tables_to_appear_in_same_query!(backup_definitions, backup_runs, destinations);
