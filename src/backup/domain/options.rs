//! Dump tool flags attached to a definition.

use serde::{Deserialize, Serialize};

/// Independent `pg_dump` switches.
///
/// Combinations such as `data_only` with `schema_only` are stored as given;
/// the dump tool decides whether they are legal together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "each flag maps one-to-one onto a dump tool switch"
)]
pub struct DumpOptions {
    /// Dump only data, not schema.
    pub data_only: bool,
    /// Dump only schema, not data.
    pub schema_only: bool,
    /// Emit commands to drop objects before recreating them.
    pub clean: bool,
    /// Use `IF EXISTS` when dropping objects.
    pub if_exists: bool,
    /// Emit a command to create the database.
    pub create: bool,
    /// Do not dump comments.
    pub no_comments: bool,
}

impl DumpOptions {
    /// Command-line switches for the set flags, in a stable order.
    #[must_use]
    pub fn to_args(self) -> Vec<&'static str> {
        [
            (self.data_only, "--data-only"),
            (self.schema_only, "--schema-only"),
            (self.clean, "--clean"),
            (self.if_exists, "--if-exists"),
            (self.create, "--create"),
            (self.no_comments, "--no-comments"),
        ]
        .into_iter()
        .filter_map(|(enabled, flag)| enabled.then_some(flag))
        .collect()
    }
}
