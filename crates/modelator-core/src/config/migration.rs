use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ModelatorError, Result};

/// Which migration engine applies the scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationEngineKind {
    /// Version-ordered SQL files tracked in a schema-history table.
    #[serde(alias = "flyway")]
    Versioned,
    /// A single `databaseChangeLog` file declaring ordered change-sets.
    #[serde(alias = "liquibase")]
    Changelog,
}

impl MigrationEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Versioned => "versioned",
            Self::Changelog => "changelog",
        }
    }
}

/// Migration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub engine: MigrationEngineKind,

    /// Directories holding migration sources, searched in order.
    pub directories: Vec<PathBuf>,

    /// Schemas managed by the engine; empty means the connection's current schema.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Ledger table the engine keeps inside the target database.
    #[serde(default = "default_history_table")]
    pub history_table: String,

    /// Drop every managed schema before migrating.
    #[serde(default = "default_clean")]
    pub clean: bool,
}

fn default_history_table() -> String {
    "schema_history".to_string()
}

fn default_clean() -> bool {
    true
}

impl MigrationConfig {
    pub fn new(engine: MigrationEngineKind, directories: Vec<PathBuf>) -> Self {
        Self {
            engine,
            directories,
            schemas: Vec::new(),
            history_table: default_history_table(),
            clean: default_clean(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.directories.is_empty() {
            return Err(ModelatorError::Config(
                "migration.directories must name at least one directory".into(),
            ));
        }
        if self.history_table.trim().is_empty() {
            return Err(ModelatorError::Config(
                "migration.history_table must not be empty".into(),
            ));
        }
        if let Some(blank) = self.schemas.iter().find(|s| s.trim().is_empty()) {
            return Err(ModelatorError::Config(format!(
                "migration.schemas contains a blank entry '{}'",
                blank
            )));
        }
        Ok(())
    }
}
