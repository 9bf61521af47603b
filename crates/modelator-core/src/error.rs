use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Core error type for modelator operations.
#[derive(Error, Debug)]
pub enum ModelatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Failed to pull image {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Failed to create container from {image}: {reason}")]
    ContainerCreate { image: String, reason: String },

    #[error("Failed to remove container {container_id}: {reason}")]
    ContainerRemove {
        container_id: String,
        reason: String,
    },

    #[error(
        "Database unavailable after {attempts} attempt(s) in {elapsed:?}: {last_error}"
    )]
    DatabaseUnavailable {
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },

    #[error("Cannot find changelog file named 'databaseChangeLog' (.yaml, .yml, .json, .toml or .sql) in {}", display_paths(.directories))]
    ChangelogNotFound { directories: Vec<PathBuf> },

    #[error("More than one file named databaseChangeLog found in migrations folders: {}", display_paths(.paths))]
    AmbiguousChangelog { paths: Vec<PathBuf> },

    #[error("Migration '{name}' failed: {reason}")]
    Migration { name: String, reason: String },

    #[error("Checksum mismatch for '{name}': applied {expected}, found {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Code generation failed: {0}")]
    Generation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Run cancelled during {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl ModelatorError {
    pub fn migration(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Migration {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    let joined = paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("[{}]", joined)
}

/// Result type alias using ModelatorError.
pub type Result<T> = std::result::Result<T, ModelatorError>;
