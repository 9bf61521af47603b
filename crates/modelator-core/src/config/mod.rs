mod container;
mod database;
mod generator;
mod health;
mod migration;

pub use container::{ContainerConfig, DEFAULT_LABEL_VALUE};
pub use database::{DatabaseConfig, DriverKind};
pub use generator::{GeneratorConfig, CONFIG_PLACEHOLDER};
pub use health::HealthCheckConfig;
pub use migration::{MigrationConfig, MigrationEngineKind};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ModelatorError, Result};

/// Root configuration for a modelator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelatorConfig {
    /// Connection to the disposable database.
    pub database: DatabaseConfig,

    /// Container that hosts the database.
    pub container: ContainerConfig,

    /// Readiness polling.
    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Migration engine and sources.
    pub migration: MigrationConfig,

    /// Code generator invoked against the migrated schema.
    pub generator: GeneratorConfig,

    /// Whole-run settings.
    #[serde(default)]
    pub run: RunConfig,
}

impl ModelatorConfig {
    /// Load, resolve, and validate configuration from a TOML file.
    ///
    /// Relative paths are resolved against the file's directory and a missing
    /// `container.label_value` is derived from the file's canonical path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelatorError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::parse_toml(&content)?;

        let canonical = path.canonicalize()?;
        let base = canonical.parent().unwrap_or(Path::new("."));
        config.resolve_paths(base);

        if config.container.label_value.is_none() {
            let derived = label_digest(&canonical);
            tracing::debug!(label_value = %derived, "Derived container label from config path");
            config.container.label_value = Some(derived);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| ModelatorError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Make relative paths absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in &mut self.migration.directories {
            *dir = absolutize(base, dir);
        }
        self.generator.config = absolutize(base, &self.generator.config);
        if let Some(dir) = &mut self.generator.working_dir {
            *dir = absolutize(base, dir);
        }
    }

    /// Reject configuration that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.container.validate()?;
        self.health_check.validate()?;
        self.migration.validate()?;
        self.generator.validate()?;
        Ok(())
    }
}

/// Whole-run settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// Cancel the run once this many seconds have passed.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Short stable digest of a config path, used as the container label value.
fn label_digest(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..12].to_string()
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => result = result.replace(&cap[0], &value),
            Err(_) => tracing::warn!(variable = %var_name, "Config references unset environment variable"),
        }
    }

    result
}
