use serde::{Deserialize, Serialize};

use crate::error::{ModelatorError, Result};

/// Disposable container settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image reference, e.g. `postgres:16`.
    pub image: String,

    /// Ordered `KEY=VALUE` environment assignments.
    #[serde(default)]
    pub env: Vec<String>,

    /// Port published on the host.
    pub host_port: u16,

    /// Port the database listens on inside the container.
    pub container_port: u16,

    /// Label key applied to every container this tool creates.
    #[serde(default = "default_label_key")]
    pub label_key: String,

    /// Label value; derived from the config file location when absent.
    #[serde(default)]
    pub label_value: Option<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            env: Vec::new(),
            host_port: 5432,
            container_port: 5432,
            label_key: default_label_key(),
            label_value: None,
        }
    }
}

pub const DEFAULT_LABEL_VALUE: &str = "default";

fn default_label_key() -> String {
    "dev.modelator.instance".to_string()
}

impl ContainerConfig {
    /// The `(key, value)` label pair identifying this tool's containers.
    pub fn label(&self) -> (&str, &str) {
        (
            self.label_key.as_str(),
            self.label_value.as_deref().unwrap_or(DEFAULT_LABEL_VALUE),
        )
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(ModelatorError::Config("container.image must not be empty".into()));
        }
        if self.host_port == 0 || self.container_port == 0 {
            return Err(ModelatorError::Config(
                "container.host_port and container.container_port must be non-zero".into(),
            ));
        }
        if self.label_key.trim().is_empty() {
            return Err(ModelatorError::Config("container.label_key must not be empty".into()));
        }
        if let Some(bad) = self.env.iter().find(|e| !e.contains('=')) {
            return Err(ModelatorError::Config(format!(
                "container.env entry '{}' is not KEY=VALUE",
                bad
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postgres() -> ContainerConfig {
        ContainerConfig {
            image: "postgres:9.5".into(),
            env: vec!["POSTGRES_PASSWORD=secret".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_label_falls_back_to_default_value() {
        let config = postgres();
        assert_eq!(config.label(), ("dev.modelator.instance", DEFAULT_LABEL_VALUE));
    }

    #[test]
    fn test_env_entries_need_assignment() {
        let mut config = postgres();
        config.env.push("POSTGRES_DB".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = postgres();
        config.host_port = 0;
        assert!(config.validate().is_err());
    }
}
