use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModelatorError, Result};

/// Database readiness polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Delay between probe attempts in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up once this much time has elapsed since the first attempt.
    #[serde(default = "default_max_duration")]
    pub max_duration_ms: u64,

    /// Statement that must execute successfully.
    #[serde(default = "default_probe_sql")]
    pub probe_sql: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_duration_ms: default_max_duration(),
            probe_sql: default_probe_sql(),
        }
    }
}

fn default_poll_interval() -> u64 {
    500
}

fn default_max_duration() -> u64 {
    20_000
}

fn default_probe_sql() -> String {
    "SELECT 1".to_string()
}

impl HealthCheckConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ModelatorError::Config(
                "health_check.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.probe_sql.trim().is_empty() {
            return Err(ModelatorError::Config("health_check.probe_sql must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: HealthCheckConfig = toml::from_str("").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.max_duration(), Duration::from_secs(20));
        assert_eq!(config.probe_sql, "SELECT 1");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = HealthCheckConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
