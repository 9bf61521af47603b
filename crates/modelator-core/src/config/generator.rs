use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ModelatorError, Result};

/// Placeholder replaced by the generator configuration path in `args`.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

/// External code generator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Executable to run.
    pub program: String,

    /// Arguments; `{config}` is replaced by `config`.
    #[serde(default)]
    pub args: Vec<String>,

    /// The generator's own configuration document.
    pub config: PathBuf,

    /// Working directory for the generator process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl GeneratorConfig {
    /// Arguments with the configuration path substituted, or appended when
    /// no placeholder is present.
    pub fn resolved_args(&self) -> Vec<String> {
        let config = self.config.display().to_string();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(CONFIG_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(CONFIG_PLACEHOLDER, &config)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(config);
        }
        args
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(ModelatorError::Config("generator.program must not be empty".into()));
        }
        if !self.config.is_file() {
            return Err(ModelatorError::Config(format!(
                "generator configuration not found: {}",
                self.config.display()
            )));
        }
        Ok(())
    }
}
