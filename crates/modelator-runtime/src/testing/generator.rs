use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use modelator_core::config::{DatabaseConfig, GeneratorConfig};
use modelator_core::{ModelatorError, Result};

use crate::generator::CodeGenerator;

/// Generator that records its invocations instead of running anything.
#[derive(Debug, Default)]
pub struct RecordingGenerator {
    failure: Option<String>,
    invocations: Mutex<Vec<(Vec<String>, String)>>,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that exits unsuccessfully with `stderr`.
    pub fn failing(stderr: &str) -> Self {
        Self {
            failure: Some(stderr.to_string()),
            ..Default::default()
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resolved arguments and database URL of each invocation.
    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.invocations.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CodeGenerator for RecordingGenerator {
    fn generate<'a>(
        &'a self,
        generator: &'a GeneratorConfig,
        database: &'a DatabaseConfig,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.invocations
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((generator.resolved_args(), database.url.clone()));

            match &self.failure {
                Some(stderr) => Err(ModelatorError::Generation(format!(
                    "'{}' exited with exit status: 1: {}",
                    generator.program, stderr
                ))),
                None => Ok(()),
            }
        })
    }
}
