//! Code generator invocation.
//!
//! The generator is an external program pointed at its own configuration
//! document. It reads the migrated schema through the same connection
//! settings the run used, which are handed over as environment variables.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

use modelator_core::config::{DatabaseConfig, GeneratorConfig};
use modelator_core::{ModelatorError, Result};

/// Environment variable carrying the database URL.
pub const ENV_DATABASE_URL: &str = "MODELATOR_DATABASE_URL";
pub const ENV_DATABASE_USER: &str = "MODELATOR_DATABASE_USER";
pub const ENV_DATABASE_PASSWORD: &str = "MODELATOR_DATABASE_PASSWORD";

/// Stderr lines kept in a `Generation` error.
const STDERR_TAIL_LINES: usize = 20;

/// Produces source code from a migrated database.
pub trait CodeGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        generator: &'a GeneratorConfig,
        database: &'a DatabaseConfig,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Runs the configured program as a child process.
///
/// The child is killed if the returned future is dropped, so a cancelled
/// run does not leave a generator behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGenerator;

impl ProcessGenerator {
    fn build_command(generator: &GeneratorConfig, database: &DatabaseConfig) -> Command {
        let mut cmd = Command::new(&generator.program);
        cmd.args(generator.resolved_args())
            .env(ENV_DATABASE_URL, &database.url)
            .env(ENV_DATABASE_USER, &database.user)
            .env(ENV_DATABASE_PASSWORD, &database.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &generator.working_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

impl CodeGenerator for ProcessGenerator {
    fn generate<'a>(
        &'a self,
        generator: &'a GeneratorConfig,
        database: &'a DatabaseConfig,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                program = %generator.program,
                config = %generator.config.display(),
                "Running code generator"
            );
            let started = Instant::now();

            let output = Self::build_command(generator, database)
                .output()
                .await
                .map_err(|e| {
                    ModelatorError::Generation(format!(
                        "failed to launch '{}': {}",
                        generator.program, e
                    ))
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            for line in stdout.lines() {
                debug!(target: "modelator::generator", "{}", line);
            }

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ModelatorError::Generation(format!(
                    "'{}' exited with {}: {}",
                    generator.program,
                    output.status,
                    stderr_tail(&stderr)
                )));
            }

            info!(
                duration_ms = started.elapsed().as_millis() as u64,
                "Code generation complete"
            );
            Ok(())
        })
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return "no output on stderr".to_string();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn shell(script: &str, config: PathBuf) -> GeneratorConfig {
        GeneratorConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into(), "generator".into(), "{config}".into()],
            config,
            working_dir: None,
        }
    }

    fn database() -> DatabaseConfig {
        DatabaseConfig {
            url: "postgres://localhost:5433/app".into(),
            user: "postgres".into(),
            password: "secret".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_passes_config_and_credentials() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("codegen.xml");
        fs::write(&config, "<configuration/>").unwrap();
        let out = dir.path().join("seen.txt");

        let script = format!(
            "printf '%s|%s|%s' \"$1\" \"$MODELATOR_DATABASE_URL\" \"$MODELATOR_DATABASE_PASSWORD\" > {}",
            out.display()
        );
        ProcessGenerator
            .generate(&shell(&script, config.clone()), &database())
            .await
            .unwrap();

        let seen = fs::read_to_string(&out).unwrap();
        assert_eq!(
            seen,
            format!("{}|postgres://localhost:5433/app|secret", config.display())
        );
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("codegen.xml");
        fs::write(&config, "").unwrap();

        let mut generator = shell("touch generated.rs", config);
        generator.working_dir = Some(dir.path().to_path_buf());
        ProcessGenerator.generate(&generator, &database()).await.unwrap();

        assert!(dir.path().join("generated.rs").exists());
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("codegen.xml");
        fs::write(&config, "").unwrap();

        let err = ProcessGenerator
            .generate(&shell("echo 'table tab not found' >&2; exit 3", config), &database())
            .await
            .unwrap_err();

        assert!(matches!(err, ModelatorError::Generation(_)));
        let message = err.to_string();
        assert!(message.contains("table tab not found"));
        assert!(message.contains('3'));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let generator = GeneratorConfig {
            program: "modelator-no-such-generator".into(),
            args: vec![],
            config: PathBuf::from("codegen.xml"),
            working_dir: None,
        };

        let err = ProcessGenerator.generate(&generator, &database()).await.unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 49"));
        assert_eq!(stderr_tail("  \n"), "no output on stderr");
    }
}
