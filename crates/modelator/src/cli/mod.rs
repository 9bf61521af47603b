mod prune;
mod run;
mod validate;

pub use prune::PruneCommand;
pub use run::RunCommand;
pub use validate::ValidateCommand;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modelator_core::ModelatorConfig;

/// Provision a throwaway database, migrate it, and generate code from it.
#[derive(Parser)]
#[command(name = "modelator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "modelator.toml", global = true)]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the database, migrate it, run the generator, remove the database.
    Run(RunCommand),

    /// Remove containers left behind by earlier runs.
    Prune(PruneCommand),

    /// Check the configuration and migration sources without starting anything.
    Validate(ValidateCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();
        init_tracing(self.verbose);

        match self.command {
            Commands::Run(cmd) => cmd.execute(&self.config).await,
            Commands::Prune(cmd) => cmd.execute(&self.config).await,
            Commands::Validate(cmd) => cmd.execute(&self.config).await,
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Load and validate the configuration file.
pub(crate) fn load_config(path: &Path) -> Result<ModelatorConfig> {
    if !path.exists() {
        anyhow::bail!(
            "Configuration file not found: {}\nPass --config to point at your modelator.toml.",
            path.display()
        );
    }

    tracing::info!("Loading configuration from {}", path.display());
    Ok(ModelatorConfig::from_file(path)?)
}
