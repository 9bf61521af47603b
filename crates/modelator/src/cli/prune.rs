use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;

use modelator_runtime::{DockerRuntime, Orchestrator};

/// Remove containers carrying this project's label.
#[derive(Parser)]
pub struct PruneCommand {}

impl PruneCommand {
    pub async fn execute(self, config_path: &Path) -> Result<()> {
        let config = super::load_config(config_path)?;
        let (key, value) = config.container.label();
        let label = format!("{}={}", key, value);

        let runtime = Arc::new(DockerRuntime::connect().await?);
        let removed = Orchestrator::native(runtime, config).prune().await?;

        if removed == 0 {
            println!("  {} No containers labelled {}", style("ℹ").blue(), label);
        } else {
            println!(
                "  {} Removed {} container(s) labelled {}",
                style("✓").green(),
                removed,
                label
            );
        }
        Ok(())
    }
}
