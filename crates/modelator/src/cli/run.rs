use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use modelator_runtime::{DockerRuntime, Orchestrator, RunReport};

/// Run the full provisioning cycle.
#[derive(Parser)]
pub struct RunCommand {
    /// Abort the run after this many seconds (overrides run.timeout_secs).
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl RunCommand {
    pub async fn execute(self, config_path: &Path) -> Result<()> {
        let mut config = super::load_config(config_path)?;
        if self.timeout_secs.is_some() {
            config.run.timeout_secs = self.timeout_secs;
        }
        let timeout = config.run.timeout();

        println!();
        println!(
            "  {}  {} v{}",
            style("◆").bold(),
            style("modelator").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  {} {} ({} engine)",
            style("→").dim(),
            config.container.image,
            config.migration.engine.as_str()
        );
        println!();

        let runtime = Arc::new(DockerRuntime::connect().await?);
        let orchestrator = Orchestrator::native(runtime, config);

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_signal(cancel.clone(), timeout));

        let outcome = orchestrator.run(cancel).await;
        watcher.abort();

        let report = outcome?;
        print_report(&report);
        Ok(())
    }
}

/// Cancel the run on Ctrl-C or once `timeout` has passed.
async fn cancel_on_signal(cancel: CancellationToken, timeout: Option<Duration>) {
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; tearing down");
        }
        _ = deadline => {
            warn!(timeout_secs = timeout.map(|t| t.as_secs()), "Run timed out; tearing down");
        }
    }
    cancel.cancel();
}

fn print_report(report: &RunReport) {
    for stage in &report.stages {
        println!("  {} {}", style("✓").green(), stage);
    }
    println!();

    if report.stale_removed > 0 {
        println!(
            "  {} Removed {} stale container(s)",
            style("ℹ").blue(),
            report.stale_removed
        );
    }
    println!(
        "  {} Database ready after {} attempt(s) in {:.1}s",
        style("ℹ").blue(),
        report.readiness.attempts,
        report.readiness.elapsed.as_secs_f64()
    );

    if report.ledger.is_empty() {
        println!("  {} No migrations applied", style("ℹ").blue());
    } else {
        println!(
            "  {} {} migration(s) applied:",
            style("ℹ").blue(),
            report.migrations_applied
        );
        for migration in &report.ledger {
            println!(
                "    {} {} {}",
                style(&migration.name).cyan(),
                migration.description,
                style(migration.installed_on.format("%H:%M:%S")).dim()
            );
        }
    }

    println!();
    println!(
        "  {} Done in {:.1}s (run {})",
        style("✓").green().bold(),
        report.elapsed.as_secs_f64(),
        style(report.run_id).dim()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_token() {
        let cancel = CancellationToken::new();
        cancel_on_signal(cancel.clone(), Some(Duration::from_secs(30))).await;
        assert!(cancel.is_cancelled());
    }
}
