use std::path::Path;

use anyhow::Result;
use clap::Parser;
use console::style;

use modelator_core::config::MigrationEngineKind;
use modelator_core::ModelatorConfig;
use modelator_runtime::migrations::{load_scripts, locate_changelog, parse_changelog};

/// Check configuration and migration sources.
#[derive(Parser)]
pub struct ValidateCommand {}

impl ValidateCommand {
    pub async fn execute(self, config_path: &Path) -> Result<()> {
        let config = super::load_config(config_path)?;
        let sources = check_sources(&config)?;

        let (key, value) = config.container.label();
        println!("  {} Configuration is valid", style("✓").green());
        println!("    image      {}", config.container.image);
        println!(
            "    ports      {} -> {}",
            config.container.host_port, config.container.container_port
        );
        println!("    label      {}={}", key, value);
        println!("    engine     {}", config.migration.engine.as_str());
        println!("    migrations {}", sources);
        Ok(())
    }
}

/// Load migration sources the way the configured engine would.
fn check_sources(config: &ModelatorConfig) -> Result<String> {
    match config.migration.engine {
        MigrationEngineKind::Versioned => {
            let scripts = load_scripts(&config.migration.directories)?;
            Ok(format!("{} versioned script(s)", scripts.len()))
        }
        MigrationEngineKind::Changelog => {
            let changelog = locate_changelog(&config.migration.directories)?;
            let change_sets = parse_changelog(&changelog)?;
            Ok(format!(
                "{} change-set(s) in {}",
                change_sets.len(),
                changelog.display()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::project;
    use std::fs;

    #[test]
    fn test_versioned_sources() {
        let dir = project("versioned");
        fs::write(dir.path().join("migrations/V1__tab.sql"), "CREATE TABLE tab (id INT);").unwrap();
        let config = ModelatorConfig::from_file(dir.path().join("modelator.toml")).unwrap();

        assert_eq!(check_sources(&config).unwrap(), "1 versioned script(s)");
    }

    #[test]
    fn test_changelog_must_exist() {
        let dir = project("changelog");
        let config = ModelatorConfig::from_file(dir.path().join("modelator.toml")).unwrap();

        let err = check_sources(&config).unwrap_err();
        assert!(err.to_string().contains("databaseChangeLog"));
    }

    #[test]
    fn test_xml_changelog_is_reported_as_unsupported() {
        let dir = project("changelog");
        fs::write(
            dir.path().join("migrations/databaseChangeLog.xml"),
            "<databaseChangeLog/>",
        )
        .unwrap();
        let config = ModelatorConfig::from_file(dir.path().join("modelator.toml")).unwrap();

        let err = check_sources(&config).unwrap_err();
        assert!(err.to_string().contains("XML changelogs are not supported"));
    }

    #[tokio::test]
    async fn test_validate_command_accepts_changelog_project() {
        let dir = project("changelog");
        fs::write(
            dir.path().join("migrations/databaseChangeLog.sql"),
            "--changeset alice:1\nCREATE TABLE tab (id INT);\n",
        )
        .unwrap();

        ValidateCommand {}
            .execute(&dir.path().join("modelator.toml"))
            .await
            .unwrap();
    }
}
