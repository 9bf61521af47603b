//! In-memory doubles for the runtime's seams.
//!
//! Available to this crate's tests and, behind the `testing` feature, to
//! downstream crates. Tests that need a real PostgreSQL read its URL from
//! `TEST_DATABASE_URL` (MariaDB: `TEST_MARIADB_URL`) and are `#[ignore]`d by
//! default.

mod container;
mod database;
mod engines;
mod generator;

pub use container::FakeContainerRuntime;
pub use database::FakeDatabaseDriver;
pub use engines::{EngineFault, FakeEngineFactory};
pub use generator::RecordingGenerator;

use std::path::Path;

use modelator_core::config::{
    ContainerConfig, DatabaseConfig, GeneratorConfig, HealthCheckConfig, MigrationConfig,
    MigrationEngineKind, RunConfig,
};
use modelator_core::ModelatorConfig;

/// Environment variable naming a PostgreSQL database tests may freely clean.
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// The database tests may use, if one is configured.
pub fn test_database_url() -> Option<String> {
    std::env::var(TEST_DATABASE_URL).ok()
}

/// Environment variable naming a MariaDB/MySQL database tests may freely clean.
pub const TEST_MARIADB_URL: &str = "TEST_MARIADB_URL";

pub fn test_mariadb_url() -> Option<String> {
    std::env::var(TEST_MARIADB_URL).ok()
}

/// A valid configuration rooted at `dir`.
///
/// Creates `dir/migrations` and an empty `dir/codegen.xml` so the config
/// passes validation.
pub fn sample_config(dir: &Path) -> ModelatorConfig {
    let migrations = dir.join("migrations");
    let generator_config = dir.join("codegen.xml");
    std::fs::create_dir_all(&migrations).expect("create migrations dir");
    std::fs::write(&generator_config, "<configuration/>").expect("write generator config");

    ModelatorConfig {
        database: DatabaseConfig {
            url: "postgres://localhost:5433/postgres".into(),
            user: "postgres".into(),
            password: "secret".into(),
            ..Default::default()
        },
        container: ContainerConfig {
            image: "postgres:9.5".into(),
            env: vec!["POSTGRES_PASSWORD=secret".into()],
            host_port: 5433,
            container_port: 5432,
            label_value: Some("test-project".into()),
            ..Default::default()
        },
        health_check: HealthCheckConfig {
            poll_interval_ms: 500,
            max_duration_ms: 5_000,
            probe_sql: "SELECT 1".into(),
        },
        migration: MigrationConfig::new(MigrationEngineKind::Versioned, vec![migrations]),
        generator: GeneratorConfig {
            program: "codegen".into(),
            args: vec!["--config".into(), "{config}".into()],
            config: generator_config,
            working_dir: None,
        },
        run: RunConfig::default(),
    }
}
