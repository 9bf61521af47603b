pub mod container;
pub mod db;
pub mod generator;
pub mod health;
pub mod migrations;
pub mod orchestrator;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use container::{ContainerGuard, ContainerHandle, ContainerManager, ContainerRuntime, DockerRuntime};
pub use db::{DatabaseConnection, DatabaseDriver, SqlxDriver};
pub use generator::{CodeGenerator, ProcessGenerator};
pub use health::HealthChecker;
pub use migrations::{
    AppliedMigration, EngineFactory, MigrationEngineAdapter, NativeEngines, SchemaMigrator,
};
pub use orchestrator::{Orchestrator, RunReport, RunStage};
