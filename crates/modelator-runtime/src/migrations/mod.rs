//! Schema migration engines.
//!
//! Two engines are supported and selected by `migration.engine`:
//! a version-ordered script directory ([`VersionedMigrator`]) and a single
//! change-set changelog ([`ChangelogMigrator`]). Both open their own session
//! from the database config, can clean the managed schemas, and record what
//! they applied in a history table. Both run against PostgreSQL and
//! MariaDB/MySQL.

mod changelog;
mod session;
mod versioned;

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use modelator_core::config::{DatabaseConfig, MigrationConfig, MigrationEngineKind};
use modelator_core::Result;

pub use changelog::{
    locate_changelog, parse_changelog, parse_formatted_sql, ChangeSet, ChangelogMigrator,
    CHANGELOG_BASENAME, CHANGELOG_FORMATS,
};
pub use versioned::{
    load_scripts, parse_script_name, Version, VersionedMigrator, VersionedScript,
};

/// One row of an engine's history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Version for versioned scripts, `author:id` for change-sets.
    pub name: String,
    pub description: String,
    pub installed_on: DateTime<Utc>,
}

/// Operations the orchestrator needs from an engine.
pub trait SchemaMigrator: Send {
    /// Remove every object from the managed schemas.
    fn clean(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Apply pending migrations. Returns how many were applied.
    fn migrate(&mut self) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + '_>>;

    fn applied(&mut self) -> Pin<Box<dyn Future<Output = Result<Vec<AppliedMigration>>> + Send + '_>>;

    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// The engine chosen by configuration.
pub enum MigrationEngineAdapter {
    Versioned(VersionedMigrator),
    Changelog(ChangelogMigrator),
}

impl MigrationEngineAdapter {
    /// Build the configured engine and open its session.
    pub async fn from_config(migration: &MigrationConfig, database: &DatabaseConfig) -> Result<Self> {
        tracing::debug!(engine = migration.engine.as_str(), "Opening migration engine");

        match migration.engine {
            MigrationEngineKind::Versioned => Ok(Self::Versioned(
                VersionedMigrator::connect(migration, database).await?,
            )),
            MigrationEngineKind::Changelog => Ok(Self::Changelog(
                ChangelogMigrator::connect(migration, database).await?,
            )),
        }
    }

    pub fn kind(&self) -> MigrationEngineKind {
        match self {
            Self::Versioned(_) => MigrationEngineKind::Versioned,
            Self::Changelog(_) => MigrationEngineKind::Changelog,
        }
    }

    pub async fn clean(&mut self) -> Result<()> {
        match self {
            Self::Versioned(engine) => engine.clean().await,
            Self::Changelog(engine) => engine.clean().await,
        }
    }

    pub async fn migrate(&mut self) -> Result<usize> {
        match self {
            Self::Versioned(engine) => engine.migrate().await,
            Self::Changelog(engine) => engine.migrate().await,
        }
    }

    pub async fn applied(&mut self) -> Result<Vec<AppliedMigration>> {
        match self {
            Self::Versioned(engine) => engine.applied().await,
            Self::Changelog(engine) => engine.applied().await,
        }
    }

    pub async fn close(self) {
        match self {
            Self::Versioned(engine) => engine.close().await,
            Self::Changelog(engine) => engine.close().await,
        }
    }
}

impl SchemaMigrator for MigrationEngineAdapter {
    fn clean(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(MigrationEngineAdapter::clean(self))
    }

    fn migrate(&mut self) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + '_>> {
        Box::pin(MigrationEngineAdapter::migrate(self))
    }

    fn applied(&mut self) -> Pin<Box<dyn Future<Output = Result<Vec<AppliedMigration>>> + Send + '_>> {
        Box::pin(MigrationEngineAdapter::applied(self))
    }

    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(MigrationEngineAdapter::close(*self))
    }
}

/// Opens an engine for a run.
pub trait EngineFactory: Send + Sync {
    fn open<'a>(
        &'a self,
        migration: &'a MigrationConfig,
        database: &'a DatabaseConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SchemaMigrator>>> + Send + 'a>>;
}

/// Factory for the engines in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngines;

impl EngineFactory for NativeEngines {
    fn open<'a>(
        &'a self,
        migration: &'a MigrationConfig,
        database: &'a DatabaseConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SchemaMigrator>>> + Send + 'a>> {
        Box::pin(async move {
            let engine = MigrationEngineAdapter::from_config(migration, database).await?;
            Ok(Box::new(engine) as Box<dyn SchemaMigrator>)
        })
    }
}
