use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use modelator_core::config::{DatabaseConfig, MigrationConfig};
use modelator_core::{ModelatorError, Result};

use crate::migrations::{AppliedMigration, EngineFactory, SchemaMigrator};

/// Where a fake engine fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFault {
    Open,
    Clean,
    Migrate,
    /// `migrate` never completes.
    HangOnMigrate,
}

/// Engine factory recording every call its engines receive.
///
/// Calls are recorded as `open`, `clean`, `migrate`, `applied` and `close`.
#[derive(Debug, Default)]
pub struct FakeEngineFactory {
    fault: Option<EngineFault>,
    migrations: Vec<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeEngineFactory {
    /// Engines that apply the named migrations.
    pub fn applying(migrations: &[&str]) -> Self {
        Self {
            migrations: migrations.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing(fault: EngineFault) -> Self {
        Self {
            fault: Some(fault),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn record(calls: &Mutex<Vec<String>>, call: &str) {
    calls
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(call.to_string());
}

impl EngineFactory for FakeEngineFactory {
    fn open<'a>(
        &'a self,
        _migration: &'a MigrationConfig,
        _database: &'a DatabaseConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SchemaMigrator>>> + Send + 'a>> {
        Box::pin(async move {
            record(&self.calls, "open");
            if self.fault == Some(EngineFault::Open) {
                return Err(ModelatorError::migration("session", "connection reset by peer"));
            }
            Ok(Box::new(FakeMigrator {
                fault: self.fault,
                pending: self.migrations.clone(),
                applied: Vec::new(),
                calls: self.calls.clone(),
            }) as Box<dyn SchemaMigrator>)
        })
    }
}

struct FakeMigrator {
    fault: Option<EngineFault>,
    pending: Vec<String>,
    applied: Vec<AppliedMigration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl SchemaMigrator for FakeMigrator {
    fn clean(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            record(&self.calls, "clean");
            if self.fault == Some(EngineFault::Clean) {
                return Err(ModelatorError::migration("clean", "permission denied for schema public"));
            }
            self.applied.clear();
            Ok(())
        })
    }

    fn migrate(&mut self) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + '_>> {
        Box::pin(async move {
            record(&self.calls, "migrate");
            match self.fault {
                Some(EngineFault::Migrate) => {
                    return Err(ModelatorError::migration(
                        "V2__broken.sql",
                        "syntax error at or near \"TABLEE\"",
                    ))
                }
                Some(EngineFault::HangOnMigrate) => std::future::pending::<()>().await,
                _ => {}
            }

            let count = self.pending.len();
            let now = Utc::now();
            self.applied.extend(self.pending.drain(..).map(|name| AppliedMigration {
                description: name.clone(),
                name,
                installed_on: now,
            }));
            Ok(count)
        })
    }

    fn applied(&mut self) -> Pin<Box<dyn Future<Output = Result<Vec<AppliedMigration>>> + Send + '_>> {
        Box::pin(async move {
            record(&self.calls, "applied");
            Ok(self.applied.clone())
        })
    }

    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            record(&self.calls, "close");
        })
    }
}
