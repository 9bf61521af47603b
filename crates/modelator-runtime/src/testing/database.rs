use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modelator_core::config::DatabaseConfig;
use modelator_core::{ModelatorError, Result};

use crate::db::{DatabaseConnection, DatabaseDriver};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    ReadyAfter(u32),
    NeverReady,
    SlowRefusal(Duration),
    Hanging,
}

/// Driver whose database becomes reachable on a chosen attempt.
#[derive(Debug)]
pub struct FakeDatabaseDriver {
    behavior: Behavior,
    attempts: AtomicU32,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeDatabaseDriver {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            attempts: AtomicU32::new(0),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connections are refused until attempt `k`, which succeeds.
    pub fn ready_after(k: u32) -> Self {
        Self::with(Behavior::ReadyAfter(k))
    }

    /// Every connection is refused.
    pub fn never_ready() -> Self {
        Self::with(Behavior::NeverReady)
    }

    /// Every connection is refused after `delay`.
    pub fn refusing_after(delay: Duration) -> Self {
        Self::with(Behavior::SlowRefusal(delay))
    }

    /// Every connection attempt hangs.
    pub fn hanging() -> Self {
        Self::with(Behavior::Hanging)
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Statements executed on successful connections.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl DatabaseDriver for FakeDatabaseDriver {
    fn open<'a>(
        &'a self,
        _config: &'a DatabaseConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn DatabaseConnection>>> + Send + 'a>> {
        Box::pin(async move {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

            let ready = match self.behavior {
                Behavior::ReadyAfter(k) => attempt >= k,
                Behavior::NeverReady => false,
                Behavior::SlowRefusal(delay) => {
                    tokio::time::sleep(delay).await;
                    false
                }
                Behavior::Hanging => {
                    std::future::pending::<()>().await;
                    false
                }
            };

            if !ready {
                return Err(ModelatorError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }

            Ok(Box::new(FakeConnection {
                executed: self.executed.clone(),
            }) as Box<dyn DatabaseConnection>)
        })
    }
}

struct FakeConnection {
    executed: Arc<Mutex<Vec<String>>>,
}

impl DatabaseConnection for FakeConnection {
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.executed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(sql.to_string());
            Ok(())
        })
    }

    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async {})
    }
}
