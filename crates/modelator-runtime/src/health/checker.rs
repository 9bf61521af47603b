//! Readiness polling for a freshly started database.
//!
//! Connection failures while the database boots (refused, not yet accepting,
//! authentication not ready) are transient; only running out of time is fatal.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use modelator_core::config::{DatabaseConfig, HealthCheckConfig};
use modelator_core::{ModelatorError, Result};

use crate::db::DatabaseDriver;

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Probe attempts made, including the successful one.
    pub attempts: u32,
    /// Time from the first attempt to success.
    pub elapsed: Duration,
}

/// Polls a database with a probe statement until it answers or the deadline passes.
#[derive(Clone)]
pub struct HealthChecker {
    driver: Arc<dyn DatabaseDriver>,
}

impl HealthChecker {
    pub fn new(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self { driver }
    }

    /// Wait until `health.probe_sql` executes against `database`.
    ///
    /// Fails with `DatabaseUnavailable` once `health.max_duration()` has elapsed
    /// since the first attempt, and with `Cancelled` as soon as `cancel` fires.
    pub async fn wait_for_database(
        &self,
        database: &DatabaseConfig,
        health: &HealthCheckConfig,
        cancel: &CancellationToken,
    ) -> Result<Readiness> {
        let max_duration = health.max_duration();
        let poll_interval = health.poll_interval();
        let start = Instant::now();
        let deadline = start + max_duration;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            // No attempt may run past one interval beyond the deadline.
            let budget = (deadline + poll_interval).saturating_duration_since(Instant::now());

            let outcome = tokio::select! {
                result = tokio::time::timeout(budget, self.probe(database, &health.probe_sql)) => {
                    result.unwrap_or_else(|_| {
                        Err(ModelatorError::Timeout(format!("connection attempt exceeded {:?}", budget)))
                    })
                }
                _ = cancel.cancelled() => {
                    return Err(ModelatorError::Cancelled("waiting for database".into()));
                }
            };

            let last_error = match outcome {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    info!(attempts, elapsed_ms = elapsed.as_millis() as u64, "Database is reachable");
                    return Ok(Readiness { attempts, elapsed });
                }
                Err(e) => e.to_string(),
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(ModelatorError::DatabaseUnavailable {
                    attempts,
                    elapsed: now - start,
                    last_error,
                });
            }

            debug!(
                attempt = attempts,
                elapsed_ms = (now - start).as_millis() as u64,
                error = %last_error,
                "Database not ready yet"
            );

            let pause = poll_interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => {
                    return Err(ModelatorError::Cancelled("waiting for database".into()));
                }
            }
        }
    }

    async fn probe(&self, database: &DatabaseConfig, sql: &str) -> Result<()> {
        let mut conn = self.driver.open(database).await?;
        let result = conn.execute(sql).await;
        conn.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDatabaseDriver;

    fn health(poll_ms: u64, max_ms: u64) -> HealthCheckConfig {
        HealthCheckConfig {
            poll_interval_ms: poll_ms,
            max_duration_ms: max_ms,
            probe_sql: "SELECT 1".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let driver = Arc::new(FakeDatabaseDriver::ready_after(1));
        let checker = HealthChecker::new(driver.clone());

        let readiness = checker
            .wait_for_database(&DatabaseConfig::default(), &health(500, 20_000), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(readiness.attempts, 1);
        assert_eq!(readiness.elapsed, Duration::ZERO);
        assert_eq!(driver.executed(), vec!["SELECT 1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_kth_attempt() {
        for k in [2u32, 5, 17] {
            let driver = Arc::new(FakeDatabaseDriver::ready_after(k));
            let checker = HealthChecker::new(driver.clone());

            let readiness = checker
                .wait_for_database(&DatabaseConfig::default(), &health(500, 20_000), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(readiness.attempts, k);
            assert_eq!(driver.attempts(), k);
            assert_eq!(readiness.elapsed, Duration::from_millis(500) * (k - 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_bounded() {
        let driver = Arc::new(FakeDatabaseDriver::never_ready());
        let checker = HealthChecker::new(driver.clone());
        let started = Instant::now();

        let err = checker
            .wait_for_database(&DatabaseConfig::default(), &health(500, 20_000), &CancellationToken::new())
            .await
            .unwrap_err();

        let waited = started.elapsed();
        assert!(waited <= Duration::from_millis(20_000 + 500));

        match err {
            ModelatorError::DatabaseUnavailable {
                attempts, elapsed, last_error,
            } => {
                assert_eq!(attempts, driver.attempts());
                assert_eq!(attempts, 41);
                assert!(elapsed >= Duration::from_millis(20_000));
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_connection_is_cut_off() {
        let driver = Arc::new(FakeDatabaseDriver::hanging());
        let checker = HealthChecker::new(driver);
        let started = Instant::now();

        let err = checker
            .wait_for_database(&DatabaseConfig::default(), &health(500, 2_000), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ModelatorError::DatabaseUnavailable { .. }));
        assert!(started.elapsed() <= Duration::from_millis(2_000 + 500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_refusal_near_deadline_stays_bounded() {
        let driver = Arc::new(FakeDatabaseDriver::refusing_after(Duration::from_millis(1_999)));
        let checker = HealthChecker::new(driver.clone());
        let started = Instant::now();

        let err = checker
            .wait_for_database(&DatabaseConfig::default(), &health(500, 2_000), &CancellationToken::new())
            .await
            .unwrap_err();

        let waited = started.elapsed();
        assert!(waited <= Duration::from_millis(2_000 + 500), "waited {:?}", waited);
        match err {
            ModelatorError::DatabaseUnavailable { attempts, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(driver.attempts(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_polling() {
        let driver = Arc::new(FakeDatabaseDriver::never_ready());
        let checker = HealthChecker::new(driver);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = checker
            .wait_for_database(&DatabaseConfig::default(), &health(500, 60_000), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ModelatorError::Cancelled(_)));
        assert!(started.elapsed() < Duration::from_millis(1_500));
    }
}
