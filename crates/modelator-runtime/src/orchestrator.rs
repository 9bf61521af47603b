//! One provisioning run, from image to generated code.
//!
//! States run strictly in order. Once a container exists, its removal is
//! the last thing the run does no matter how the stages after it ended.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use modelator_core::config::MigrationConfig;
use modelator_core::{ModelatorConfig, ModelatorError, Result};

use crate::container::{ContainerManager, ContainerRuntime};
use crate::db::{DatabaseDriver, SqlxDriver};
use crate::generator::{CodeGenerator, ProcessGenerator};
use crate::health::{HealthChecker, Readiness};
use crate::migrations::{AppliedMigration, EngineFactory, NativeEngines, SchemaMigrator};

/// Run states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    ImageReady,
    SlotClear,
    ContainerUp,
    DatabaseReachable,
    SchemaMigrated,
    Generated,
    TornDown,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageReady => "image_ready",
            Self::SlotClear => "slot_clear",
            Self::ContainerUp => "container_up",
            Self::DatabaseReachable => "database_reachable",
            Self::SchemaMigrated => "schema_migrated",
            Self::Generated => "generated",
            Self::TornDown => "torn_down",
        }
    }

    /// What the run is doing while working towards this stage.
    pub fn activity(&self) -> &'static str {
        match self {
            Self::ImageReady => "pulling image",
            Self::SlotClear => "removing stale containers",
            Self::ContainerUp => "starting container",
            Self::DatabaseReachable => "waiting for database",
            Self::SchemaMigrated => "migrating schema",
            Self::Generated => "generating code",
            Self::TornDown => "removing container",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Stages reached, in order; ends with `TornDown`.
    pub stages: Vec<RunStage>,
    pub container_id: String,
    /// Containers from earlier runs removed before starting.
    pub stale_removed: usize,
    pub readiness: Readiness,
    /// Migrations applied by this run.
    pub migrations_applied: usize,
    /// The engine's history after migrating.
    pub ledger: Vec<AppliedMigration>,
    pub elapsed: Duration,
}

/// What states 4 to 6 produced.
struct Provisioned {
    readiness: Readiness,
    migrations_applied: usize,
    ledger: Vec<AppliedMigration>,
}

/// Sequences a run over the container, database, migration and generator seams.
pub struct Orchestrator {
    containers: ContainerManager,
    health: HealthChecker,
    engines: Arc<dyn EngineFactory>,
    generator: Arc<dyn CodeGenerator>,
    config: ModelatorConfig,
}

impl Orchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        driver: Arc<dyn DatabaseDriver>,
        engines: Arc<dyn EngineFactory>,
        generator: Arc<dyn CodeGenerator>,
        config: ModelatorConfig,
    ) -> Self {
        Self {
            containers: ContainerManager::new(runtime),
            health: HealthChecker::new(driver),
            engines,
            generator,
            config,
        }
    }

    /// sqlx driver, the built-in engines and a generator child process.
    pub fn native(runtime: Arc<dyn ContainerRuntime>, config: ModelatorConfig) -> Self {
        Self::new(
            runtime,
            Arc::new(SqlxDriver),
            Arc::new(NativeEngines),
            Arc::new(ProcessGenerator),
            config,
        )
    }

    /// Execute a full run.
    ///
    /// Cancelling `cancel` aborts whichever of states 1, 2, 4, 5 or 6 is in
    /// progress; the container, if one was started, is still removed.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(run_id, cancel).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, cancel: CancellationToken) -> Result<RunReport> {
        let started = Instant::now();
        let spec = &self.config.container;
        let (label_key, label_value) = spec.label();
        let mut stages = Vec::with_capacity(7);

        info!(image = %spec.image, host_port = spec.host_port, "Starting run");

        until_cancelled(&cancel, RunStage::ImageReady, self.containers.ensure_image(&spec.image))
            .await?;
        reached(&mut stages, RunStage::ImageReady);

        let stale_removed = until_cancelled(
            &cancel,
            RunStage::SlotClear,
            self.containers.remove_stale(label_key, label_value),
        )
        .await?;
        reached(&mut stages, RunStage::SlotClear);

        // Creation is not raced: dropping it midway could orphan the container.
        if cancel.is_cancelled() {
            return Err(ModelatorError::Cancelled(RunStage::ContainerUp.activity().into()));
        }
        let guard = self.containers.acquire(spec).await?;
        let container_id = guard.handle().id.clone();
        reached(&mut stages, RunStage::ContainerUp);

        let body = self.provision(&cancel, &mut stages).await;
        let teardown = guard.release().await;

        match (body, teardown) {
            (Ok(provisioned), Ok(())) => {
                reached(&mut stages, RunStage::TornDown);
                let elapsed = started.elapsed();
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    applied = provisioned.migrations_applied,
                    "Run complete"
                );
                Ok(RunReport {
                    run_id,
                    stages,
                    container_id,
                    stale_removed,
                    readiness: provisioned.readiness,
                    migrations_applied: provisioned.migrations_applied,
                    ledger: provisioned.ledger,
                    elapsed,
                })
            }
            (Ok(_), Err(teardown)) => Err(teardown),
            (Err(e), Ok(())) => {
                error!(container_id = %container_id, error = %e, "Run failed; container removed");
                Err(e)
            }
            (Err(e), Err(teardown)) => {
                error!(
                    container_id = %container_id,
                    error = %teardown,
                    "Failed to remove container after run failure"
                );
                Err(e)
            }
        }
    }

    /// States 4 to 6.
    async fn provision(
        &self,
        cancel: &CancellationToken,
        stages: &mut Vec<RunStage>,
    ) -> Result<Provisioned> {
        let readiness = self
            .health
            .wait_for_database(&self.config.database, &self.config.health_check, cancel)
            .await?;
        reached(stages, RunStage::DatabaseReachable);

        let (migrations_applied, ledger) =
            until_cancelled(cancel, RunStage::SchemaMigrated, self.migrate()).await?;
        reached(stages, RunStage::SchemaMigrated);

        until_cancelled(
            cancel,
            RunStage::Generated,
            self.generator
                .generate(&self.config.generator, &self.config.database),
        )
        .await?;
        reached(stages, RunStage::Generated);

        Ok(Provisioned {
            readiness,
            migrations_applied,
            ledger,
        })
    }

    async fn migrate(&self) -> Result<(usize, Vec<AppliedMigration>)> {
        let mut engine = self
            .engines
            .open(&self.config.migration, &self.config.database)
            .await?;

        let result = apply(engine.as_mut(), &self.config.migration).await;
        engine.close().await;
        result
    }

    /// Remove every container carrying this project's label.
    pub async fn prune(&self) -> Result<usize> {
        let (label_key, label_value) = self.config.container.label();
        let removed = self.containers.remove_stale(label_key, label_value).await?;
        info!(removed, "Pruned containers");
        Ok(removed)
    }
}

async fn apply(
    engine: &mut dyn SchemaMigrator,
    migration: &MigrationConfig,
) -> Result<(usize, Vec<AppliedMigration>)> {
    if migration.clean {
        engine.clean().await?;
    } else {
        warn!("migration.clean is disabled; migrating on top of existing objects");
    }

    let applied = engine.migrate().await?;
    let ledger = engine.applied().await?;
    Ok((applied, ledger))
}

fn reached(stages: &mut Vec<RunStage>, stage: RunStage) {
    info!(stage = %stage, "Stage reached");
    stages.push(stage);
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    stage: RunStage,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ModelatorError::Cancelled(stage.activity().into())),
        result = work => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        sample_config, EngineFault, FakeContainerRuntime, FakeDatabaseDriver, FakeEngineFactory,
        RecordingGenerator,
    };
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        runtime: Arc<FakeContainerRuntime>,
        engines: Arc<FakeEngineFactory>,
        generator: Arc<RecordingGenerator>,
        orchestrator: Orchestrator,
    }

    fn harness(
        driver: FakeDatabaseDriver,
        engines: FakeEngineFactory,
        generator: RecordingGenerator,
    ) -> Harness {
        let dir = TempDir::new().unwrap();
        let config = sample_config(dir.path());
        harness_with(dir, config, driver, engines, generator)
    }

    fn harness_with(
        dir: TempDir,
        config: ModelatorConfig,
        driver: FakeDatabaseDriver,
        engines: FakeEngineFactory,
        generator: RecordingGenerator,
    ) -> Harness {
        let runtime = Arc::new(FakeContainerRuntime::new());
        let engines = Arc::new(engines);
        let generator = Arc::new(generator);
        let orchestrator = Orchestrator::new(
            runtime.clone(),
            Arc::new(driver),
            engines.clone(),
            generator.clone(),
            config,
        );
        Harness {
            _dir: dir,
            runtime,
            engines,
            generator,
            orchestrator,
        }
    }

    /// Exactly one container was created and it was removed exactly once.
    fn assert_torn_down_once(h: &Harness) {
        let created = h.runtime.created();
        assert_eq!(created.len(), 1);
        assert_eq!(h.runtime.removals().len(), 1);
        assert_eq!(h.runtime.container_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_reaches_every_stage() {
        let h = harness(
            FakeDatabaseDriver::ready_after(3),
            FakeEngineFactory::applying(&["1", "2"]),
            RecordingGenerator::new(),
        );

        let report = h.orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(
            report.stages,
            vec![
                RunStage::ImageReady,
                RunStage::SlotClear,
                RunStage::ContainerUp,
                RunStage::DatabaseReachable,
                RunStage::SchemaMigrated,
                RunStage::Generated,
                RunStage::TornDown,
            ]
        );
        assert_eq!(report.readiness.attempts, 3);
        assert_eq!(report.migrations_applied, 2);
        assert_eq!(report.ledger.len(), 2);
        assert_eq!(report.stale_removed, 0);
        assert_eq!(
            h.engines.calls(),
            vec!["open", "clean", "migrate", "applied", "close"]
        );
        assert_eq!(h.generator.invocations(), 1);
        let calls = h.generator.calls();
        let (args, url) = &calls[0];
        assert_eq!(args[0], "--config");
        assert!(args[1].ends_with("codegen.xml"));
        assert_eq!(url, "postgres://localhost:5433/postgres");
        assert_eq!(h.runtime.removals(), vec![report.container_id.clone()]);
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_containers_are_removed_first() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );
        let stale = [
            h.runtime.seed_container("dev.modelator.instance", "test-project"),
            h.runtime.seed_container("dev.modelator.instance", "test-project"),
        ];
        h.runtime.seed_container("dev.modelator.instance", "another-project");

        let report = h.orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(report.stale_removed, 2);
        let removals = h.runtime.removals();
        assert_eq!(&removals[..2], &stale[..]);
        assert_eq!(removals[2], report.container_id);
        assert_eq!(h.runtime.container_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_failure_creates_nothing() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );
        h.runtime.fail_pull();

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ModelatorError::ImagePull { .. }));
        assert!(h.runtime.created().is_empty());
        assert!(h.runtime.removals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_leaves_nothing_and_skips_later_states() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );
        h.runtime.fail_start("port is already allocated");

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ModelatorError::ContainerCreate { .. }));
        assert_eq!(h.runtime.container_count(), 0);
        assert!(h.engines.calls().is_empty());
        assert_eq!(h.generator.invocations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_database_still_tears_down() {
        let h = harness(
            FakeDatabaseDriver::never_ready(),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        match err {
            ModelatorError::DatabaseUnavailable { attempts, .. } => assert_eq!(attempts, 11),
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.engines.calls().is_empty());
        assert_eq!(h.generator.invocations(), 0);
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_open_failure_still_tears_down() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::failing(EngineFault::Open),
            RecordingGenerator::new(),
        );

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ModelatorError::Migration { .. }));
        assert_eq!(h.generator.invocations(), 0);
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_changelog_still_tears_down() {
        let dir = TempDir::new().unwrap();
        let mut config = sample_config(dir.path());
        config.migration.engine = modelator_core::config::MigrationEngineKind::Changelog;

        let runtime = Arc::new(FakeContainerRuntime::new());
        let generator = Arc::new(RecordingGenerator::new());
        let orchestrator = Orchestrator::new(
            runtime.clone(),
            Arc::new(FakeDatabaseDriver::ready_after(1)),
            Arc::new(NativeEngines),
            generator.clone(),
            config,
        );

        let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ModelatorError::ChangelogNotFound { .. }));
        assert_eq!(generator.invocations(), 0);
        assert_eq!(runtime.removals().len(), 1);
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_migration_failure_still_tears_down() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::failing(EngineFault::Migrate),
            RecordingGenerator::new(),
        );

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(err.to_string().contains("V2__broken.sql"));
        assert_eq!(h.engines.calls(), vec!["open", "clean", "migrate", "close"]);
        assert_eq!(h.generator.invocations(), 0);
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_still_tears_down() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::applying(&["1"]),
            RecordingGenerator::failing("relation \"tab\" does not exist"),
        );

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ModelatorError::Generation(_)));
        assert!(err.to_string().contains("relation \"tab\" does not exist"));
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let mut config = sample_config(dir.path());
        config.migration.clean = false;
        let h = harness_with(
            dir,
            config,
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::applying(&["1"]),
            RecordingGenerator::new(),
        );

        h.orchestrator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(h.engines.calls(), vec!["open", "migrate", "applied", "close"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_database() {
        let h = harness(
            FakeDatabaseDriver::never_ready(),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_200)).await;
            trigger.cancel();
        });

        let err = h.orchestrator.run(cancel).await.unwrap_err();

        assert!(matches!(err, ModelatorError::Cancelled(_)));
        assert!(err.to_string().contains("waiting for database"));
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_migrating() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::failing(EngineFault::HangOnMigrate),
            RecordingGenerator::new(),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let err = h.orchestrator.run(cancel).await.unwrap_err();

        assert!(err.to_string().contains("migrating schema"));
        assert_eq!(h.generator.invocations(), 0);
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_creates_nothing() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h.orchestrator.run(cancel).await.unwrap_err();

        assert!(matches!(err, ModelatorError::Cancelled(_)));
        assert!(h.runtime.created().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_still_removes_container() {
        let h = harness(
            FakeDatabaseDriver::never_ready(),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            h.orchestrator.run(CancellationToken::new()),
        )
        .await;
        assert!(outcome.is_err());

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_torn_down_once(&h);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_failure_after_success_is_reported() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );
        h.runtime.fail_remove("device or resource busy");

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ModelatorError::ContainerRemove { .. }));
        assert_eq!(h.runtime.removals().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_failure_keeps_original_error() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::default(),
            RecordingGenerator::failing("boom"),
        );
        h.runtime.fail_remove("device or resource busy");

        let err = h.orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ModelatorError::Generation(_)));
        assert_eq!(h.runtime.removals().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_port_change_moves_the_container() {
        let dir = TempDir::new().unwrap();
        let first = sample_config(dir.path());
        let mut second = first.clone();
        second.container.host_port = 6543;

        let runtime = Arc::new(FakeContainerRuntime::new());
        for config in [first, second] {
            let orchestrator = Orchestrator::new(
                runtime.clone(),
                Arc::new(FakeDatabaseDriver::ready_after(1)),
                Arc::new(FakeEngineFactory::default()),
                Arc::new(RecordingGenerator::new()),
                config,
            );
            orchestrator.run(CancellationToken::new()).await.unwrap();
            assert_eq!(runtime.container_count(), 0);
        }

        let ports: Vec<u16> = runtime.created().iter().map(|c| c.host_port).collect();
        assert_eq!(ports, vec![5433, 6543]);
        // The image is pulled once and reused.
        assert_eq!(runtime.pulls().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_only_touches_own_label() {
        let h = harness(
            FakeDatabaseDriver::ready_after(1),
            FakeEngineFactory::default(),
            RecordingGenerator::new(),
        );
        h.runtime.seed_container("dev.modelator.instance", "test-project");
        h.runtime.seed_container("dev.modelator.instance", "another-project");

        assert_eq!(h.orchestrator.prune().await.unwrap(), 1);
        assert_eq!(h.runtime.container_count(), 1);
    }

    /// Checks that both migrations' tables exist while the container is up.
    struct TableCheckingGenerator {
        checked: std::sync::atomic::AtomicBool,
    }

    impl CodeGenerator for TableCheckingGenerator {
        fn generate<'a>(
            &'a self,
            _generator: &'a modelator_core::config::GeneratorConfig,
            database: &'a modelator_core::config::DatabaseConfig,
        ) -> std::pin::Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async move {
                let mut conn = SqlxDriver.open(database).await?;
                let result = async {
                    conn.execute("SELECT 1 FROM tab").await?;
                    conn.execute("SELECT 1 FROM tab_two").await
                }
                .await;
                conn.close().await;
                result?;
                self.checked.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon"]
    async fn test_end_to_end_with_docker() {
        use crate::container::DockerRuntime;

        let dir = TempDir::new().unwrap();
        let mut config = sample_config(dir.path());
        let second = dir.path().join("migrationsB");
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(
            dir.path().join("migrations/V1__tab.sql"),
            "CREATE TABLE tab (id INT PRIMARY KEY);",
        )
        .unwrap();
        std::fs::write(
            second.join("V2__tab_two.sql"),
            "CREATE TABLE tab_two (id INT PRIMARY KEY);",
        )
        .unwrap();
        config.migration.directories.push(second);
        config.container.host_port = 55432;
        config.container.label_value = Some(format!("e2e-{}", Uuid::new_v4()));
        config.database.url = "postgres://localhost:55432/postgres".into();
        config.health_check.max_duration_ms = 60_000;

        let runtime = Arc::new(DockerRuntime::connect().await.unwrap());
        let generator = Arc::new(TableCheckingGenerator {
            checked: std::sync::atomic::AtomicBool::new(false),
        });
        let orchestrator = Orchestrator::new(
            runtime.clone(),
            Arc::new(SqlxDriver),
            Arc::new(NativeEngines),
            generator.clone(),
            config.clone(),
        );

        let report = orchestrator.run(CancellationToken::new()).await.unwrap();
        assert_eq!(report.migrations_applied, 2);
        let names: Vec<&str> = report.ledger.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2"]);
        assert!(generator.checked.load(std::sync::atomic::Ordering::SeqCst));

        let (key, value) = config.container.label();
        assert!(runtime.list_containers(key, value).await.unwrap().is_empty());
    }
}
