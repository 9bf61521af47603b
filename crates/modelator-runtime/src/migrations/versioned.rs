//! Version-ordered file migrations.
//!
//! Scripts are discovered anywhere under the configured directories and
//! ordered by the version encoded in their filename:
//! - `V1__create_users.sql`, `V1_2__add_email.sql`, `V2.1__index.sql`
//! - `0001_create_users.sql`
//!
//! Applied versions are recorded in the history table and skipped on later runs.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use modelator_core::config::{DatabaseConfig, MigrationConfig};
use modelator_core::{ModelatorError, Result};

use super::session::{checksum, Param, Session};
use super::AppliedMigration;

/// Numeric version components, compared component-wise.
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    fn parse(raw: &str) -> Option<Self> {
        let parts: Option<Vec<u64>> = raw
            .split(['.', '_'])
            .map(|p| p.parse::<u64>().ok())
            .collect();
        parts.filter(|p| !p.is_empty()).map(Self)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Missing trailing components count as zero: 1 == 1.0 < 1.1
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// A migration script found on disk.
#[derive(Debug, Clone)]
pub struct VersionedScript {
    pub version: Version,
    pub description: String,
    /// File name, recorded in the history table.
    pub script: String,
    pub path: PathBuf,
    pub sql: String,
    pub checksum: String,
}

/// Split a script file stem into its version and description.
pub fn parse_script_name(stem: &str) -> Option<(Version, String)> {
    if let Some(rest) = stem.strip_prefix(['V', 'v']) {
        let (raw_version, description) = rest.split_once("__")?;
        let version = Version::parse(raw_version)?;
        return Some((version, description.replace('_', " ")));
    }

    let digits = stem.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let version = Version::parse(&stem[..digits])?;
    let description = stem[digits..].trim_start_matches('_').replace('_', " ");
    Some((version, description))
}

/// Load scripts from every directory, ordered by version.
///
/// Missing directories contribute nothing. Two scripts with the same
/// version are an error, even across directories.
pub fn load_scripts(directories: &[PathBuf]) -> Result<Vec<VersionedScript>> {
    let mut scripts = Vec::new();

    for dir in directories {
        scripts.extend(load_scripts_from_dir(dir)?);
    }

    scripts.sort_by(|a, b| a.version.cmp(&b.version));

    if let Some(pair) = scripts.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(ModelatorError::migration(
            pair[1].script.clone(),
            format!(
                "version {} is declared by both {} and {}",
                pair[1].version,
                pair[0].path.display(),
                pair[1].path.display()
            ),
        ));
    }

    debug!("Loaded {} versioned migrations", scripts.len());
    Ok(scripts)
}

fn load_scripts_from_dir(dir: &Path) -> Result<Vec<VersionedScript>> {
    if !dir.exists() {
        warn!(directory = %dir.display(), "Migrations directory does not exist");
        return Ok(Vec::new());
    }

    let mut scripts = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ModelatorError::Io(e.into()))?;
        let path = entry.path();

        if !entry.file_type().is_file() || path.extension().map(|e| e != "sql").unwrap_or(true) {
            continue;
        }

        let (Some(stem), Some(file_name)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.file_name().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        let Some((version, description)) = parse_script_name(stem) else {
            warn!(file = %path.display(), "Skipping file without a version prefix");
            continue;
        };

        let sql = std::fs::read_to_string(path)?;
        scripts.push(VersionedScript {
            version,
            description,
            script: file_name.to_string(),
            checksum: checksum(&sql),
            path: path.to_path_buf(),
            sql,
        });
    }

    Ok(scripts)
}

/// Version-ordered engine.
pub struct VersionedMigrator {
    session: Session,
    config: MigrationConfig,
    scripts: Vec<VersionedScript>,
}

impl VersionedMigrator {
    /// Discover scripts, then open the engine's session.
    pub async fn connect(migration: &MigrationConfig, database: &DatabaseConfig) -> Result<Self> {
        let scripts = load_scripts(&migration.directories)?;
        let session = Session::open(database, migration).await?;

        Ok(Self {
            session,
            config: migration.clone(),
            scripts,
        })
    }

    /// Drop every object in the managed schemas, history table included.
    pub async fn clean(&mut self) -> Result<()> {
        let schemas = self.session.managed_schemas(&self.config).await?;
        self.session.clean_schemas(&schemas).await
    }

    /// Apply every pending script. Returns how many were applied.
    pub async fn migrate(&mut self) -> Result<usize> {
        self.session.acquire_lock().await?;

        let result = self.migrate_inner().await;

        // Always release lock, even on error
        if let Err(e) = self.session.release_lock().await {
            warn!("Failed to release migration lock: {}", e);
        }

        result
    }

    async fn migrate_inner(&mut self) -> Result<usize> {
        let dialect = self.session.dialect();
        let table = dialect.history_table(&self.config);
        self.ensure_history_table(&table).await?;

        let applied = self.applied_checksums(&table).await?;
        debug!("Already applied versions: {:?}", applied.keys());

        let record = dialect.insert(
            &table,
            &["version", "description", "script", "checksum", "execution_time_ms"],
        );

        let mut count = 0;
        for script in &self.scripts {
            let version = script.version.to_string();
            match applied.get(&version) {
                Some(recorded) if *recorded != script.checksum => {
                    return Err(ModelatorError::ChecksumMismatch {
                        name: script.script.clone(),
                        expected: recorded.clone(),
                        actual: script.checksum.clone(),
                    });
                }
                Some(_) => continue,
                None => {
                    apply_script(&mut self.session, &record, script).await?;
                    count += 1;
                }
            }
        }

        info!(applied = count, total = self.scripts.len(), "Versioned migrations complete");
        Ok(count)
    }

    async fn ensure_history_table(&mut self, table: &str) -> Result<()> {
        let timestamp = self.session.dialect().timestamp_type();
        self.session
            .execute(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    installed_rank SERIAL PRIMARY KEY,
                    version VARCHAR(50) UNIQUE NOT NULL,
                    description VARCHAR(200) NOT NULL,
                    script VARCHAR(1000) NOT NULL,
                    checksum CHAR(64) NOT NULL,
                    installed_on {timestamp} NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    execution_time_ms BIGINT NOT NULL
                )
                "#
            ))
            .await
            .map_err(|e| ModelatorError::migration("history table", e))
    }

    async fn applied_checksums(&mut self, table: &str) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = self
            .session
            .fetch_all(&format!("SELECT version, checksum FROM {table}"), &[])
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// The history table's entries in installation order.
    pub async fn applied(&mut self) -> Result<Vec<AppliedMigration>> {
        if !self.session.history_table_exists(&self.config).await? {
            return Ok(Vec::new());
        }

        let table = self.session.dialect().history_table(&self.config);
        let rows: Vec<(String, String, DateTime<Utc>)> = self
            .session
            .fetch_all(
                &format!(
                    "SELECT version, description, installed_on FROM {table} ORDER BY installed_rank"
                ),
                &[],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, description, installed_on)| AppliedMigration {
                name,
                description,
                installed_on,
            })
            .collect())
    }

    pub async fn close(self) {
        self.session.close().await;
    }
}

async fn apply_script(session: &mut Session, record: &str, script: &VersionedScript) -> Result<()> {
    info!(version = %script.version, script = %script.script, "Applying migration");
    let started = Instant::now();
    let version = script.version.to_string();

    session
        .apply(
            &script.script,
            &script.sql,
            record,
            &[
                Param::Text(&version),
                Param::Text(&script.description),
                Param::Text(&script.script),
                Param::Text(&script.checksum),
                Param::Int(started.elapsed().as_millis() as i64),
            ],
        )
        .await?;

    debug!(version = %script.version, "Migration applied");
    Ok(())
}
