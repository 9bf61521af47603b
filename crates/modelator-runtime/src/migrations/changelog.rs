//! Single-changelog migrations.
//!
//! Exactly one file whose stem is `databaseChangeLog` must exist across the
//! configured directories. It declares ordered change-sets, each identified by
//! `author:id`, in one of these formats:
//!
//! ```yaml
//! changeSet:
//!   - id: "1"
//!     author: alice
//!     sql: CREATE TABLE tab (id INT)
//!   - id: "2"
//!     author: alice
//!     sqlFile: tab_two.sql
//! ```
//!
//! The same shape is accepted as TOML (`[[changeSet]]`) and JSON. A `.sql`
//! changelog uses `--changeset author:id` header comments instead. XML
//! changelogs are located like any other but rejected when parsed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use modelator_core::config::{DatabaseConfig, MigrationConfig};
use modelator_core::{ModelatorError, Result};

use super::session::{checksum, Param, Session};
use super::AppliedMigration;

/// Stem every changelog file must carry.
pub const CHANGELOG_BASENAME: &str = "databaseChangeLog";

/// Changelog extensions [`parse_changelog`] understands.
pub const CHANGELOG_FORMATS: &[&str] = &["yaml", "yml", "json", "toml", "sql"];

/// One declared change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub id: String,
    pub author: String,
    pub sql: String,
    pub checksum: String,
}

impl ChangeSet {
    fn new(id: String, author: String, sql: String) -> Self {
        let checksum = checksum(&sql);
        Self {
            id,
            author,
            sql,
            checksum,
        }
    }

    /// `author:id`, as written in formatted SQL headers.
    pub fn key(&self) -> String {
        format!("{}:{}", self.author, self.id)
    }
}

#[derive(Debug, Deserialize)]
struct ChangelogDocument {
    #[serde(rename = "changeSet", alias = "change_set", default)]
    change_sets: Vec<ChangeSetEntry>,
}

#[derive(Debug, Deserialize)]
struct ChangeSetEntry {
    id: String,
    author: String,
    #[serde(default)]
    sql: Option<String>,
    #[serde(rename = "sqlFile", alias = "sql_file", default)]
    sql_file: Option<PathBuf>,
}

/// Find the single changelog across all directories.
pub fn locate_changelog(directories: &[PathBuf]) -> Result<PathBuf> {
    let mut found = Vec::new();

    for dir in directories {
        if !dir.is_dir() {
            warn!(directory = %dir.display(), "Migrations directory does not exist");
            continue;
        }

        let mut in_dir = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_changelog = path
                .file_stem()
                .map(|stem| stem == CHANGELOG_BASENAME)
                .unwrap_or(false);
            if is_changelog && path.is_file() {
                in_dir.push(path);
            }
        }
        in_dir.sort();
        found.extend(in_dir);
    }

    match found.len() {
        0 => Err(ModelatorError::ChangelogNotFound {
            directories: directories.to_vec(),
        }),
        1 => Ok(found.remove(0)),
        _ => Err(ModelatorError::AmbiguousChangelog { paths: found }),
    }
}

/// Read the change-sets a changelog declares, in file order.
pub fn parse_changelog(path: &Path) -> Result<Vec<ChangeSet>> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let change_sets = match extension.as_str() {
        "sql" => parse_formatted_sql(&content)?,
        "toml" => {
            let doc: ChangelogDocument = toml::from_str(&content).map_err(|e| invalid(path, e))?;
            resolve_entries(path, doc)?
        }
        "yaml" | "yml" => {
            let doc: ChangelogDocument =
                serde_yaml::from_str(&content).map_err(|e| invalid(path, e))?;
            resolve_entries(path, doc)?
        }
        "json" => {
            let doc: ChangelogDocument =
                serde_json::from_str(&content).map_err(|e| invalid(path, e))?;
            resolve_entries(path, doc)?
        }
        "xml" => {
            return Err(ModelatorError::Config(format!(
                "Unsupported changelog format 'xml': {}; XML changelogs are not supported, \
                 rewrite it as one of {}",
                path.display(),
                CHANGELOG_FORMATS.join(", ")
            )))
        }
        other => {
            return Err(ModelatorError::Config(format!(
                "Unsupported changelog format '{}': {}; expected one of {}",
                other,
                path.display(),
                CHANGELOG_FORMATS.join(", ")
            )))
        }
    };

    let mut seen = HashSet::new();
    if let Some(dup) = change_sets.iter().find(|cs| !seen.insert(cs.key())) {
        return Err(ModelatorError::Config(format!(
            "Change-set {} is declared twice in {}",
            dup.key(),
            path.display()
        )));
    }

    Ok(change_sets)
}

fn invalid(path: &Path, e: impl std::fmt::Display) -> ModelatorError {
    ModelatorError::Config(format!("Invalid changelog {}: {}", path.display(), e))
}

fn resolve_entries(path: &Path, doc: ChangelogDocument) -> Result<Vec<ChangeSet>> {
    let base = path.parent().unwrap_or(Path::new("."));

    doc.change_sets
        .into_iter()
        .map(|entry| {
            let sql = match (entry.sql, entry.sql_file) {
                (Some(sql), None) => sql,
                (None, Some(file)) => std::fs::read_to_string(base.join(&file)).map_err(|e| {
                    ModelatorError::Config(format!(
                        "Change-set {}:{} references {}: {}",
                        entry.author,
                        entry.id,
                        file.display(),
                        e
                    ))
                })?,
                _ => {
                    return Err(ModelatorError::Config(format!(
                        "Change-set {}:{} must declare exactly one of sql or sqlFile",
                        entry.author, entry.id
                    )))
                }
            };
            Ok(ChangeSet::new(entry.id, entry.author, sql))
        })
        .collect()
}

/// Parse a formatted SQL changelog.
///
/// Each `--changeset author:id` line opens a change-set that runs until the
/// next header. `--rollback` lines are ignored.
pub fn parse_formatted_sql(content: &str) -> Result<Vec<ChangeSet>> {
    let mut change_sets = Vec::new();
    let mut current: Option<(String, String, Vec<&str>)> = None;

    for (number, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if let Some(header) = changeset_header(trimmed) {
            if let Some((author, id, body)) = current.take() {
                change_sets.push(ChangeSet::new(id, author, body.join("\n").trim().to_string()));
            }
            let (author, id) = header.split_once(':').ok_or_else(|| {
                ModelatorError::Config(format!(
                    "line {}: changeset header must be 'author:id', found '{}'",
                    number + 1,
                    header
                ))
            })?;
            current = Some((author.to_string(), id.to_string(), Vec::new()));
            continue;
        }

        if is_directive(trimmed, "rollback") {
            continue;
        }

        match current.as_mut() {
            Some((_, _, body)) => body.push(line),
            None if trimmed.is_empty() || trimmed.starts_with("--") => {}
            None => {
                return Err(ModelatorError::Config(format!(
                    "line {}: SQL before the first --changeset header",
                    number + 1
                )))
            }
        }
    }

    if let Some((author, id, body)) = current {
        change_sets.push(ChangeSet::new(id, author, body.join("\n").trim().to_string()));
    }

    Ok(change_sets)
}

/// `author:id` from a `--changeset author:id [attributes]` line.
fn changeset_header(line: &str) -> Option<&str> {
    if !is_directive(line, "changeset") {
        return None;
    }
    let rest = line.trim_start_matches('-').trim_start();
    rest["changeset".len()..].split_whitespace().next().or(Some(""))
}

fn is_directive(line: &str, name: &str) -> bool {
    line.starts_with("--")
        && line
            .trim_start_matches('-')
            .trim_start()
            .get(..name.len())
            .map(|word| word.eq_ignore_ascii_case(name))
            .unwrap_or(false)
}

/// Changelog-driven engine.
pub struct ChangelogMigrator {
    session: Session,
    config: MigrationConfig,
    changelog: PathBuf,
    change_sets: Vec<ChangeSet>,
}

impl ChangelogMigrator {
    /// Locate and parse the changelog, then open the engine's session.
    ///
    /// The changelog is resolved before connecting, so a missing or
    /// ambiguous changelog fails without touching the database.
    pub async fn connect(migration: &MigrationConfig, database: &DatabaseConfig) -> Result<Self> {
        let changelog = locate_changelog(&migration.directories)?;
        let change_sets = parse_changelog(&changelog)?;
        info!(
            changelog = %changelog.display(),
            change_sets = change_sets.len(),
            "Using changelog"
        );

        let session = Session::open(database, migration).await?;

        Ok(Self {
            session,
            config: migration.clone(),
            changelog,
            change_sets,
        })
    }

    /// Name recorded with every change-set, independent of where the
    /// project is checked out.
    fn filename(&self) -> String {
        self.changelog
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| CHANGELOG_BASENAME.to_string())
    }

    /// Drop every object in each managed schema.
    pub async fn clean(&mut self) -> Result<()> {
        let schemas = self.session.managed_schemas(&self.config).await?;
        self.session.clean_schemas(&schemas).await
    }

    /// Apply pending change-sets in file order. Returns how many were applied.
    pub async fn migrate(&mut self) -> Result<usize> {
        self.session.acquire_lock().await?;

        let result = self.migrate_inner().await;

        if let Err(e) = self.session.release_lock().await {
            warn!("Failed to release migration lock: {}", e);
        }

        result
    }

    async fn migrate_inner(&mut self) -> Result<usize> {
        let dialect = self.session.dialect();
        let table = dialect.history_table(&self.config);
        let timestamp = dialect.timestamp_type();
        let filename = self.filename();

        self.session
            .execute(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id VARCHAR(255) NOT NULL,
                    author VARCHAR(255) NOT NULL,
                    filename VARCHAR(255) NOT NULL,
                    checksum CHAR(64) NOT NULL,
                    order_executed SERIAL,
                    date_executed {timestamp} NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    PRIMARY KEY (id, author, filename)
                )
                "#
            ))
            .await
            .map_err(|e| ModelatorError::migration("history table", e))?;

        let rows: Vec<(String, String, String)> = self
            .session
            .fetch_all(
                &format!(
                    "SELECT id, author, checksum FROM {table} WHERE filename = {}",
                    dialect.placeholder(1)
                ),
                &[Param::Text(&filename)],
            )
            .await?;
        let applied: HashMap<(String, String), String> = rows
            .into_iter()
            .map(|(id, author, checksum)| ((id, author), checksum))
            .collect();

        let record = dialect.insert(&table, &["id", "author", "filename", "checksum"]);

        let mut count = 0;
        for change_set in &self.change_sets {
            let key = (change_set.id.clone(), change_set.author.clone());
            match applied.get(&key) {
                Some(recorded) if *recorded != change_set.checksum => {
                    return Err(ModelatorError::ChecksumMismatch {
                        name: change_set.key(),
                        expected: recorded.clone(),
                        actual: change_set.checksum.clone(),
                    });
                }
                Some(_) => continue,
                None => {
                    info!(change_set = %change_set.key(), "Applying change-set");
                    self.session
                        .apply(
                            &change_set.key(),
                            &change_set.sql,
                            &record,
                            &[
                                Param::Text(&change_set.id),
                                Param::Text(&change_set.author),
                                Param::Text(&filename),
                                Param::Text(&change_set.checksum),
                            ],
                        )
                        .await?;
                    count += 1;
                }
            }
        }

        debug!(applied = count, "Changelog applied");
        Ok(count)
    }

    /// Executed change-sets in execution order.
    pub async fn applied(&mut self) -> Result<Vec<AppliedMigration>> {
        if !self.session.history_table_exists(&self.config).await? {
            return Ok(Vec::new());
        }

        let table = self.session.dialect().history_table(&self.config);
        let rows: Vec<(String, String, String, DateTime<Utc>)> = self
            .session
            .fetch_all(
                &format!(
                    "SELECT id, author, filename, date_executed FROM {table} ORDER BY order_executed"
                ),
                &[],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, author, filename, installed_on)| AppliedMigration {
                name: format!("{}:{}", author, id),
                description: filename,
                installed_on,
            })
            .collect())
    }

    pub async fn close(self) {
        self.session.close().await;
    }
}
