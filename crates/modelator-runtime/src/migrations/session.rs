//! Connection plumbing shared by both engines: session setup, migration
//! locking, schema cleaning, and checksums.
//!
//! PostgreSQL schemas map to MariaDB/MySQL databases; everything else that
//! differs between the two is expressed through [`Dialect`].

use sha2::{Digest, Sha256};
use sqlx::mysql::{MySql, MySqlConnection, MySqlRow};
use sqlx::postgres::{PgConnection, PgRow, Postgres};
use sqlx::{Connection, FromRow};
use tracing::{debug, warn};

use modelator_core::config::{DatabaseConfig, MigrationConfig};
use modelator_core::{ModelatorError, Result};

use crate::db::{connect_options, ConnectOptions};

/// Advisory lock key held while migrating ("MODEL" in hex).
const MIGRATION_LOCK_ID: i64 = 0x4D4F44454C;

/// Named lock held while migrating on MariaDB/MySQL.
const MIGRATION_LOCK_NAME: &str = "modelator_migration";
const MIGRATION_LOCK_TIMEOUT_SECS: i64 = 600;

/// SQL differences between the supported servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Postgres,
    Mysql,
}

impl Dialect {
    /// Bind placeholder for the 1-based parameter `index`.
    pub(crate) fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier, doubling embedded quote characters.
    pub(crate) fn quote_ident(self, ident: &str) -> String {
        match self {
            Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::Mysql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Column type for history timestamps.
    pub(crate) fn timestamp_type(self) -> &'static str {
        match self {
            Self::Postgres => "TIMESTAMPTZ",
            Self::Mysql => "TIMESTAMP",
        }
    }

    /// Fully qualified, quoted name of the history table.
    pub(crate) fn history_table(self, migration: &MigrationConfig) -> String {
        match migration.schemas.first() {
            Some(schema) => format!(
                "{}.{}",
                self.quote_ident(schema),
                self.quote_ident(&migration.history_table)
            ),
            None => self.quote_ident(&migration.history_table),
        }
    }

    /// `INSERT INTO table (columns..) VALUES (placeholders..)`.
    pub(crate) fn insert(self, table: &str, columns: &[&str]) -> String {
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// Count of tables named by the second parameter in the schema named by
    /// the first, or in the session's current schema when that is NULL.
    fn table_count_sql(self) -> &'static str {
        match self {
            Self::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = COALESCE($1, current_schema()::text) AND table_name = $2"
            }
            Self::Mysql => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?"
            }
        }
    }
}

/// A value bound to a history-table statement.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Param<'a> {
    Text(&'a str),
    Int(i64),
}

/// An engine's own connection.
pub(crate) enum Session {
    Postgres(PgConnection),
    Mysql(MySqlConnection),
}

impl Session {
    /// Open the engine's session.
    ///
    /// With configured schemas, every schema is created if missing and the
    /// session defaults to the first one.
    pub(crate) async fn open(database: &DatabaseConfig, migration: &MigrationConfig) -> Result<Self> {
        match connect_options(database)? {
            ConnectOptions::Postgres(mut options) => {
                if let Some(first) = migration.schemas.first() {
                    options = options.options([("search_path", Dialect::Postgres.quote_ident(first))]);
                }
                let mut conn = PgConnection::connect_with(&options).await?;

                for schema in &migration.schemas {
                    let quoted = Dialect::Postgres.quote_ident(schema);
                    sqlx::Executor::execute(&mut conn, sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted)))
                        .await?;
                }

                Ok(Self::Postgres(conn))
            }
            ConnectOptions::Mysql(options) => {
                let mut conn = MySqlConnection::connect_with(&options).await?;

                for schema in &migration.schemas {
                    let quoted = Dialect::Mysql.quote_ident(schema);
                    sqlx::Executor::execute(&mut conn, sqlx::raw_sql(&format!("CREATE DATABASE IF NOT EXISTS {}", quoted)))
                        .await?;
                }
                if let Some(first) = migration.schemas.first() {
                    sqlx::Executor::execute(&mut conn, sqlx::raw_sql(&format!("USE {}", Dialect::Mysql.quote_ident(first))))
                        .await?;
                }

                Ok(Self::Mysql(conn))
            }
        }
    }

    pub(crate) fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(_) => Dialect::Postgres,
            Self::Mysql(_) => Dialect::Mysql,
        }
    }

    /// Run raw SQL, discarding any rows.
    pub(crate) async fn execute(&mut self, sql: &str) -> Result<()> {
        match self {
            Self::Postgres(conn) => {
                sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?;
            }
            Self::Mysql(conn) => {
                sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn fetch_all<T>(&mut self, sql: &str, params: &[Param<'_>]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let rows = match self {
            Self::Postgres(conn) => {
                let mut query = sqlx::query_as::<Postgres, T>(sql);
                for param in params {
                    query = match *param {
                        Param::Text(value) => query.bind(value),
                        Param::Int(value) => query.bind(value),
                    };
                }
                query.fetch_all(&mut *conn).await?
            }
            Self::Mysql(conn) => {
                let mut query = sqlx::query_as::<MySql, T>(sql);
                for param in params {
                    query = match *param {
                        Param::Text(value) => query.bind(value),
                        Param::Int(value) => query.bind(value),
                    };
                }
                query.fetch_all(&mut *conn).await?
            }
        };
        Ok(rows)
    }

    /// Run a migration body and record it in one transaction.
    ///
    /// MariaDB/MySQL commit DDL implicitly, so there only the record is
    /// transactional.
    pub(crate) async fn apply(
        &mut self,
        name: &str,
        body: &str,
        record_sql: &str,
        params: &[Param<'_>],
    ) -> Result<()> {
        match self {
            Self::Postgres(conn) => {
                let mut tx = conn.begin().await?;
                sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(body))
                    .await
                    .map_err(|e| ModelatorError::migration(name, e))?;

                let mut query = sqlx::query::<Postgres>(record_sql);
                for param in params {
                    query = match *param {
                        Param::Text(value) => query.bind(value),
                        Param::Int(value) => query.bind(value),
                    };
                }
                query
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ModelatorError::migration(name, e))?;
                tx.commit().await?;
            }
            Self::Mysql(conn) => {
                let mut tx = conn.begin().await?;
                sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(body))
                    .await
                    .map_err(|e| ModelatorError::migration(name, e))?;

                let mut query = sqlx::query::<MySql>(record_sql);
                for param in params {
                    query = match *param {
                        Param::Text(value) => query.bind(value),
                        Param::Int(value) => query.bind(value),
                    };
                }
                query
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ModelatorError::migration(name, e))?;
                tx.commit().await?;
            }
        }
        Ok(())
    }

    /// Schemas the engine owns: the configured ones, or the session's current schema.
    pub(crate) async fn managed_schemas(&mut self, migration: &MigrationConfig) -> Result<Vec<String>> {
        if !migration.schemas.is_empty() {
            return Ok(migration.schemas.clone());
        }

        let current: Option<String> = match self {
            Self::Postgres(conn) => {
                sqlx::query_scalar::<Postgres, Option<String>>("SELECT current_schema()")
                    .fetch_one(&mut *conn)
                    .await?
            }
            Self::Mysql(conn) => {
                sqlx::query_scalar::<MySql, Option<String>>("SELECT DATABASE()")
                    .fetch_one(&mut *conn)
                    .await?
            }
        };

        current
            .map(|s| vec![s])
            .ok_or_else(|| ModelatorError::migration("clean", "session has no current schema"))
    }

    /// Drop and recreate each schema, taking every object in it along.
    pub(crate) async fn clean_schemas(&mut self, schemas: &[String]) -> Result<()> {
        warn!(schemas = ?schemas, "Dropping every object in the managed schemas");
        let dialect = self.dialect();

        for schema in schemas {
            let quoted = dialect.quote_ident(schema);
            let statements = match dialect {
                Dialect::Postgres => {
                    format!("DROP SCHEMA IF EXISTS {quoted} CASCADE; CREATE SCHEMA {quoted}")
                }
                Dialect::Mysql => {
                    format!("DROP DATABASE IF EXISTS {quoted}; CREATE DATABASE {quoted}")
                }
            };
            self.execute(&statements)
                .await
                .map_err(|e| ModelatorError::migration(format!("clean {}", schema), e))?;
            debug!(schema = %schema, "Schema cleaned");
        }

        // Dropping the current database leaves a MariaDB session without one.
        if let (Dialect::Mysql, Some(first)) = (dialect, schemas.first()) {
            self.execute(&format!("USE {}", dialect.quote_ident(first))).await?;
        }

        Ok(())
    }

    /// Whether the history table exists in its schema.
    pub(crate) async fn history_table_exists(&mut self, migration: &MigrationConfig) -> Result<bool> {
        let schema = migration.schemas.first().map(String::as_str);
        let table = migration.history_table.as_str();
        let sql = self.dialect().table_count_sql();

        let count: i64 = match self {
            Self::Postgres(conn) => {
                sqlx::query_scalar::<Postgres, i64>(sql)
                    .bind(schema)
                    .bind(table)
                    .fetch_one(&mut *conn)
                    .await?
            }
            Self::Mysql(conn) => {
                sqlx::query_scalar::<MySql, i64>(sql)
                    .bind(schema)
                    .bind(table)
                    .fetch_one(&mut *conn)
                    .await?
            }
        };
        Ok(count > 0)
    }

    pub(crate) async fn acquire_lock(&mut self) -> Result<()> {
        debug!("Acquiring migration lock...");
        match self {
            Self::Postgres(conn) => {
                sqlx::query("SELECT pg_advisory_lock($1)")
                    .bind(MIGRATION_LOCK_ID)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| ModelatorError::migration("lock", e))?;
            }
            Self::Mysql(conn) => {
                let granted: Option<i64> = sqlx::query_scalar("SELECT GET_LOCK(?, ?)")
                    .bind(MIGRATION_LOCK_NAME)
                    .bind(MIGRATION_LOCK_TIMEOUT_SECS)
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(|e| ModelatorError::migration("lock", e))?;
                if granted != Some(1) {
                    return Err(ModelatorError::migration(
                        "lock",
                        format!("lock not granted within {}s", MIGRATION_LOCK_TIMEOUT_SECS),
                    ));
                }
            }
        }
        debug!("Migration lock acquired");
        Ok(())
    }

    pub(crate) async fn release_lock(&mut self) -> Result<()> {
        match self {
            Self::Postgres(conn) => {
                sqlx::query("SELECT pg_advisory_unlock($1)")
                    .bind(MIGRATION_LOCK_ID)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| ModelatorError::migration("unlock", e))?;
            }
            Self::Mysql(conn) => {
                sqlx::query("SELECT RELEASE_LOCK(?)")
                    .bind(MIGRATION_LOCK_NAME)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| ModelatorError::migration("unlock", e))?;
            }
        }
        debug!("Migration lock released");
        Ok(())
    }

    pub(crate) async fn close(self) {
        let result = match self {
            Self::Postgres(conn) => conn.close().await,
            Self::Mysql(conn) => conn.close().await,
        };
        if let Err(e) = result {
            debug!(error = %e, "Error closing migration session");
        }
    }
}

/// Hex sha256 of a script body.
pub(crate) fn checksum(sql: &str) -> String {
    format!("{:x}", Sha256::digest(sql.as_bytes()))
}
