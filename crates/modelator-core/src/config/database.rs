use serde::{Deserialize, Serialize};

use crate::error::{ModelatorError, Result};

/// Connection settings for the disposable database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Driver identifier.
    #[serde(default)]
    pub driver: DriverKind,

    /// Connection URL.
    pub url: String,

    /// User name; overrides any user embedded in the URL.
    #[serde(default)]
    pub user: String,

    /// Password; overrides any password embedded in the URL.
    #[serde(default)]
    pub password: String,
}

impl DatabaseConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ModelatorError::Config("database.url must not be empty".into()));
        }
        let scheme = self.url.split("://").next().unwrap_or_default();
        if !self.driver.accepts_scheme(scheme) {
            return Err(ModelatorError::Config(format!(
                "database.url scheme '{}' does not match driver '{}'",
                scheme,
                self.driver.as_str()
            )));
        }
        Ok(())
    }
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    /// MariaDB or MySQL; schemas map to databases.
    #[serde(alias = "mariadb")]
    Mysql,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        }
    }

    fn accepts_scheme(&self, scheme: &str) -> bool {
        match self {
            Self::Postgres => matches!(scheme, "postgres" | "postgresql"),
            Self::Mysql => matches!(scheme, "mysql" | "mariadb"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_config() {
        let toml = r#"
            driver = "postgresql"
            url = "postgres://localhost:5432/postgres"
            user = "postgres"
            password = "secret"
        "#;

        let config: DatabaseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.driver, DriverKind::Postgres);
        assert_eq!(config.user, "postgres");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_foreign_scheme() {
        let config = DatabaseConfig {
            url: "mysql://localhost/db".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ModelatorError::Config(_))));
    }

    #[test]
    fn test_mariadb_driver_accepts_mysql_urls() {
        let toml = r#"
            driver = "mariadb"
            url = "mysql://localhost:3306/test"
            user = "root"
        "#;

        let config: DatabaseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.driver, DriverKind::Mysql);
        assert!(config.validate().is_ok());

        let mismatched = DatabaseConfig {
            driver: DriverKind::Mysql,
            url: "postgres://localhost/db".into(),
            ..Default::default()
        };
        assert!(matches!(mismatched.validate(), Err(ModelatorError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_driver() {
        let toml = r#"
            driver = "oracle"
            url = "postgres://localhost/db"
        "#;
        assert!(toml::from_str::<DatabaseConfig>(toml).is_err());
    }
}
