//! Runtime configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file
//! (`billing.toml` unless another path is given), then environment variables
//! prefixed with `BILLING__`, e.g. `BILLING__DATABASE__URL=sqlite:prod.db`.
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "billing";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx connection URL, e.g. `sqlite:billing.db`
    pub url: String,
    pub max_connections: u32,
    /// How long to wait for a free pooled connection
    pub acquire_timeout_ms: u64,
    /// Deadline for a whole store operation, transaction included
    pub operation_timeout_ms: u64,
    /// How long SQLite waits on a locked database before giving up
    pub busy_timeout_ms: u64,
}

impl DatabaseSettings {
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite:{}", path),
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:billing.db".to_string(),
            max_connections: 8,
            acquire_timeout_ms: 3_000,
            operation_timeout_ms: 10_000,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from `path` (extension optional) and the environment.
    /// A missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(false))
            .add_source(
                Environment::with_prefix("BILLING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.database.url, "sqlite:billing.db");
        assert_eq!(
            settings.database.operation_timeout(),
            Duration::from_secs(10)
        );
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[database]\nurl = \"sqlite:other.db\"\nmax_connections = 2\n\n[logging]\njson = true"
        )
        .unwrap();

        let settings = Settings::load(path.to_str()).unwrap();
        assert_eq!(settings.database.url, "sqlite:other.db");
        assert_eq!(settings.database.max_connections, 2);
        // untouched keys keep their defaults
        assert_eq!(settings.database.busy_timeout_ms, 5_000);
        assert!(settings.logging.json);
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let settings = Settings::load(path.to_str()).unwrap();
        assert_eq!(settings.database.max_connections, 8);
    }

    #[test]
    fn test_sqlite_helper() {
        let db = DatabaseSettings::sqlite("/tmp/x.db");
        assert_eq!(db.url, "sqlite:/tmp/x.db");
        assert_eq!(db.max_connections, 8);
    }
}
