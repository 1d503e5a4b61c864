use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::application::AppError;
use crate::settings::DatabaseSettings;

use super::{MIGRATION_001_INITIAL, MIGRATION_002_RESERVES};

/// Repository for balances, the journal and reservations.
///
/// Holds no state besides the connection pool: every operation is one
/// self-contained transaction, and concurrent operations on the same user are
/// arbitrated by the database's write lock. Cloning is cheap and shares the
/// pool.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool, operation_timeout: Duration) -> Self {
        Self {
            pool,
            operation_timeout,
        }
    }

    /// Connect to an existing database.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        Self::open(settings, false).await
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::raw_sql(MIGRATION_002_RESERVES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a database, creating the file if needed (connect + migrate).
    pub async fn init(settings: &DatabaseSettings) -> Result<Self> {
        let repo = Self::open(settings, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn open(settings: &DatabaseSettings, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("Invalid database url: {}", settings.url))?
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(settings.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        tracing::debug!(url = %settings.url, "connected to database");
        Ok(Self::new(pool, settings.operation_timeout()))
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction. Dropping it without committing rolls it back.
    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?)
    }

    /// Run a store operation under the configured deadline.
    ///
    /// When the deadline passes the operation's future is dropped, which
    /// rolls back any transaction it had open.
    pub(crate) async fn within<T, F>(&self, operation: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "store operation timed out"
                );
                Err(AppError::Internal)
            }
        }
    }
}

/// Timestamps are stored as fixed-width UTC strings so that comparing the
/// text compares the instants.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}
