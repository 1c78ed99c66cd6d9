//! Database layer for campaign state.
//!
//! This module provides:
//! - Connection pool management
//! - Schema migrations and teardown
//! - Dataset, HIT, question and qualification stores
//! - The dataset-backed allocation pool
//! - The session advisory lock that serializes deploys
//!
//! The database layer uses SQLx with Postgres.

mod datasets;
mod error;
mod hits;
mod qualifications;
mod questions;

pub use datasets::{DatasetPool, DatasetRow, DatasetStore, Instance, NewInstance};
pub use error::DbError;
pub use hits::{HitStore, HitTypeRow, NewHitType, NewQuestion};
pub use qualifications::{NewQualification, QualificationRow, QualificationStore};
pub use questions::{AnswerKey, QuestionStore};

use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use tracing::{debug, info, warn};

/// Tables dropped by [`Database::drop_all`], children first.
const TABLES: &[&str] = &[
    "questions",
    "hits",
    "instances",
    "datasets",
    "hit_types",
    "qualifications",
    "_sqlx_migrations",
];

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/mtools".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        debug!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Create the schema by running pending migrations.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        let candidates = [
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("cli/mtools/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    debug!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator.run(&self.pool).await.map_err(DbError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(DbError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Drop every campaign table, including the migration ledger.
    pub async fn drop_all(&self) -> Result<(), DbError> {
        warn!("Dropping all tables");

        let statement = format!("DROP TABLE IF EXISTS {} CASCADE", TABLES.join(", "));
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Take the session-level advisory lock `key` without waiting.
    ///
    /// The lock lives on a dedicated connection and is released by
    /// [`AdvisoryLock::release`].
    pub async fn try_lock(&self, key: i64) -> Result<AdvisoryLock, DbError> {
        let mut conn = self.pool.acquire().await.map_err(DbError::Query)?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(DbError::Query)?;

        if !acquired {
            return Err(DbError::LockHeld { key });
        }

        debug!(key, "Advisory lock acquired");
        Ok(AdvisoryLock { conn, key })
    }

    pub fn datasets(&self) -> DatasetStore {
        DatasetStore::new(self.pool.clone())
    }

    pub fn hits(&self) -> HitStore {
        HitStore::new(self.pool.clone())
    }

    pub fn questions(&self) -> QuestionStore {
        QuestionStore::new(self.pool.clone())
    }

    pub fn qualifications(&self) -> QualificationStore {
        QualificationStore::new(self.pool.clone())
    }
}

/// A held session advisory lock.
///
/// Dropping without [`release`](Self::release) returns the connection to the
/// pool with the lock still held until that session ends; callers release
/// explicitly.
pub struct AdvisoryLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

impl AdvisoryLock {
    /// Release the lock.
    pub async fn release(mut self) -> Result<(), DbError> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut *self.conn)
            .await
            .map_err(DbError::Query)?;

        debug!(key = self.key, "Advisory lock released");
        Ok(())
    }
}
