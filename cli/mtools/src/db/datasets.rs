//! Datasets, their instances, and the pool that serves unasked instances.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mtools_allocate::{Pool, PoolError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use super::DbError;

/// A loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    pub key: i64,
    pub filename: String,
    pub checksum: String,
    pub eval_type: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for DatasetRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            key: row.try_get("key")?,
            filename: row.try_get("filename")?,
            checksum: row.try_get("checksum")?,
            eval_type: row.try_get("eval_type")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// One sentence pair of a dataset.
///
/// Identity is the storage key.
#[derive(Debug, Clone)]
pub struct Instance {
    pub key: i64,
    pub dataset_key: i64,
    pub sentence_good: String,
    pub sentence_bad: String,
    pub left_context: Option<String>,
    pub right_context: Option<String>,
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Instance {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            key: row.try_get("key")?,
            dataset_key: row.try_get("dataset_key")?,
            sentence_good: row.try_get("sentence_good")?,
            sentence_bad: row.try_get("sentence_bad")?,
            left_context: row.try_get("left_context")?,
            right_context: row.try_get("right_context")?,
        })
    }
}

/// Instance to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstance {
    pub sentence_good: String,
    pub sentence_bad: String,
    pub left_context: Option<String>,
    pub right_context: Option<String>,
}

/// Dataset and instance storage.
#[derive(Clone)]
pub struct DatasetStore {
    pool: PgPool,
}

impl DatasetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a dataset and all of its instances in one transaction.
    #[instrument(skip(self, checksum, instances), fields(instance_count = instances.len()))]
    pub async fn insert(
        &self,
        filename: &str,
        eval_type: &str,
        checksum: &str,
        instances: &[NewInstance],
    ) -> Result<DatasetRow, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;

        let dataset: DatasetRow = sqlx::query_as(
            r#"
            INSERT INTO datasets (filename, eval_type, checksum)
            VALUES ($1, $2, $3)
            RETURNING key, filename, checksum, eval_type, created_at
            "#,
        )
        .bind(filename)
        .bind(eval_type)
        .bind(checksum)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        for instance in instances {
            sqlx::query(
                r#"
                INSERT INTO instances
                    (dataset_key, sentence_good, sentence_bad, left_context, right_context)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(dataset.key)
            .bind(&instance.sentence_good)
            .bind(&instance.sentence_bad)
            .bind(&instance.left_context)
            .bind(&instance.right_context)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;
        }

        tx.commit().await.map_err(DbError::Query)?;

        debug!(dataset_key = dataset.key, "Dataset stored");
        Ok(dataset)
    }

    pub async fn exists(&self, filename: &str, eval_type: &str) -> Result<bool, DbError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM datasets WHERE filename = $1 AND eval_type = $2)",
        )
        .bind(filename)
        .bind(eval_type)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Datasets loaded from `filename`, optionally narrowed to one eval type.
    pub async fn find_by_filename(
        &self,
        filename: &str,
        eval_type: Option<&str>,
    ) -> Result<Vec<DatasetRow>, DbError> {
        sqlx::query_as(
            r#"
            SELECT key, filename, checksum, eval_type, created_at
            FROM datasets
            WHERE filename = $1 AND ($2::TEXT IS NULL OR eval_type = $2)
            ORDER BY key
            "#,
        )
        .bind(filename)
        .bind(eval_type)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Number of instances of a dataset that no question has used yet.
    pub async fn count_unasked(&self, dataset_key: i64) -> Result<i64, DbError> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::BIGINT
            FROM instances i
            WHERE i.dataset_key = $1
              AND NOT EXISTS (SELECT 1 FROM questions q WHERE q.instance_key = i.key)
            "#,
        )
        .bind(dataset_key)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Allocation pool over this dataset's unasked instances.
    pub fn pool(&self, dataset: DatasetRow) -> DatasetPool {
        DatasetPool {
            pool: self.pool.clone(),
            dataset,
        }
    }
}

/// Allocation pool serving a dataset's unasked instances in key order.
///
/// Fetching does not claim anything: the same instances come back until a
/// question row references them.
#[derive(Clone)]
pub struct DatasetPool {
    pool: PgPool,
    dataset: DatasetRow,
}

#[async_trait]
impl Pool for DatasetPool {
    type Item = Instance;

    fn name(&self) -> &str {
        &self.dataset.filename
    }

    async fn fetch(&self, n: usize) -> Result<Vec<Instance>, PoolError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);

        let instances: Vec<Instance> = sqlx::query_as(
            r#"
            SELECT i.key, i.dataset_key, i.sentence_good, i.sentence_bad,
                   i.left_context, i.right_context
            FROM instances i
            WHERE i.dataset_key = $1
              AND NOT EXISTS (SELECT 1 FROM questions q WHERE q.instance_key = i.key)
            ORDER BY i.key
            LIMIT $2
            "#,
        )
        .bind(self.dataset.key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        debug!(
            dataset = %self.dataset.filename,
            asked = n,
            received = instances.len(),
            "Fetched unasked instances"
        );
        Ok(instances)
    }
}
