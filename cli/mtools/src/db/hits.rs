//! HIT types, posted HITs, and the questions a HIT carries.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;

use super::DbError;

/// A registered HIT type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitTypeRow {
    pub key: i64,
    pub short_name: String,
    pub hit_type_id: String,
    pub title: String,
    pub keywords: Option<String>,
    pub description: String,
    pub reward: String,
    pub assignment_duration_secs: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for HitTypeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            key: row.try_get("key")?,
            short_name: row.try_get("short_name")?,
            hit_type_id: row.try_get("hit_type_id")?,
            title: row.try_get("title")?,
            keywords: row.try_get("keywords")?,
            description: row.try_get("description")?,
            reward: row.try_get("reward")?,
            assignment_duration_secs: row.try_get("assignment_duration_secs")?,
        })
    }
}

/// HIT type to record after the marketplace created it.
#[derive(Debug, Clone)]
pub struct NewHitType {
    pub short_name: String,
    pub hit_type_id: String,
    pub title: String,
    pub keywords: Option<String>,
    pub description: String,
    pub reward: String,
    pub assignment_duration_secs: i64,
}

/// Question to insert for a claimed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub instance_key: i64,
    /// Selection identifier of the good sentence.
    pub answer: String,
    pub choice_a: String,
    pub choice_b: String,
}

/// HIT type and HIT storage.
#[derive(Clone)]
pub struct HitStore {
    pool: PgPool,
}

impl HitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn hit_type_exists(&self, short_name: &str) -> Result<bool, DbError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM hit_types WHERE short_name = $1)")
            .bind(short_name)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    pub async fn find_hit_type(&self, short_name: &str) -> Result<Option<HitTypeRow>, DbError> {
        sqlx::query_as(
            r#"
            SELECT key, short_name, hit_type_id, title, keywords, description, reward,
                   assignment_duration_secs
            FROM hit_types
            WHERE short_name = $1
            "#,
        )
        .bind(short_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    pub async fn insert_hit_type(&self, hit_type: &NewHitType) -> Result<HitTypeRow, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO hit_types
                (short_name, hit_type_id, title, keywords, description, reward,
                 assignment_duration_secs)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING key, short_name, hit_type_id, title, keywords, description, reward,
                      assignment_duration_secs
            "#,
        )
        .bind(&hit_type.short_name)
        .bind(&hit_type.hit_type_id)
        .bind(&hit_type.title)
        .bind(&hit_type.keywords)
        .bind(&hit_type.description)
        .bind(&hit_type.reward)
        .bind(hit_type.assignment_duration_secs)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Marketplace ids of every posted HIT of a HIT type.
    pub async fn hit_ids_for_type(&self, hit_type_key: i64) -> Result<Vec<String>, DbError> {
        sqlx::query_scalar(
            r#"
            SELECT hit_id
            FROM hits
            WHERE hit_type_key = $1 AND hit_id IS NOT NULL
            ORDER BY key
            "#,
        )
        .bind(hit_type_key)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    /// Insert a HIT row and its questions on `conn`.
    ///
    /// Returns the HIT key and the question keys in input order. Meant to
    /// run inside the transaction that also records the marketplace id.
    pub async fn claim(
        conn: &mut PgConnection,
        hit_type_key: i64,
        questions: &[NewQuestion],
    ) -> Result<(i64, Vec<i64>), DbError> {
        let hit_key: i64 =
            sqlx::query_scalar("INSERT INTO hits (hit_type_key) VALUES ($1) RETURNING key")
                .bind(hit_type_key)
                .fetch_one(&mut *conn)
                .await
                .map_err(DbError::Query)?;

        let mut question_keys = Vec::with_capacity(questions.len());
        for question in questions {
            let key: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO questions (hit_key, instance_key, answer, choice_a, choice_b)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING key
                "#,
            )
            .bind(hit_key)
            .bind(question.instance_key)
            .bind(&question.answer)
            .bind(&question.choice_a)
            .bind(&question.choice_b)
            .fetch_one(&mut *conn)
            .await
            .map_err(DbError::Query)?;
            question_keys.push(key);
        }

        debug!(hit_key, question_count = question_keys.len(), "HIT claimed");
        Ok((hit_key, question_keys))
    }

    /// Record the marketplace id of a claimed HIT.
    pub async fn set_hit_id(
        conn: &mut PgConnection,
        hit_key: i64,
        hit_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE hits SET hit_id = $2 WHERE key = $1")
            .bind(hit_key)
            .bind(hit_id)
            .execute(&mut *conn)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }
}
