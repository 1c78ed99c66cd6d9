//! Answer keys for scoring.

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::DbError;

/// Expected selection of a question and the dataset it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey {
    pub question_key: i64,
    pub answer: String,
    pub dataset: String,
    pub eval_type: String,
}

impl AnswerKey {
    /// Dataset name used in reports: the file plus its eval type.
    pub fn dataset_label(&self) -> String {
        format!("{} ({})", self.dataset, self.eval_type)
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for AnswerKey {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            question_key: row.try_get("question_key")?,
            answer: row.try_get("answer")?,
            dataset: row.try_get("dataset")?,
            eval_type: row.try_get("eval_type")?,
        })
    }
}

#[derive(Clone)]
pub struct QuestionStore {
    pool: PgPool,
}

impl QuestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Answer keys for the given questions. Unknown keys are absent from
    /// the map.
    pub async fn answer_keys(&self, keys: &[i64]) -> Result<HashMap<i64, AnswerKey>, DbError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<AnswerKey> = sqlx::query_as(
            r#"
            SELECT q.key AS question_key, q.answer, d.filename AS dataset, d.eval_type
            FROM questions q
            JOIN instances i ON i.key = q.instance_key
            JOIN datasets d ON d.key = i.dataset_key
            WHERE q.key = ANY($1)
            "#,
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(rows.into_iter().map(|k| (k.question_key, k)).collect())
    }
}
