//! Qualification types.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::DbError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualificationRow {
    pub key: i64,
    pub short_name: String,
    pub name: String,
    pub qualification_type_id: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for QualificationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            key: row.try_get("key")?,
            short_name: row.try_get("short_name")?,
            name: row.try_get("name")?,
            qualification_type_id: row.try_get("qualification_type_id")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewQualification {
    pub short_name: String,
    pub name: String,
    pub qualification_type_id: String,
}

#[derive(Clone)]
pub struct QualificationStore {
    pool: PgPool,
}

impl QualificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, short_name: &str) -> Result<bool, DbError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM qualifications WHERE short_name = $1)")
            .bind(short_name)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)
    }

    pub async fn insert(&self, qualification: &NewQualification) -> Result<QualificationRow, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO qualifications (short_name, name, qualification_type_id)
            VALUES ($1, $2, $3)
            RETURNING key, short_name, name, qualification_type_id
            "#,
        )
        .bind(&qualification.short_name)
        .bind(&qualification.name)
        .bind(&qualification.qualification_type_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}
