//! Loading datasets and registering marketplace templates.

use std::path::{Path, PathBuf};

use mtools_marketplace::{
    CreateHitTypeRequest, CreateQualificationTypeRequest, Marketplace, MarketplaceError,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument};

use crate::db::{
    Database, DatasetRow, DbError, HitTypeRow, NewHitType, NewInstance, NewQualification,
    QualificationRow,
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid definition: {0}")]
    Definition(#[source] serde_json::Error),

    #[error("dataset {filename:?} ({eval_type}) is already loaded")]
    DatasetExists { filename: String, eval_type: String },

    #[error("HIT type {0:?} already exists")]
    HitTypeExists(String),

    #[error("qualification {0:?} already exists")]
    QualificationExists(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),
}

/// One line of a dataset file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetRecord {
    pub sentence_good: String,
    pub sentence_bad: String,
    #[serde(default)]
    pub left_context: Option<String>,
    #[serde(default)]
    pub right_context: Option<String>,
}

impl From<DatasetRecord> for NewInstance {
    fn from(record: DatasetRecord) -> Self {
        Self {
            sentence_good: record.sentence_good,
            sentence_bad: record.sentence_bad,
            left_context: record.left_context,
            right_context: record.right_context,
        }
    }
}

/// A HIT type definition file: the marketplace request plus a local name.
#[derive(Debug, Clone, Deserialize)]
pub struct HitTypeDefinition {
    #[serde(rename = "ShortName")]
    pub short_name: String,
    #[serde(flatten)]
    pub request: CreateHitTypeRequest,
}

/// A qualification definition file.
#[derive(Debug, Clone, Deserialize)]
pub struct QualificationDefinition {
    #[serde(rename = "ShortName")]
    pub short_name: String,
    #[serde(flatten)]
    pub request: CreateQualificationTypeRequest,
}

/// Hex SHA-256 of a file's bytes.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parse JSON-lines dataset contents. Blank lines are skipped.
pub fn parse_records(contents: &str) -> Result<Vec<DatasetRecord>, IngestError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| IngestError::Record {
                line: index + 1,
                source,
            })
        })
        .collect()
}

async fn read(path: &Path) -> Result<Vec<u8>, IngestError> {
    tokio::fs::read(path).await.map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_definition<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, IngestError> {
    let bytes = read(path).await?;
    serde_json::from_slice(&bytes).map_err(IngestError::Definition)
}

/// Load a dataset file and all of its sentence pairs.
///
/// The dataset is recorded under `path` as given. Loading the same file
/// under the same eval type twice fails.
#[instrument(skip(db, path), fields(path = %path.display()))]
pub async fn load_dataset(
    db: &Database,
    path: &Path,
    eval_type: &str,
) -> Result<(DatasetRow, usize), IngestError> {
    let filename = path.display().to_string();
    let store = db.datasets();

    if store.exists(&filename, eval_type).await? {
        return Err(IngestError::DatasetExists {
            filename,
            eval_type: eval_type.to_string(),
        });
    }

    let bytes = read(path).await?;
    let checksum = checksum(&bytes);
    let contents = String::from_utf8_lossy(&bytes);
    let instances: Vec<NewInstance> = parse_records(&contents)?
        .into_iter()
        .map(NewInstance::from)
        .collect();

    let dataset = match store.insert(&filename, eval_type, &checksum, &instances).await {
        Err(e) if e.is_unique_violation() => {
            return Err(IngestError::DatasetExists {
                filename,
                eval_type: eval_type.to_string(),
            })
        }
        other => other?,
    };

    info!(
        dataset_key = dataset.key,
        instances = instances.len(),
        "Loaded dataset"
    );
    Ok((dataset, instances.len()))
}

/// Register a HIT type remotely and record it.
///
/// The local name is checked first so a remote type is never created for a
/// name that cannot be stored.
#[instrument(skip(db, marketplace, definition), fields(short_name = %definition.short_name))]
pub async fn create_hit_type<M>(
    db: &Database,
    marketplace: &M,
    definition: HitTypeDefinition,
) -> Result<HitTypeRow, IngestError>
where
    M: Marketplace + ?Sized,
{
    let hits = db.hits();
    if hits.hit_type_exists(&definition.short_name).await? {
        return Err(IngestError::HitTypeExists(definition.short_name));
    }

    let hit_type_id = marketplace.create_hit_type(&definition.request).await?;
    info!(%hit_type_id, "HIT type created");

    let request = definition.request;
    let row = hits
        .insert_hit_type(&NewHitType {
            short_name: definition.short_name,
            hit_type_id,
            title: request.title,
            keywords: request.keywords,
            description: request.description,
            reward: request.reward,
            assignment_duration_secs: i64::try_from(request.assignment_duration_in_seconds)
                .unwrap_or(i64::MAX),
        })
        .await?;

    Ok(row)
}

pub async fn create_hit_type_from_file<M>(
    db: &Database,
    marketplace: &M,
    path: &Path,
) -> Result<HitTypeRow, IngestError>
where
    M: Marketplace + ?Sized,
{
    let definition: HitTypeDefinition = read_definition(path).await?;
    create_hit_type(db, marketplace, definition).await
}

/// Register a qualification type remotely and record it.
#[instrument(skip(db, marketplace, definition), fields(short_name = %definition.short_name))]
pub async fn create_qualification<M>(
    db: &Database,
    marketplace: &M,
    definition: QualificationDefinition,
) -> Result<QualificationRow, IngestError>
where
    M: Marketplace + ?Sized,
{
    let store = db.qualifications();
    if store.exists(&definition.short_name).await? {
        return Err(IngestError::QualificationExists(definition.short_name));
    }

    let qualification_type_id = marketplace
        .create_qualification_type(&definition.request)
        .await?;
    info!(%qualification_type_id, "Qualification type created");

    let row = store
        .insert(&NewQualification {
            short_name: definition.short_name,
            name: definition.request.name,
            qualification_type_id,
        })
        .await?;

    Ok(row)
}

pub async fn create_qualification_from_file<M>(
    db: &Database,
    marketplace: &M,
    path: &Path,
) -> Result<QualificationRow, IngestError>
where
    M: Marketplace + ?Sized,
{
    let definition: QualificationDefinition = read_definition(path).await?;
    create_qualification(db, marketplace, definition).await
}
