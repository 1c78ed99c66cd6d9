//! Posting HITs built from unasked dataset instances.
//!
//! A deploy allocates `num_hits * questions_per_hit` slots across the
//! requested datasets, then posts one HIT per batch. Each batch is claimed
//! in its own transaction, and the transaction only commits once the
//! marketplace has accepted the HIT, so a failed post leaves its instances
//! unasked. Deploys are serialized through a database advisory lock.

use std::collections::HashSet;

use mtools_allocate::{AllocateError, AllocationRequest, Allocator, PassMode, PoolReport};
use mtools_marketplace::{CreateHitWithHitTypeRequest, Marketplace, MarketplaceError};
use mtools_question_form::{FormError, QuestionForm};
use rand::Rng;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::DeploySettings;
use crate::db::{Database, DatasetPool, DbError, HitStore, HitTypeRow, Instance, NewQuestion};

/// Advisory lock key held for the duration of a deploy.
pub const DEPLOY_LOCK_KEY: i64 = 0x6d74_6f6f_6c73;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("HIT type {0:?} not found")]
    HitTypeNotFound(String),

    #[error("dataset {0:?} not found")]
    DatasetNotFound(String),

    #[error("dataset {filename:?} is loaded under several eval types ({}); pass --eval-type", eval_types.join(", "))]
    AmbiguousDataset {
        filename: String,
        eval_types: Vec<String>,
    },

    #[error("dataset {0:?} listed more than once")]
    DuplicateDataset(String),

    #[error(transparent)]
    Allocate(#[from] AllocateError),

    #[error("failed to build question form: {0}")]
    Form(#[from] FormError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("marketplace rejected HIT after {posted} were posted: {source}")]
    Marketplace {
        posted: usize,
        #[source]
        source: MarketplaceError,
    },
}

/// What to deploy.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub hit_type: String,
    /// Dataset filenames, in allocation order.
    pub datasets: Vec<String>,
    pub eval_type: Option<String>,
    pub num_hits: usize,
    pub questions_per_hit: usize,
    pub mode: PassMode,
}

/// A HIT accepted by the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedHit {
    pub hit_key: i64,
    pub hit_id: String,
    pub questions: usize,
}

#[derive(Debug, Clone)]
pub struct DeployReport {
    pub requested_hits: usize,
    pub requested_questions: usize,
    pub posted: Vec<PostedHit>,
    /// Questions no dataset could supply.
    pub shortfall: usize,
    pub pools: Vec<PoolReport>,
}

impl DeployReport {
    pub fn posted_questions(&self) -> usize {
        self.posted.iter().map(|h| h.questions).sum()
    }

    /// True when fewer or shorter HITs were posted than requested.
    pub fn is_short(&self) -> bool {
        self.shortfall > 0
    }
}

/// Posts HITs for a HIT type.
pub struct Deployer<'a, M: ?Sized> {
    db: &'a Database,
    marketplace: &'a M,
    settings: &'a DeploySettings,
}

impl<'a, M> Deployer<'a, M>
where
    M: Marketplace + ?Sized,
{
    pub fn new(db: &'a Database, marketplace: &'a M, settings: &'a DeploySettings) -> Self {
        Self {
            db,
            marketplace,
            settings,
        }
    }

    #[instrument(
        skip_all,
        fields(
            hit_type = %request.hit_type,
            num_hits = request.num_hits,
            questions_per_hit = request.questions_per_hit,
            mode = %request.mode,
        )
    )]
    pub async fn deploy<R>(&self, request: &DeployRequest, rng: &mut R) -> Result<DeployReport, DeployError>
    where
        R: Rng + ?Sized,
    {
        let hit_type = self
            .db
            .hits()
            .find_hit_type(&request.hit_type)
            .await?
            .ok_or_else(|| DeployError::HitTypeNotFound(request.hit_type.clone()))?;

        let pools = self.resolve_pools(request).await?;

        let lock = self.db.try_lock(DEPLOY_LOCK_KEY).await?;
        let result = self.post_all(&hit_type, &pools, request, rng).await;
        if let Err(e) = lock.release().await {
            warn!(error = %e, "Failed to release deploy lock");
        }

        result
    }

    async fn resolve_pools(&self, request: &DeployRequest) -> Result<Vec<DatasetPool>, DeployError> {
        let store = self.db.datasets();
        let mut seen = HashSet::new();
        let mut pools = Vec::with_capacity(request.datasets.len());

        for name in &request.datasets {
            if !seen.insert(name.as_str()) {
                return Err(DeployError::DuplicateDataset(name.clone()));
            }

            let mut found = store
                .find_by_filename(name, request.eval_type.as_deref())
                .await?;

            let dataset = match found.len() {
                0 => return Err(DeployError::DatasetNotFound(name.clone())),
                1 => found.remove(0),
                _ => {
                    return Err(DeployError::AmbiguousDataset {
                        filename: name.clone(),
                        eval_types: found.into_iter().map(|d| d.eval_type).collect(),
                    })
                }
            };
            pools.push(store.pool(dataset));
        }

        Ok(pools)
    }

    async fn post_all<R>(
        &self,
        hit_type: &HitTypeRow,
        pools: &[DatasetPool],
        request: &DeployRequest,
        rng: &mut R,
    ) -> Result<DeployReport, DeployError>
    where
        R: Rng + ?Sized,
    {
        let total = request.num_hits.saturating_mul(request.questions_per_hit);
        let allocation = Allocator::new(request.mode)
            .allocate(
                &AllocationRequest::new(total, request.questions_per_hit, pools),
                rng,
            )
            .await?;

        if allocation.shortfall > 0 {
            warn!(
                shortfall = allocation.shortfall,
                available = allocation.allocated(),
                batches = allocation.batches.len(),
                "Not enough unasked instances, posting fewer questions than requested"
            );
        }

        let mut posted = Vec::with_capacity(allocation.batches.len());
        for batch in &allocation.batches {
            let hit = self.post_batch(hit_type, batch, posted.len(), rng).await?;
            posted.push(hit);
        }

        info!(
            posted = posted.len(),
            shortfall = allocation.shortfall,
            "Deploy complete"
        );

        Ok(DeployReport {
            requested_hits: request.num_hits,
            requested_questions: total,
            posted,
            shortfall: allocation.shortfall,
            pools: allocation.pools,
        })
    }

    async fn post_batch<R>(
        &self,
        hit_type: &HitTypeRow,
        batch: &[Instance],
        posted_so_far: usize,
        rng: &mut R,
    ) -> Result<PostedHit, DeployError>
    where
        R: Rng + ?Sized,
    {
        let questions: Vec<NewQuestion> = batch.iter().map(|i| build_question(i, rng)).collect();

        let mut tx = self.db.pool().begin().await.map_err(DbError::Query)?;
        let (hit_key, question_keys) = HitStore::claim(&mut tx, hit_type.key, &questions).await?;

        let request = CreateHitWithHitTypeRequest {
            hit_type_id: hit_type.hit_type_id.clone(),
            max_assignments: self.settings.max_assignments,
            lifetime_in_seconds: self.settings.lifetime_secs,
            question: build_form(self.settings, &question_keys, &questions)?,
            requester_annotation: None,
            unique_request_token: Some(Uuid::new_v4().to_string()),
        };

        let hit_id = self
            .marketplace
            .create_hit_with_hit_type(&request)
            .await
            .map_err(|source| DeployError::Marketplace {
                posted: posted_so_far,
                source,
            })?;

        HitStore::set_hit_id(&mut tx, hit_key, &hit_id).await?;
        tx.commit().await.map_err(|e| {
            error!(%hit_id, "HIT was posted but could not be recorded");
            DbError::Query(e)
        })?;

        info!(%hit_id, hit_key, questions = questions.len(), "HIT posted");
        Ok(PostedHit {
            hit_key,
            hit_id,
            questions: questions.len(),
        })
    }
}

/// Join a sentence with the instance's surrounding context.
fn with_context(instance: &Instance, sentence: &str) -> String {
    [
        instance.left_context.as_deref(),
        Some(sentence),
        instance.right_context.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Question for an instance with its two sentences in random order.
pub fn build_question<R: Rng + ?Sized>(instance: &Instance, rng: &mut R) -> NewQuestion {
    let good = with_context(instance, &instance.sentence_good);
    let bad = with_context(instance, &instance.sentence_bad);

    // Letters follow choice order in the form.
    if rng.random_bool(0.5) {
        NewQuestion {
            instance_key: instance.key,
            answer: "a".to_string(),
            choice_a: good,
            choice_b: bad,
        }
    } else {
        NewQuestion {
            instance_key: instance.key,
            answer: "b".to_string(),
            choice_a: bad,
            choice_b: good,
        }
    }
}

/// QuestionForm XML for claimed questions, identified by their storage keys.
pub fn build_form(
    settings: &DeploySettings,
    question_keys: &[i64],
    questions: &[NewQuestion],
) -> Result<String, FormError> {
    let mut form = QuestionForm::new();
    form.add_overview(&settings.overview_title, &settings.overview_text);

    for (key, question) in question_keys.iter().zip(questions) {
        form.add_multiple_choice_question(
            key.to_string(),
            [question.choice_a.as_str(), question.choice_b.as_str()],
        )?;
    }

    form.to_xml()
}
