//! Scoring submitted work against the stored answer keys.

use std::collections::{BTreeMap, HashMap};

use mtools_marketplace::{Assignment, AssignmentStatus, Marketplace, MarketplaceError};
use mtools_question_form::{parse_answers, Answer, FormError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::db::{AnswerKey, Database, DbError};

/// Feedback sent with rejected uniform assignments.
pub const UNIFORM_FEEDBACK: &str = "We detected no variability in your answers.";

/// Statuses scored on every page of every HIT.
pub const SCORED_STATUSES: [AssignmentStatus; 2] =
    [AssignmentStatus::Submitted, AssignmentStatus::Approved];

#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("HIT type {0:?} not found")]
    HitTypeNotFound(String),

    #[error("assignment {assignment_id} has unreadable answers: {source}")]
    Answers {
        assignment_id: String,
        #[source]
        source: FormError,
    },

    #[error("assignment {assignment_id} answers unknown question {question_key}")]
    UnknownQuestion {
        assignment_id: String,
        question_key: i64,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub correct: u64,
    pub total: u64,
}

impl Tally {
    fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Assignment left out of scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAssignment {
    pub assignment_id: String,
    pub worker_id: String,
    pub rejected: bool,
}

/// Correctness tallies by dataset, worker and question.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    pub by_dataset: BTreeMap<String, Tally>,
    pub by_worker: BTreeMap<String, Tally>,
    pub by_question: BTreeMap<i64, Tally>,
    pub scored_assignments: usize,
    pub skipped: Vec<SkippedAssignment>,
}

impl Scoreboard {
    /// Score one assignment's answers.
    ///
    /// Every answered question must be present in `keys`.
    pub fn score(
        &mut self,
        assignment: &Assignment,
        answers: &[Answer],
        keys: &HashMap<i64, AnswerKey>,
    ) -> Result<(), EvaluateError> {
        // Validate first so a bad assignment leaves no partial tallies.
        let resolved = answers
            .iter()
            .map(|answer| {
                keys.get(&answer.question_key)
                    .map(|key| (answer, key))
                    .ok_or_else(|| EvaluateError::UnknownQuestion {
                        assignment_id: assignment.assignment_id.clone(),
                        question_key: answer.question_key,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (answer, key) in resolved {
            let correct = answer.selection == key.answer;
            self.by_dataset
                .entry(key.dataset_label())
                .or_default()
                .record(correct);
            self.by_worker
                .entry(assignment.worker_id.clone())
                .or_default()
                .record(correct);
            self.by_question
                .entry(answer.question_key)
                .or_default()
                .record(correct);
        }

        self.scored_assignments += 1;
        Ok(())
    }

    pub fn skip(&mut self, assignment: &Assignment, rejected: bool) {
        self.skipped.push(SkippedAssignment {
            assignment_id: assignment.assignment_id.clone(),
            worker_id: assignment.worker_id.clone(),
            rejected,
        });
    }
}

/// True when every answer picks the same selection.
///
/// An assignment with no answers counts as uniform: it carries no signal.
pub fn is_uniform(answers: &[Answer]) -> bool {
    match answers.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|a| a.selection == first.selection),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions {
    /// Reject submitted uniform assignments instead of only skipping them.
    pub reject_uniform: bool,
}

/// Score every Submitted or Approved assignment of a HIT type's HITs.
#[instrument(skip(db, marketplace, options))]
pub async fn evaluate<M>(
    db: &Database,
    marketplace: &M,
    hit_type: &str,
    options: EvaluateOptions,
) -> Result<Scoreboard, EvaluateError>
where
    M: Marketplace + ?Sized,
{
    let hit_type_row = db
        .hits()
        .find_hit_type(hit_type)
        .await?
        .ok_or_else(|| EvaluateError::HitTypeNotFound(hit_type.to_string()))?;

    let hit_ids = db.hits().hit_ids_for_type(hit_type_row.key).await?;
    info!(hits = hit_ids.len(), "Evaluating HITs");

    let questions = db.questions();
    let mut board = Scoreboard::default();

    for hit_id in &hit_ids {
        let assignments = marketplace
            .list_assignments_for_hit(hit_id, &SCORED_STATUSES)
            .await?;
        debug!(%hit_id, assignments = assignments.len(), "Fetched assignments");

        for assignment in &assignments {
            let answers =
                parse_answers(&assignment.answer).map_err(|source| EvaluateError::Answers {
                    assignment_id: assignment.assignment_id.clone(),
                    source,
                })?;

            if is_uniform(&answers) {
                let reject =
                    options.reject_uniform && assignment.status == AssignmentStatus::Submitted;
                if reject {
                    marketplace
                        .reject_assignment(&assignment.assignment_id, UNIFORM_FEEDBACK)
                        .await?;
                }
                warn!(
                    assignment_id = %assignment.assignment_id,
                    worker_id = %assignment.worker_id,
                    rejected = reject,
                    "Skipping assignment with uniform answers"
                );
                board.skip(assignment, reject);
                continue;
            }

            let question_keys: Vec<i64> = answers.iter().map(|a| a.question_key).collect();
            let keys = questions.answer_keys(&question_keys).await?;
            board.score(assignment, &answers, &keys)?;
        }
    }

    info!(
        scored = board.scored_assignments,
        skipped = board.skipped.len(),
        "Evaluation complete"
    );
    Ok(board)
}
