//! Evaluate command.

use anyhow::{Context, Result};
use clap::Args;
use mtools::evaluate::{evaluate, EvaluateOptions, Scoreboard, SkippedAssignment, Tally};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{percent, print_heading, print_info, print_json, print_output, OutputFormat};

use super::CommandContext;

/// Score Submitted and Approved assignments of a HIT type against the
/// stored answers.
#[derive(Debug, Args)]
pub struct EvaluateCommand {
    /// HIT type short name.
    hit_type: String,

    /// Reject submitted assignments whose answers are all the same.
    #[arg(long)]
    reject_uniform: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct AccuracyRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Correct")]
    correct: u64,
    #[tabled(rename = "Total")]
    total: u64,
    #[tabled(rename = "Accuracy")]
    accuracy: String,
}

impl AccuracyRow {
    fn new(name: impl ToString, tally: &Tally) -> Self {
        Self {
            name: name.to_string(),
            correct: tally.correct,
            total: tally.total,
            accuracy: percent(tally.accuracy()),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct SkippedRow {
    #[tabled(rename = "Assignment")]
    assignment_id: String,
    #[tabled(rename = "Worker")]
    worker_id: String,
    #[tabled(rename = "Rejected")]
    rejected: bool,
}

impl From<&SkippedAssignment> for SkippedRow {
    fn from(skipped: &SkippedAssignment) -> Self {
        Self {
            assignment_id: skipped.assignment_id.clone(),
            worker_id: skipped.worker_id.clone(),
            rejected: skipped.rejected,
        }
    }
}

#[derive(Debug, Serialize)]
struct EvaluationSummary {
    scored_assignments: usize,
    datasets: Vec<AccuracyRow>,
    workers: Vec<AccuracyRow>,
    questions: Vec<AccuracyRow>,
    skipped: Vec<SkippedRow>,
}

impl From<&Scoreboard> for EvaluationSummary {
    fn from(board: &Scoreboard) -> Self {
        Self {
            scored_assignments: board.scored_assignments,
            datasets: board
                .by_dataset
                .iter()
                .map(|(name, tally)| AccuracyRow::new(name, tally))
                .collect(),
            workers: board
                .by_worker
                .iter()
                .map(|(name, tally)| AccuracyRow::new(name, tally))
                .collect(),
            questions: board
                .by_question
                .iter()
                .map(|(key, tally)| AccuracyRow::new(key, tally))
                .collect(),
            skipped: board.skipped.iter().map(SkippedRow::from).collect(),
        }
    }
}

impl EvaluateCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let db = ctx.database().await?;
        let marketplace = ctx.marketplace()?;

        let options = EvaluateOptions {
            reject_uniform: self.reject_uniform,
        };
        let board = evaluate(&db, &marketplace, &self.hit_type, options)
            .await
            .with_context(|| format!("Failed to evaluate HIT type {:?}", self.hit_type))?;

        let summary = EvaluationSummary::from(&board);

        match ctx.format {
            OutputFormat::Json => print_json(&summary),
            OutputFormat::Table => {
                print_heading("Accuracy by dataset", ctx.format);
                print_output(&summary.datasets, ctx.format);
                print_heading("Accuracy by worker", ctx.format);
                print_output(&summary.workers, ctx.format);
                print_heading("Accuracy by question", ctx.format);
                print_output(&summary.questions, ctx.format);

                if !summary.skipped.is_empty() {
                    print_heading("Skipped (uniform answers)", ctx.format);
                    print_output(&summary.skipped, ctx.format);
                }

                print_info(&format!(
                    "Scored {} assignments, skipped {}.",
                    summary.scored_assignments,
                    summary.skipped.len()
                ));
            }
        }
        Ok(())
    }
}
