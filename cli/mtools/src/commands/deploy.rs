//! Deploy command.

use anyhow::{Context, Result};
use clap::Args;
use mtools::deploy::{DeployReport, DeployRequest, Deployer};
use mtools_allocate::PassMode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_heading, print_json, print_output, print_success, print_warning, OutputFormat};

use super::CommandContext;

/// Post HITs of a HIT type, drawing questions from the datasets in order.
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Number of HITs to post.
    #[arg(short = 'n', long = "num-hits", value_parser = clap::value_parser!(u32).range(1..))]
    num_hits: u32,

    /// Questions per HIT.
    #[arg(short = 'q', long = "questions-per-hit", value_parser = clap::value_parser!(u32).range(1..))]
    questions_per_hit: u32,

    /// HIT type short name.
    hit_type: String,

    /// Dataset files, as loaded.
    #[arg(required = true)]
    datasets: Vec<String>,

    /// Narrow dataset lookup to one eval type.
    #[arg(long)]
    eval_type: Option<String>,

    /// Pool pass mode (single-pass or rebalance).
    #[arg(long, default_value = "single-pass")]
    mode: PassMode,

    /// Seed for batch and choice order.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Serialize, Tabled)]
struct PostedRow {
    #[tabled(rename = "HIT ID")]
    hit_id: String,
    #[tabled(rename = "Questions")]
    questions: usize,
}

#[derive(Debug, Serialize, Tabled)]
struct PoolRow {
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "Asked")]
    asked: usize,
    #[tabled(rename = "Received")]
    received: usize,
}

#[derive(Debug, Serialize)]
struct DeploySummary {
    requested_hits: usize,
    requested_questions: usize,
    posted_hits: usize,
    posted_questions: usize,
    shortfall: usize,
    hits: Vec<PostedRow>,
    pools: Vec<PoolRow>,
}

impl From<DeployReport> for DeploySummary {
    fn from(report: DeployReport) -> Self {
        Self {
            requested_hits: report.requested_hits,
            requested_questions: report.requested_questions,
            posted_hits: report.posted.len(),
            posted_questions: report.posted_questions(),
            shortfall: report.shortfall,
            hits: report
                .posted
                .into_iter()
                .map(|h| PostedRow {
                    hit_id: h.hit_id,
                    questions: h.questions,
                })
                .collect(),
            pools: report
                .pools
                .into_iter()
                .map(|p| PoolRow {
                    dataset: p.pool,
                    asked: p.asked,
                    received: p.received,
                })
                .collect(),
        }
    }
}

/// Warning shown when fewer questions were available than requested.
fn shortfall_warning(summary: &DeploySummary) -> Option<String> {
    if summary.shortfall == 0 {
        return None;
    }
    Some(format!(
        "Only {} of {} requested questions were available ({} HITs posted, {} requested).",
        summary.posted_questions,
        summary.requested_questions,
        summary.posted_hits,
        summary.requested_hits,
    ))
}

impl DeployCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let db = ctx.database().await?;
        let marketplace = ctx.marketplace()?;

        let request = DeployRequest {
            hit_type: self.hit_type,
            datasets: self.datasets,
            eval_type: self.eval_type,
            num_hits: self.num_hits as usize,
            questions_per_hit: self.questions_per_hit as usize,
            mode: self.mode,
        };

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let report = Deployer::new(&db, &marketplace, &ctx.settings.deploy)
            .deploy(&request, &mut rng)
            .await
            .context("Deploy failed")?;

        let summary = DeploySummary::from(report);

        match ctx.format {
            OutputFormat::Json => print_json(&summary),
            OutputFormat::Table => {
                if let Some(warning) = shortfall_warning(&summary) {
                    print_warning(&warning);
                }

                print_heading("Datasets", ctx.format);
                print_output(&summary.pools, ctx.format);
                print_heading("HITs", ctx.format);
                print_output(&summary.hits, ctx.format);

                print_success(&format!(
                    "Posted {} HITs with {} questions.",
                    summary.posted_hits, summary.posted_questions
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mtools::deploy::PostedHit;
    use mtools_allocate::PoolReport;

    use super::*;

    fn report(sizes: &[usize], requested_hits: usize, per_hit: usize, shortfall: usize) -> DeployReport {
        DeployReport {
            requested_hits,
            requested_questions: requested_hits * per_hit,
            posted: sizes
                .iter()
                .enumerate()
                .map(|(i, &questions)| PostedHit {
                    hit_key: i as i64 + 1,
                    hit_id: format!("H{}", i + 1),
                    questions,
                })
                .collect(),
            shortfall,
            pools: vec![PoolReport {
                pool: "agreement.jsonl".to_string(),
                asked: requested_hits * per_hit,
                received: sizes.iter().sum(),
            }],
        }
    }

    #[test]
    fn test_shortfall_warning_counts() {
        let summary = DeploySummary::from(report(&[3, 3, 2], 3, 3, 1));

        assert_eq!(summary.posted_questions, 8);
        assert_eq!(
            shortfall_warning(&summary).as_deref(),
            Some("Only 8 of 9 requested questions were available (3 HITs posted, 3 requested).")
        );
    }

    #[test]
    fn test_shortfall_warning_with_nothing_posted() {
        let summary = DeploySummary::from(report(&[], 2, 5, 10));

        let warning = shortfall_warning(&summary).unwrap();
        assert!(warning.starts_with("Only 0 of 10"));
        assert!(warning.contains("0 HITs posted, 2 requested"));
    }

    #[test]
    fn test_no_warning_when_fulfilled() {
        let summary = DeploySummary::from(report(&[3, 3], 2, 3, 0));
        assert!(shortfall_warning(&summary).is_none());
    }
}
