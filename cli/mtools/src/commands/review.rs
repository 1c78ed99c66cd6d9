//! Review commands.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::output::{print_json, print_success, OutputFormat};

use super::CommandContext;

/// Approve every Submitted assignment of every reviewable HIT.
#[derive(Debug, Args)]
pub struct AcceptAllCommand {}

#[derive(Debug, Serialize)]
struct AcceptSummary {
    reviewable_hits: usize,
    approved: Vec<String>,
}

impl AcceptAllCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let marketplace = ctx.marketplace()?;
        let report = mtools::review::accept_all(&marketplace)
            .await
            .context("Failed to approve assignments")?;

        match ctx.format {
            OutputFormat::Table => print_success(&format!(
                "Approved {} assignments across {} reviewable HITs.",
                report.approved.len(),
                report.reviewable_hits
            )),
            OutputFormat::Json => print_json(&AcceptSummary {
                reviewable_hits: report.reviewable_hits,
                approved: report.approved,
            }),
        }
        Ok(())
    }
}
