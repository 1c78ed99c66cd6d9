//! HIT type commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::output::{print_json, print_success, OutputFormat};

use super::CommandContext;

/// Register a HIT type. The JSON file holds `ShortName` plus the
/// marketplace fields (`Title`, `Description`, `Reward`,
/// `AssignmentDurationInSeconds`, ...).
#[derive(Debug, Args)]
pub struct CreateHitTypeCommand {
    /// Definition file (JSON).
    file: PathBuf,
}

#[derive(Debug, Serialize)]
struct CreatedHitType {
    short_name: String,
    hit_type_id: String,
    title: String,
    reward: String,
}

impl CreateHitTypeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let db = ctx.database().await?;
        let marketplace = ctx.marketplace()?;

        let row = mtools::ingest::create_hit_type_from_file(&db, &marketplace, &self.file)
            .await
            .with_context(|| format!("Failed to create HIT type from {:?}", self.file))?;

        let created = CreatedHitType {
            short_name: row.short_name,
            hit_type_id: row.hit_type_id,
            title: row.title,
            reward: row.reward,
        };

        match ctx.format {
            OutputFormat::Table => print_success(&format!(
                "Created HIT type {} ({}).",
                created.short_name, created.hit_type_id
            )),
            OutputFormat::Json => print_json(&created),
        }
        Ok(())
    }
}
