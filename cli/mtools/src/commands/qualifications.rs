//! Qualification commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::output::{print_json, print_success, OutputFormat};

use super::CommandContext;

/// Register a qualification type. The JSON file holds `ShortName` plus
/// the marketplace fields (`Name`, `Description`, ...).
#[derive(Debug, Args)]
pub struct CreateQualificationCommand {
    /// Definition file (JSON).
    file: PathBuf,
}

#[derive(Debug, Serialize)]
struct CreatedQualification {
    short_name: String,
    name: String,
    qualification_type_id: String,
}

impl CreateQualificationCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let db = ctx.database().await?;
        let marketplace = ctx.marketplace()?;

        let row = mtools::ingest::create_qualification_from_file(&db, &marketplace, &self.file)
            .await
            .with_context(|| format!("Failed to create qualification from {:?}", self.file))?;

        let created = CreatedQualification {
            short_name: row.short_name,
            name: row.name,
            qualification_type_id: row.qualification_type_id,
        };

        match ctx.format {
            OutputFormat::Table => print_success(&format!(
                "Created qualification {} ({}).",
                created.short_name, created.qualification_type_id
            )),
            OutputFormat::Json => print_json(&created),
        }
        Ok(())
    }
}
