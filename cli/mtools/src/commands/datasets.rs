//! Dataset commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::output::{print_json, print_success, OutputFormat};

use super::CommandContext;

/// Load a dataset file. Each line is a JSON object with `sentence_good`,
/// `sentence_bad` and optional `left_context`/`right_context`.
#[derive(Debug, Args)]
pub struct LoadDatasetCommand {
    /// Dataset file (JSON lines).
    file: PathBuf,

    /// Evaluation the dataset belongs to.
    #[arg(long, default_value = "default")]
    eval_type: String,
}

#[derive(Debug, Serialize)]
struct LoadedDataset {
    key: i64,
    filename: String,
    eval_type: String,
    instances: usize,
    checksum: String,
}

impl LoadDatasetCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let db = ctx.database().await?;
        let (dataset, instances) = mtools::ingest::load_dataset(&db, &self.file, &self.eval_type)
            .await
            .with_context(|| format!("Failed to load dataset {:?}", self.file))?;

        let loaded = LoadedDataset {
            key: dataset.key,
            filename: dataset.filename,
            eval_type: dataset.eval_type,
            instances,
            checksum: dataset.checksum,
        };

        match ctx.format {
            OutputFormat::Table => print_success(&format!(
                "Loaded {} instances from {} ({}).",
                loaded.instances, loaded.filename, loaded.eval_type
            )),
            OutputFormat::Json => print_json(&loaded),
        }
        Ok(())
    }
}
