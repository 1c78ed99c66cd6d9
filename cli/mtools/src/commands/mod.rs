//! CLI commands.

mod database;
mod datasets;
mod deploy;
mod evaluate;
mod hit_types;
mod qualifications;
mod review;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mtools::config::Settings;
use mtools::db::Database;
use mtools_marketplace::HttpMarketplace;

use crate::output::OutputFormat;

/// mtools - Run sentence-pair evaluation campaigns on the task marketplace.
#[derive(Debug, Parser)]
#[command(name = "mtools")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Log at debug level.
    #[arg(long, global = true)]
    debug: bool,

    /// Settings file (defaults to $MTOOLS_CONFIG, ./mtools.toml, then the
    /// user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the database schema.
    InitDb(database::InitDbCommand),

    /// Drop every table.
    ClearDb(database::ClearDbCommand),

    /// Load a JSON-lines dataset of sentence pairs.
    LoadDataset(datasets::LoadDatasetCommand),

    /// Register a HIT type from a JSON definition.
    CreateHitType(hit_types::CreateHitTypeCommand),

    /// Register a qualification type from a JSON definition.
    CreateQualification(qualifications::CreateQualificationCommand),

    /// Post HITs built from unasked dataset instances.
    Deploy(deploy::DeployCommand),

    /// Score submitted assignments of a HIT type.
    Evaluate(evaluate::EvaluateCommand),

    /// Approve every submitted assignment of every reviewable HIT.
    AcceptAll(review::AcceptAllCommand),
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref()).context("Failed to load settings")?;
        crate::logging::init(&settings.logging, self.debug)?;

        let ctx = CommandContext {
            settings,
            format: self.format,
        };

        match self.command {
            Commands::InitDb(cmd) => cmd.run(ctx).await,
            Commands::ClearDb(cmd) => cmd.run(ctx).await,
            Commands::LoadDataset(cmd) => cmd.run(ctx).await,
            Commands::CreateHitType(cmd) => cmd.run(ctx).await,
            Commands::CreateQualification(cmd) => cmd.run(ctx).await,
            Commands::Deploy(cmd) => cmd.run(ctx).await,
            Commands::Evaluate(cmd) => cmd.run(ctx).await,
            Commands::AcceptAll(cmd) => cmd.run(ctx).await,
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub settings: Settings,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Connect to the configured database.
    pub async fn database(&self) -> Result<Database> {
        let db = Database::connect(&self.settings.db_config()).await?;
        Ok(db)
    }

    /// Client for the configured marketplace endpoint.
    pub fn marketplace(&self) -> Result<HttpMarketplace> {
        let endpoint = self.settings.marketplace_endpoint();
        tracing::debug!(%endpoint, "Using marketplace endpoint");
        let client = HttpMarketplace::new(endpoint, self.settings.request_timeout())?;
        Ok(client)
    }
}
