//! Schema commands.

use anyhow::{bail, Result};
use clap::Args;

use crate::output::{print_success, print_warning};

use super::CommandContext;

/// Create tables by running migrations.
#[derive(Debug, Args)]
pub struct InitDbCommand {}

impl InitDbCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let db = ctx.database().await?;
        db.health_check().await?;
        db.run_migrations().await?;
        print_success("Database initialized.");
        Ok(())
    }
}

/// Drop every table, including loaded datasets and posted HIT records.
#[derive(Debug, Args)]
pub struct ClearDbCommand {
    /// Confirm the drop.
    #[arg(long)]
    yes: bool,
}

impl ClearDbCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        if !self.yes {
            bail!("Refusing to drop all tables without --yes");
        }

        let db = ctx.database().await?;
        db.drop_all().await?;
        print_warning("All tables dropped.");
        Ok(())
    }
}
