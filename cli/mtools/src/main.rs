//! mtools - CLI for marketplace evaluation campaigns.

use anyhow::Result;
use clap::Parser;

mod commands;
mod error;
mod logging;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
