//! Error display for the CLI.

use std::error::Error as StdError;

use colored::Colorize;
use mtools::config::ConfigError;
use mtools::db::DbError;
use mtools::deploy::DeployError;
use mtools::evaluate::EvaluateError;
use mtools::ingest::IngestError;
use mtools_marketplace::MarketplaceError;

fn hint(message: &str) {
    eprintln!("\n{}", format!("Hint: {message}").yellow());
}

/// Database error behind `cause`, including ones wrapped transparently.
fn as_db_error<'a>(cause: &'a (dyn StdError + 'static)) -> Option<&'a DbError> {
    if let Some(db) = cause.downcast_ref::<DbError>() {
        return Some(db);
    }
    match cause.downcast_ref::<DeployError>() {
        Some(DeployError::Db(db)) => return Some(db),
        Some(_) => return None,
        None => {}
    }
    match cause.downcast_ref::<IngestError>() {
        Some(IngestError::Db(db)) => return Some(db),
        Some(_) => return None,
        None => {}
    }
    match cause.downcast_ref::<EvaluateError>() {
        Some(EvaluateError::Db(db)) => Some(db),
        _ => None,
    }
}

fn as_marketplace_error<'a>(cause: &'a (dyn StdError + 'static)) -> Option<&'a MarketplaceError> {
    if let Some(err) = cause.downcast_ref::<MarketplaceError>() {
        return Some(err);
    }
    match cause.downcast_ref::<IngestError>() {
        Some(IngestError::Marketplace(err)) => return Some(err),
        Some(_) => return None,
        None => {}
    }
    match cause.downcast_ref::<EvaluateError>() {
        Some(EvaluateError::Marketplace(err)) => Some(err),
        _ => None,
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    for cause in err.chain() {
        match as_db_error(cause) {
            Some(DbError::Connect(_)) => {
                hint("Check database.url in your settings or MTOOLS__DATABASE__URL.");
                return;
            }
            Some(DbError::MigrationDirNotFound { .. }) => {
                hint("Run `mtools init-db` from the repository root.");
                return;
            }
            Some(DbError::LockHeld { .. }) => {
                hint("Another deploy is running. Wait for it to finish and retry.");
                return;
            }
            _ => {}
        }

        match as_marketplace_error(cause) {
            Some(MarketplaceError::Network(_)) => {
                hint("Check your network connection and marketplace.endpoint_url.");
                return;
            }
            Some(e) if e.is_retryable() => {
                hint("The marketplace reported a transient fault. Retry the command.");
                return;
            }
            _ => {}
        }

        match cause.downcast_ref::<IngestError>() {
            Some(IngestError::HitTypeExists(_) | IngestError::QualificationExists(_)) => {
                hint("Pick a different ShortName in the definition file.");
                return;
            }
            Some(IngestError::DatasetExists { .. }) => {
                hint("Pass a different --eval-type to load the file again.");
                return;
            }
            _ => {}
        }

        match cause.downcast_ref::<DeployError>() {
            Some(DeployError::HitTypeNotFound(_)) => {
                hint("Register it first with `mtools create-hit-type <file>`.");
                return;
            }
            Some(DeployError::DatasetNotFound(_)) => {
                hint("Load it first with `mtools load-dataset <file>`.");
                return;
            }
            _ => {}
        }

        if cause.downcast_ref::<ConfigError>().is_some() {
            hint("Pass --config <file> or set MTOOLS_CONFIG.");
            return;
        }
    }
}
