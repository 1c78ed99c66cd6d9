//! Settings loading.
//!
//! Layers, lowest first: built-in defaults, the settings file, then
//! `MTOOLS__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use mtools_marketplace::endpoint_for_region;
use serde::Deserialize;
use thiserror::Error;

use crate::db::DbConfig;

/// Settings file name looked up in the working and config directories.
pub const CONFIG_FILE: &str = "mtools.toml";

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "MTOOLS_CONFIG";

const ENV_PREFIX: &str = "MTOOLS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("invalid settings: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub marketplace: MarketplaceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub deploy: DeploySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let db = DbConfig::default();
        Self {
            url: db.database_url,
            max_connections: db.max_connections,
            min_connections: db.min_connections,
            acquire_timeout_secs: db.acquire_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketplaceSettings {
    pub region_name: String,
    /// Overrides the endpoint derived from the region.
    pub endpoint_url: Option<String>,
    /// Use the sandbox endpoint of the region.
    pub sandbox: bool,
    pub request_timeout_secs: u64,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            region_name: "us-east-1".to_string(),
            endpoint_url: None,
            sandbox: false,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub logfile: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            logfile: None,
            json: false,
        }
    }
}

/// Parameters applied to every posted HIT.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    pub max_assignments: u32,
    pub lifetime_secs: u64,
    pub overview_title: String,
    pub overview_text: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            max_assignments: 3,
            lifetime_secs: 7 * 24 * 60 * 60,
            overview_title: "Which sentence is more natural?".to_string(),
            overview_text: "For each question, choose the sentence that sounds more natural to you."
                .to_string(),
        }
    }
}

impl Settings {
    /// Load settings, reading the file at `explicit` when given.
    ///
    /// Without an explicit path the file is looked up via [`CONFIG_ENV`],
    /// then `./mtools.toml`, then the platform config directory. A missing
    /// implicit file is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match locate(explicit)? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Reading settings file");
                builder = builder.add_source(File::from(path).required(true));
            }
            None => tracing::debug!("No settings file found, using defaults"),
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            acquire_timeout: Duration::from_secs(self.database.acquire_timeout_secs),
        }
    }

    /// Requester endpoint, explicit or derived from the region.
    pub fn marketplace_endpoint(&self) -> String {
        self.marketplace
            .endpoint_url
            .clone()
            .unwrap_or_else(|| {
                endpoint_for_region(&self.marketplace.region_name, self.marketplace.sandbox)
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.marketplace.request_timeout_secs)
    }
}

fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf()).map(Some);
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return existing(PathBuf::from(path)).map(Some);
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(ProjectDirs::from("org", "mtools", "mtools")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .filter(|path| path.is_file()))
}

fn existing(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(ConfigError::NotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.deploy.max_assignments, 3);
        assert_eq!(
            settings.marketplace_endpoint(),
            "https://mturk-requester.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgres://mtools:secret@db/mtools"
max_connections = 2

[marketplace]
region_name = "eu-west-1"
sandbox = true

[deploy]
max_assignments = 5
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.database.url, "postgres://mtools:secret@db/mtools");
        assert_eq!(settings.database.max_connections, 2);
        assert_eq!(settings.database.min_connections, 1);
        assert_eq!(settings.deploy.max_assignments, 5);
        assert_eq!(
            settings.marketplace_endpoint(),
            "https://mturk-requester-sandbox.eu-west-1.amazonaws.com"
        );
        assert_eq!(settings.db_config().max_connections, 2);
    }

    #[test]
    fn test_endpoint_override() {
        let mut settings = Settings::default();
        settings.marketplace.endpoint_url = Some("http://localhost:9000".into());
        assert_eq!(settings.marketplace_endpoint(), "http://localhost:9000");
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/mtools.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
