//! Command line flags and where the database settings come from.

use crate::telemetry::LogFormat;
use clap::{Args, Parser};
use std::path::{Path, PathBuf};
use storeguard_datastore::{DatabaseConfig, DatastoreError};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "todo-service", version, about = "Todo list service on PostgreSQL")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding index.html
    #[arg(long, default_value = "templates")]
    pub templates_dir: PathBuf,

    /// Directory served under /static
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Send datastore error text to clients instead of a generic message
    #[arg(long)]
    pub expose_errors: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Database settings, tried in declaration order.
#[derive(Debug, Default, Args)]
pub struct DatabaseArgs {
    /// JSON file with db_user, db_name, db_host, db_port, db_read_host, db_read_port
    #[arg(long = "db-config", env = "DB_CONFIG_FILE")]
    pub file: Option<PathBuf>,

    /// The same JSON document, inline
    #[arg(long = "db-config-json", env = "DB_CONFIG_JSON", hide_env_values = true)]
    pub json: Option<String>,

    /// postgres:// URL of the primary
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// postgres:// URL of the read replica
    #[arg(long, env = "DATABASE_READ_URL", hide_env_values = true)]
    pub database_read_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Invalid(#[from] DatastoreError),
    #[error("no database configuration: set --db-config, DB_CONFIG_JSON or DATABASE_URL")]
    Missing,
}

impl DatabaseArgs {
    pub fn load(&self) -> Result<DatabaseConfig, ConfigError> {
        if let Some(path) = &self.file {
            return Ok(DatabaseConfig::from_json(&read(path)?)?);
        }
        if let Some(json) = &self.json {
            return Ok(DatabaseConfig::from_json(json)?);
        }
        if let Some(url) = &self.database_url {
            return Ok(DatabaseConfig::from_urls(url, self.database_read_url.as_deref())?);
        }
        Err(ConfigError::Missing)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
