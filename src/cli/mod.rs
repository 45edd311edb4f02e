//! CLI module for the generative media pipeline
//!
//! Subcommands:
//! - `run`: execute a chain against the configured generators
//! - `estimate`: dry-run a chain and report cost and time estimates
//! - `validate`: check a chain against the model catalog
//! - `models`: inspect the model catalog

pub mod models;
pub mod run;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;

use crate::config::AppConfig;
use crate::domain::chain::Chain;
use crate::domain::model::ModelRegistry;
use crate::infrastructure::loader::{load_catalog, load_chain};
use crate::infrastructure::logging;

/// Generative media pipelines - run image, video and audio model chains
#[derive(Parser, Debug)]
#[command(name = "genai-pipeline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Model catalog file (overrides `catalog.path`)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a chain
    Run(run::RunArgs),

    /// Dry-run a chain and print estimated cost and time
    Estimate(run::EstimateArgs),

    /// Validate a chain against the model catalog
    Validate(validate::ValidateArgs),

    /// Inspect the model catalog
    #[command(subcommand)]
    Models(models::ModelsCommand),
}

/// Shared startup: environment, configuration, logging and the model registry
pub struct AppContext {
    pub config: AppConfig,
    pub registry: Arc<ModelRegistry>,
}

impl AppContext {
    pub fn init(catalog: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let (config, load_error) = config_or_default(AppConfig::load());
        logging::init_logging(&config.logging);

        if let Some(error) = load_error {
            warn!(error = %error, "Failed to load configuration, using defaults");
        }

        let catalog = catalog
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&config.catalog.path));

        let mut registry = ModelRegistry::new();
        load_catalog(&catalog, &mut registry)?;

        Ok(Self {
            config,
            registry: Arc::new(registry),
        })
    }

    pub fn load_chain(&self, path: &Path) -> anyhow::Result<Chain> {
        load_chain(path).with_context(|| format!("Failed to load chain from {}", path.display()))
    }
}

/// Loaded configuration, or the defaults plus the load error to report once logging is up
fn config_or_default(
    loaded: Result<AppConfig, ::config::ConfigError>,
) -> (AppConfig, Option<::config::ConfigError>) {
    match loaded {
        Ok(config) => (config, None),
        Err(error) => (AppConfig::default(), Some(error)),
    }
}

/// Initial input: JSON when it parses as JSON, a plain string otherwise
pub fn parse_input(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
    }
}
