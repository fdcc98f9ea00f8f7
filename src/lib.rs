pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

pub use crate::core::config;

use crate::core::QuoteResolver;
use anyhow::Result;
use config::AppConfig;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Quote {
        source: String,
        identifier: String,
        currency: Option<String>,
        json: bool,
    },
    Isin {
        isin: String,
        hint: Option<String>,
        strict_funds: bool,
        json: bool,
    },
    Batch {
        requests: Vec<String>,
        currency: Option<String>,
        json: bool,
    },
}

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    match config_path {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    }
}

/// Resolver wired with every known source, sharing the configured cache backend.
pub fn build_resolver(config: &AppConfig) -> Result<QuoteResolver> {
    let cache = store::open_collection(config);
    let sources = providers::default_sources(config, Arc::clone(&cache))?;
    Ok(QuoteResolver::new(cache)
        .with_sources(sources)
        .with_default_currency(&config.default_currency))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("quotefinder starting...");

    let config = load_config(config_path)?;
    debug!("Loaded config: {config:#?}");

    let resolver = build_resolver(&config)?;

    match command {
        AppCommand::Quote {
            source,
            identifier,
            currency,
            json,
        } => {
            cli::quote::run_quote(&resolver, &source, &identifier, currency.as_deref(), json)
                .await
        }
        AppCommand::Isin {
            isin,
            hint,
            strict_funds,
            json,
        } => cli::quote::run_isin(&resolver, &isin, hint.as_deref(), strict_funds, json).await,
        AppCommand::Batch {
            requests,
            currency,
            json,
        } => cli::quote::run_batch(&resolver, &requests, currency.as_deref(), json).await,
    }
}
