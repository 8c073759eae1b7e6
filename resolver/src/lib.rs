pub mod cache_key;
pub mod config;
pub mod config_cache;
pub mod configuration;
pub mod credentials;
pub mod fetcher;
pub mod metrics_defs;
pub mod resolver;
pub mod result;

#[cfg(test)]
mod testutils;

use config::{Config, ValidationError};
use config_cache::CacheError;
use fetcher::{HttpFetcher, TransportError};
use std::sync::Arc;

pub use configuration::Configuration;
pub use credentials::Credentials;
pub use resolver::Resolver;
pub use result::{Resolution, ResolutionResult, ResolveError};

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("invalid resolver config: {0}")]
    Validation(#[from] ValidationError),
    #[error("could not create configuration cache: {0}")]
    Cache(#[from] CacheError),
    #[error("could not create HTTP fetcher: {0}")]
    Fetcher(#[from] TransportError),
}

/// Builds a resolver backed by the HTTP fetcher and the configured cache.
pub fn build_resolver(config: &Config) -> Result<Resolver, BuildError> {
    config.validate()?;

    let cache = config_cache::from_config(&config.cache)?;
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);

    Ok(Resolver::new(fetcher, cache))
}
