use crate::config_cache::CacheError;
use crate::configuration::{Configuration, ParseError};
use crate::fetcher::TransportError;

/// Errors after which no configuration is available.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("{reason}")]
    InvalidCredentials { reason: String },

    #[error("Request for configuration has failed: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Parse(#[from] ParseError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigurationSource {
    Cache,
    Network,
}

/// A configuration that was obtained, together with any cache failures that
/// happened along the way. Cache failures never prevent resolution.
#[derive(Debug)]
pub struct Resolution {
    pub configuration: Configuration,
    pub source: ConfigurationSource,
    /// Reading the cache failed and the configuration was fetched instead.
    pub load_from_cache_error: Option<CacheError>,
    /// The fetched configuration could not be written to the cache.
    pub save_to_cache_error: Option<CacheError>,
}

impl Resolution {
    pub(crate) fn from_cache(configuration: Configuration) -> Self {
        Resolution {
            configuration,
            source: ConfigurationSource::Cache,
            load_from_cache_error: None,
            save_to_cache_error: None,
        }
    }

    pub fn has_cache_errors(&self) -> bool {
        self.load_from_cache_error.is_some() || self.save_to_cache_error.is_some()
    }
}

/// Outcome of a single resolution: either a configuration, or the fatal error
/// that prevented obtaining one.
#[derive(Debug)]
pub enum ResolutionResult {
    Resolved(Resolution),
    Failed(ResolveError),
}

impl ResolutionResult {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionResult::Resolved(_))
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        match self {
            ResolutionResult::Resolved(resolution) => Some(&resolution.configuration),
            ResolutionResult::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ResolveError> {
        match self {
            ResolutionResult::Resolved(_) => None,
            ResolutionResult::Failed(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<Resolution, ResolveError> {
        match self {
            ResolutionResult::Resolved(resolution) => Ok(resolution),
            ResolutionResult::Failed(err) => Err(err),
        }
    }
}

impl From<Result<Resolution, ResolveError>> for ResolutionResult {
    fn from(result: Result<Resolution, ResolveError>) -> Self {
        match result {
            Ok(resolution) => ResolutionResult::Resolved(resolution),
            Err(err) => ResolutionResult::Failed(err),
        }
    }
}
