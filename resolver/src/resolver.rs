use crate::cache_key::CacheKey;
use crate::config_cache::ConfigurationCache;
use crate::configuration::Configuration;
use crate::credentials::{Authorization, Credentials};
use crate::fetcher::{RemoteFetcher, TransportError};
use crate::metrics_defs::{
    CACHE_HIT, CACHE_LOAD_ERROR, CACHE_MISS, CACHE_SAVE_ERROR, FETCH_DURATION, RESOLVE_FAILED,
};
use crate::result::{ConfigurationSource, Resolution, ResolutionResult, ResolveError};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

/// Version of the configuration protocol requested from the endpoint. Bumping
/// it changes the wire contract and every cache key.
pub const CONFIG_VERSION: u32 = 3;

/// Number of attempts the fetcher is allowed per resolution.
pub const FETCH_RETRIES: u32 = 3;

struct ResolverInner {
    fetcher: Arc<dyn RemoteFetcher>,
    cache: Arc<dyn ConfigurationCache>,
}

/// Resolves the remote configuration for a set of credentials, preferring the
/// cache and falling back to the network.
///
/// The resolver holds no state besides its collaborators, so clones are cheap
/// and concurrent resolutions are independent of each other.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, cache: Arc<dyn ConfigurationCache>) -> Self {
        Resolver {
            inner: Arc::new(ResolverInner { fetcher, cache }),
        }
    }

    /// URL the configuration is fetched from.
    pub fn config_url(endpoint: &str) -> String {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!("{endpoint}{separator}configVersion={CONFIG_VERSION}")
    }

    pub fn cache_key(authorization: &Authorization) -> CacheKey {
        let url = Self::config_url(authorization.config_url());
        CacheKey::derive(&url, authorization.bearer())
    }

    pub async fn resolve(&self, credentials: &Credentials) -> ResolutionResult {
        match credentials {
            Credentials::Valid(authorization) => {
                self.resolve_authorization(authorization.clone()).await
            }
            Credentials::Invalid { reason } => invalid_credentials(reason),
        }
    }

    /// Callback flavour of [`Resolver::resolve`]. `on_complete` is called exactly
    /// once: before this function returns for invalid credentials, otherwise from
    /// a spawned task once the resolution settles.
    ///
    /// # Panics
    ///
    /// Panics when called with valid credentials outside of a tokio runtime.
    pub fn resolve_with<F>(&self, credentials: Credentials, on_complete: F)
    where
        F: FnOnce(ResolutionResult) + Send + 'static,
    {
        let authorization = match credentials {
            Credentials::Valid(authorization) => authorization,
            Credentials::Invalid { reason } => {
                on_complete(invalid_credentials(&reason));
                return;
            }
        };

        let resolver = self.clone();
        tokio::spawn(async move {
            let result = resolver.resolve_authorization(authorization).await;
            on_complete(result);
        });
    }

    async fn resolve_authorization(&self, authorization: Authorization) -> ResolutionResult {
        let url = Self::config_url(authorization.config_url());
        let key = CacheKey::derive(&url, authorization.bearer());

        let load_from_cache_error = match self.inner.cache.get(&key) {
            Ok(Some(blob)) => match Configuration::from_json(&blob) {
                Ok(configuration) => {
                    counter!(CACHE_HIT).increment(1);
                    tracing::debug!(%url, "configuration loaded from cache");
                    return ResolutionResult::Resolved(Resolution::from_cache(configuration));
                }
                Err(err) => {
                    // Unreadable entries are ignored and overwritten by the fetch below.
                    tracing::debug!(%url, error = %err, "ignoring unreadable cached configuration");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                counter!(CACHE_LOAD_ERROR).increment(1);
                tracing::warn!(%url, error = %err, "failed to load configuration from cache");
                Some(err)
            }
        };
        counter!(CACHE_MISS).increment(1);

        let body = match self.fetch(url.clone(), authorization).await {
            Ok(body) => body,
            Err(err) => return failed(ResolveError::Transport(err)),
        };

        let configuration = match Configuration::from_json(&body) {
            Ok(configuration) => configuration,
            Err(err) => return failed(ResolveError::Parse(err)),
        };

        let save_to_cache_error = match self.inner.cache.put(&configuration, &key) {
            Ok(()) => None,
            Err(err) => {
                counter!(CACHE_SAVE_ERROR).increment(1);
                tracing::warn!(%url, error = %err, "failed to save configuration to cache");
                Some(err)
            }
        };

        tracing::debug!(%url, "configuration fetched");

        ResolutionResult::Resolved(Resolution {
            configuration,
            source: ConfigurationSource::Network,
            load_from_cache_error,
            save_to_cache_error,
        })
    }

    // The request runs on its own task so that a transport that panics or is
    // aborted still settles the resolution.
    async fn fetch(
        &self,
        url: String,
        authorization: Authorization,
    ) -> Result<String, TransportError> {
        let fetcher = self.inner.fetcher.clone();
        let start = Instant::now();

        let handle = tokio::spawn(async move {
            fetcher
                .get(&url, None, &authorization, FETCH_RETRIES)
                .await
        });

        let result = match handle.await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "configuration request did not complete");
                Err(TransportError::Cancelled)
            }
        };

        histogram!(FETCH_DURATION).record(start.elapsed().as_secs_f64());
        result
    }
}

fn invalid_credentials(reason: &str) -> ResolutionResult {
    failed(ResolveError::InvalidCredentials {
        reason: reason.to_string(),
    })
}

fn failed(err: ResolveError) -> ResolutionResult {
    counter!(RESOLVE_FAILED).increment(1);
    tracing::error!(error = %err, "configuration could not be resolved");
    ResolutionResult::Failed(err)
}
