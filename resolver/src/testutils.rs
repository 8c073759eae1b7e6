use crate::cache_key::CacheKey;
use crate::config_cache::{CacheError, ConfigurationCache};
use crate::configuration::Configuration;
use crate::credentials::Authorization;
use crate::fetcher::{RemoteFetcher, TransportError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const CONFIGURATION: &str = r#"{
    "clientApiUrl": "https://api.example.com:443/merchants/integration_merchant_id/client_api",
    "environment": "integration",
    "merchantId": "integration_merchant_id",
    "assetsUrl": "https://assets.example.com",
    "challenges": ["cvv", "postal_code"],
    "analytics": {"url": "https://analytics.example.com"},
    "paypalEnabled": true
}"#;

#[derive(Clone, Debug, PartialEq)]
pub struct FetchCall {
    pub url: String,
    pub body: Option<String>,
    pub authorization: Authorization,
    pub retries: u32,
}

pub enum FetchBehavior {
    Body(String),
    Error(String),
    Panic,
}

/// Fetcher that answers every request with the configured behavior and
/// records the calls it received.
pub struct MockFetcher {
    behavior: FetchBehavior,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<FetchCall>>,
}

impl MockFetcher {
    pub fn new(behavior: FetchBehavior) -> Self {
        MockFetcher {
            behavior,
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests are held until the returned handle is notified.
    pub fn gated(behavior: FetchBehavior) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let fetcher = MockFetcher {
            gate: Some(gate.clone()),
            ..MockFetcher::new(behavior)
        };
        (fetcher, gate)
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteFetcher for MockFetcher {
    async fn get(
        &self,
        url: &str,
        body: Option<&str>,
        authorization: &Authorization,
        retries: u32,
    ) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(FetchCall {
            url: url.to_string(),
            body: body.map(String::from),
            authorization: authorization.clone(),
            retries,
        });

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match &self.behavior {
            FetchBehavior::Body(body) => Ok(body.clone()),
            FetchBehavior::Error(message) => Err(TransportError::Other(message.clone())),
            FetchBehavior::Panic => panic!("transport failure"),
        }
    }
}

pub enum CacheGet {
    Miss,
    Hit(String),
    Fail(String),
}

pub enum CachePut {
    Succeed,
    Fail(String),
}

/// Cache with scripted results that records every access.
pub struct MockCache {
    on_get: CacheGet,
    on_put: CachePut,
    gets: Mutex<Vec<CacheKey>>,
    puts: Mutex<Vec<(CacheKey, String)>>,
}

impl MockCache {
    pub fn new(on_get: CacheGet, on_put: CachePut) -> Self {
        MockCache {
            on_get,
            on_put,
            gets: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        MockCache::new(CacheGet::Miss, CachePut::Succeed)
    }

    pub fn gets(&self) -> Vec<CacheKey> {
        self.gets.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<(CacheKey, String)> {
        self.puts.lock().unwrap().clone()
    }
}

impl ConfigurationCache for MockCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        self.gets.lock().unwrap().push(key.clone());
        match &self.on_get {
            CacheGet::Miss => Ok(None),
            CacheGet::Hit(blob) => Ok(Some(blob.clone())),
            CacheGet::Fail(message) => Err(CacheError::Storage(message.clone())),
        }
    }

    fn put(&self, configuration: &Configuration, key: &CacheKey) -> Result<(), CacheError> {
        self.puts
            .lock()
            .unwrap()
            .push((key.clone(), configuration.to_json()));
        match &self.on_put {
            CachePut::Succeed => Ok(()),
            CachePut::Fail(message) => Err(CacheError::Storage(message.clone())),
        }
    }
}
