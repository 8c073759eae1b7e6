use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_MAX_CAPACITY: u64 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BASE_DELAY_MS: u64 = 500;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("cache base_dir cannot be empty")]
    EmptyBaseDir,

    #[error("cache max_capacity cannot be 0")]
    ZeroCapacity,

    #[error("fetcher timeout_secs cannot be 0")]
    ZeroTimeout,
}

#[derive(Clone, Copy, Default, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd1,
    Zstd3,
}

impl Compression {
    /// zstd compression level, `None` when entries are stored uncompressed.
    pub fn level(&self) -> Option<i32> {
        match self {
            Compression::None => None,
            Compression::Zstd1 => Some(1),
            Compression::Zstd3 => Some(3),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum CacheStoreType {
    Memory {
        #[serde(default = "default_max_capacity")]
        max_capacity: u64,
    },
    Filesystem {
        base_dir: String,
        #[serde(default)]
        compression: Compression,
    },
    None,
}

/// Where resolved configurations are cached and for how long.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct CacheConfig {
    #[serde(flatten)]
    pub r#type: CacheStoreType,
    /// Age after which a cached configuration is ignored.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            r#type: CacheStoreType::Memory {
                max_capacity: DEFAULT_MAX_CAPACITY,
            },
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct FetcherConfig {
    /// Timeout of a single request attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Backoff before the first retry, doubled on every further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

#[derive(Clone, Default, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.cache.r#type {
            CacheStoreType::Memory { max_capacity } if *max_capacity == 0 => {
                return Err(ValidationError::ZeroCapacity);
            }
            CacheStoreType::Filesystem { base_dir, .. } if base_dir.is_empty() => {
                return Err(ValidationError::EmptyBaseDir);
            }
            _ => {}
        }

        if self.fetcher.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }

        Ok(())
    }
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_max_capacity() -> u64 {
    DEFAULT_MAX_CAPACITY
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
