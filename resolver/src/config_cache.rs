//! Storage for resolved configurations, keyed by [`CacheKey`].
//!
//! A cache only stores and returns the serialized document. Deciding whether a
//! returned blob is usable is left to the resolver, which treats anything that
//! fails to parse as a miss.
use crate::cache_key::CacheKey;
use crate::config::{CacheConfig, CacheStoreType, Compression};
use crate::configuration::Configuration;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

pub trait ConfigurationCache: Send + Sync {
    /// Returns the stored document, `None` if there is no live entry for the key.
    fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;
    fn put(&self, configuration: &Configuration, key: &CacheKey) -> Result<(), CacheError>;
}

pub fn from_config(config: &CacheConfig) -> Result<Arc<dyn ConfigurationCache>, CacheError> {
    let ttl = Duration::from_secs(config.ttl_secs);

    let cache: Arc<dyn ConfigurationCache> = match &config.r#type {
        CacheStoreType::Memory { max_capacity } => {
            Arc::new(InMemoryConfigurationCache::new(*max_capacity, ttl))
        }
        CacheStoreType::Filesystem {
            base_dir,
            compression,
        } => Arc::new(FilesystemConfigurationCache::new(
            base_dir,
            *compression,
            ttl,
        )?),
        CacheStoreType::None => Arc::new(NoopConfigurationCache {}),
    };

    Ok(cache)
}

pub struct InMemoryConfigurationCache {
    cache: Cache<CacheKey, String>,
}

impl InMemoryConfigurationCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        InMemoryConfigurationCache { cache }
    }
}

impl ConfigurationCache for InMemoryConfigurationCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key))
    }

    fn put(&self, configuration: &Configuration, key: &CacheKey) -> Result<(), CacheError> {
        self.cache.insert(key.clone(), configuration.to_json());
        Ok(())
    }
}

// Cache that never stores anything, every lookup is a miss.
pub struct NoopConfigurationCache {}

impl ConfigurationCache for NoopConfigurationCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn put(&self, _configuration: &Configuration, _key: &CacheKey) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CacheEntry {
    // milliseconds since 1970-01-01 00:00:00 UTC
    stored_at: u64,
    configuration: String,
}

struct Codec {
    compression: Compression,
}

impl Codec {
    fn new(compression: Compression) -> Self {
        Codec { compression }
    }

    fn write<W: Write>(&self, writer: &mut W, entry: &CacheEntry) -> Result<(), CacheError> {
        match self.compression.level() {
            None => {
                serde_json::to_writer(&mut *writer, entry).map_err(CacheError::Encode)?;
                writer.flush()?;
            }
            Some(level) => {
                let mut encoder = zstd::stream::write::Encoder::new(writer, level)?;
                serde_json::to_writer(&mut encoder, entry).map_err(CacheError::Encode)?;
                encoder.finish()?.flush()?;
            }
        }
        Ok(())
    }

    fn read<R: Read>(&self, reader: R) -> Result<CacheEntry, CacheError> {
        match self.compression.level() {
            None => serde_json::from_reader(reader).map_err(CacheError::Decode),
            Some(_) => {
                let decoder = zstd::stream::read::Decoder::new(reader)?;
                serde_json::from_reader(decoder).map_err(CacheError::Decode)
            }
        }
    }
}

/// Stores one file per key under `base_dir`. Entries older than the TTL are
/// reported as absent and removed on read.
pub struct FilesystemConfigurationCache {
    base_dir: PathBuf,
    codec: Codec,
    ttl: Duration,
}

impl FilesystemConfigurationCache {
    pub fn new<P: AsRef<Path>>(
        base_dir: P,
        compression: Compression,
        ttl: Duration,
    ) -> Result<Self, CacheError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        Ok(FilesystemConfigurationCache {
            base_dir,
            codec: Codec::new(compression),
            ttl,
        })
    }

    // Keys embed the whole configuration URL and token and can exceed file name
    // limits, so files are named after their digest.
    fn path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.base_dir.join(format!("{digest:x}.config"))
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        let age = now_millis().saturating_sub(entry.stored_at);
        Duration::from_millis(age) >= self.ttl
    }
}

impl ConfigurationCache for FilesystemConfigurationCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let path = self.path(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let entry = self.codec.read(io::BufReader::new(file))?;

        if self.is_expired(&entry) {
            tracing::debug!(path = %path.display(), "cached configuration expired");
            if let Err(err) = fs::remove_file(&path) {
                tracing::debug!(error = %err, "failed to remove expired cache entry");
            }
            return Ok(None);
        }

        Ok(Some(entry.configuration))
    }

    fn put(&self, configuration: &Configuration, key: &CacheKey) -> Result<(), CacheError> {
        let entry = CacheEntry {
            stored_at: now_millis(),
            configuration: configuration.to_json(),
        };

        let path = self.path(key);
        // Readers must never observe a partially written entry, so the entry is
        // written next to the target and renamed over it.
        let mut file = NamedTempFile::new_in(&self.base_dir)?;
        {
            let mut writer = io::BufWriter::new(file.as_file_mut());
            self.codec.write(&mut writer, &entry)?;
        }
        file.persist(&path).map_err(|err| CacheError::Io(err.error))?;

        tracing::debug!(path = %path.display(), "stored configuration in cache");

        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
