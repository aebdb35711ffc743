//! Drift Cache - Content-addressed store for assembled responses
//!
//! Entries are keyed by the SHA-256 of the resolved query text, so two
//! requests that plan to the same partition queries share an entry.

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lowercase hex SHA-256 of a resolved query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_query(text: &str) -> Self {
        Self(hex::encode(Sha256::digest(text.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for fully assembled responses.
pub trait ResultCache: Send + Sync {
    /// `Ok(None)` on a miss, including unreadable entries.
    fn get(&self, key: &CacheKey) -> Result<Option<Value>>;

    fn put(&self, key: &CacheKey, value: &Value) -> Result<()>;
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ResultCache for NoopCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<Value>> {
        Ok(None)
    }

    fn put(&self, _key: &CacheKey, _value: &Value) -> Result<()> {
        Ok(())
    }
}

/// One `<hash>.json` file per entry under a directory.
#[derive(Debug, Clone)]
pub struct FileResultCache {
    dir: PathBuf,
}

impl FileResultCache {
    /// Open (creating if needed) a cache directory
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache directory {:?}", dir))?;
        info!("Result cache at {:?}", dir);
        Ok(Self { dir })
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ResultCache for FileResultCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read {:?}", path)),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(%key, "cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Ignoring corrupt cache entry {:?}: {}", path, e);
                Ok(None)
            }
        }
    }

    /// Write to a temp file in the cache directory, then rename into place.
    fn put(&self, key: &CacheKey, value: &Value) -> Result<()> {
        let path = self.entry_path(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {:?}", self.dir))?;
        serde_json::to_writer(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(&path)
            .with_context(|| format!("failed to persist {:?}", path))?;
        debug!(%key, "cache store");
        Ok(())
    }
}
