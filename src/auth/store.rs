//! Expiring key-value storage for authorization codes and access tokens
//!
//! `ExpiringStore` is the seam between the OAuth endpoints and wherever
//! short-lived credentials live. `MemoryStore` keeps them in process and
//! evicts expired entries lazily on access and from a background sweeper.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token store unavailable: {0}")]
    Unavailable(String),
}

/// Storage interface for credentials that expire
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Insert or replace `key`, expiring after `ttl`
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Value for `key` unless it is missing or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`, reporting whether a live entry was removed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically read and remove `key`
    ///
    /// Of any number of concurrent callers for the same key, at most one gets
    /// the value.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process `ExpiringStore`
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Remove every expired entry, returning how many were evicted
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }

    /// Number of entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a task that purges expired entries every `interval`
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match store.purge_expired() {
                    Ok(0) => {}
                    Ok(evicted) => debug!("Evicted {} expired store entries", evicted),
                    Err(e) => tracing::warn!("Store sweep failed: {}", e),
                }
            }
        })
    }
}

#[async_trait]
impl ExpiringStore for MemoryStore {
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl;
        self.lock()?.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let live = entries.get(key).map(|entry| entry.is_live(now));
        match live {
            Some(true) => Ok(entries.get(key).map(|entry| entry.value.clone())),
            Some(false) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .remove(key)
            .map(|entry| entry.is_live(now))
            .unwrap_or(false))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        // Single lock acquisition: lookup and removal cannot interleave.
        Ok(self
            .lock()?
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }
}
