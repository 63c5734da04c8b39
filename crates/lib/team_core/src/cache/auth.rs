//! Token cache: raw bearer token to validated identity, until the token's
//! own expiry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Sweep, read, spawn_sweeper, write};
use crate::models::Identity;

/// How often expired tokens are physically removed.
pub const REAP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct AuthCache {
    entries: RwLock<HashMap<String, CachedToken>>,
    shutdown: CancellationToken,
}

impl AuthCache {
    /// Cache without a reaper. Expired entries are still never returned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the cache and starts its reaper on the current runtime.
    pub fn start(every: Duration) -> (Arc<Self>, JoinHandle<()>) {
        let cache = Arc::new(Self::new());
        let handle = spawn_sweeper(Arc::clone(&cache), every, cache.shutdown.clone());
        (cache, handle)
    }

    /// Stops the reaper, if one was started.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn lookup(&self, token: &str) -> Option<Identity> {
        self.lookup_at(token, Utc::now())
    }

    /// Returns the cached identity unless the entry expired at or before `now`.
    pub fn lookup_at(&self, token: &str, now: DateTime<Utc>) -> Option<Identity> {
        read(&self.entries)
            .get(token)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.identity.clone())
    }

    /// Inserts or replaces the entry for `token`.
    pub fn store(&self, token: &str, identity: Identity, expires_at: DateTime<Utc>) {
        write(&self.entries).insert(
            token.to_string(),
            CachedToken {
                identity,
                expires_at,
            },
        );
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = write(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live_at(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sweep for AuthCache {
    const NAME: &'static str = "auth";

    fn sweep(&self) -> usize {
        self.purge_expired()
    }
}
