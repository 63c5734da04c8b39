//! Entity cache: short-circuits repeated account and role reads.
//!
//! Writers must `refresh`, `set` or `delete` the affected keys before they
//! report success, so a caller always reads its own writes. Accounts and
//! roles are written with [`EntityCache::refresh`], which never replaces a
//! snapshot with an older one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Sweep, read, spawn_sweeper, write};
use crate::models::{Account, Permission, Role};

/// Lifetime of a cached entity.
pub const ENTITY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Granularity of the expiry sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Deterministic cache key, rendered as `account-<id>`, `role-<id>`,
/// `roles-<account id>` or `permissions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Account(Uuid),
    Role(Uuid),
    Roles(Uuid),
    Permissions,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Account(id) => write!(f, "account-{id}"),
            CacheKey::Role(id) => write!(f, "role-{id}"),
            CacheKey::Roles(account_id) => write!(f, "roles-{account_id}"),
            CacheKey::Permissions => f.write_str("permissions"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedEntity {
    Account(Account),
    Role(Role),
    Roles(Vec<Role>),
    Permissions(Vec<Permission>),
}

impl CachedEntity {
    fn kind(&self) -> &'static str {
        match self {
            CachedEntity::Account(_) => "account",
            CachedEntity::Role(_) => "role",
            CachedEntity::Roles(_) => "roles",
            CachedEntity::Permissions(_) => "permissions",
        }
    }

    /// Store timestamp of the snapshot, for entities that carry one.
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            CachedEntity::Account(account) => Some(account.updated_at),
            CachedEntity::Role(role) => Some(role.updated_at),
            CachedEntity::Roles(_) | CachedEntity::Permissions(_) => None,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: CachedEntity,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct EntityCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    shutdown: CancellationToken,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::with_ttl(ENTITY_TTL)
    }
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            shutdown: CancellationToken::new(),
        }
    }

    /// Creates the cache and starts its expiry sweep on the current runtime.
    pub fn start(ttl: Duration, every: Duration) -> (Arc<Self>, JoinHandle<()>) {
        let cache = Arc::new(Self::with_ttl(ttl));
        let handle = spawn_sweeper(Arc::clone(&cache), every, cache.shutdown.clone());
        (cache, handle)
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns a live entry. Entries older than the TTL count as absent.
    pub fn get(&self, key: CacheKey) -> Option<CachedEntity> {
        read(&self.entries)
            .get(&key.to_string())
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: CacheKey, value: CachedEntity) {
        write(&self.entries).insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Like [`set`](Self::set), but keeps a live entry whose snapshot is
    /// newer than `value`. Returns whether `value` was stored.
    ///
    /// Two writers of one entity may finish in any order; the later store
    /// commit wins here as it does in the store.
    pub fn refresh(&self, key: CacheKey, value: CachedEntity) -> bool {
        let key = key.to_string();
        let mut entries = write(&self.entries);
        if let Some(current) = entries.get(&key)
            && current.inserted_at.elapsed() < self.ttl
            && let (Some(cached), Some(incoming)) = (current.value.updated_at(), value.updated_at())
            && cached > incoming
        {
            debug!(key = %key, "kept newer cached snapshot");
            return false;
        }
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    pub fn delete(&self, key: CacheKey) {
        write(&self.entries).remove(&key.to_string());
    }

    pub fn delete_many(&self, keys: impl IntoIterator<Item = CacheKey>) {
        let mut entries = write(&self.entries);
        for key in keys {
            entries.remove(&key.to_string());
        }
    }

    pub fn account(&self, id: Uuid) -> Option<Account> {
        match self.get(CacheKey::Account(id))? {
            CachedEntity::Account(account) => Some(account),
            other => self.evict_mismatch(CacheKey::Account(id), &other),
        }
    }

    pub fn role(&self, id: Uuid) -> Option<Role> {
        match self.get(CacheKey::Role(id))? {
            CachedEntity::Role(role) => Some(role),
            other => self.evict_mismatch(CacheKey::Role(id), &other),
        }
    }

    pub fn roles(&self, account_id: Uuid) -> Option<Vec<Role>> {
        match self.get(CacheKey::Roles(account_id))? {
            CachedEntity::Roles(roles) => Some(roles),
            other => self.evict_mismatch(CacheKey::Roles(account_id), &other),
        }
    }

    pub fn permissions(&self) -> Option<Vec<Permission>> {
        match self.get(CacheKey::Permissions)? {
            CachedEntity::Permissions(permissions) => Some(permissions),
            other => self.evict_mismatch(CacheKey::Permissions, &other),
        }
    }

    fn evict_mismatch<T>(&self, key: CacheKey, found: &CachedEntity) -> Option<T> {
        warn!(key = %key, found = found.kind(), "cached value has unexpected type, evicting");
        self.delete(key);
        None
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self) -> usize {
        let mut entries = write(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before - entries.len()
    }
}

impl Sweep for EntityCache {
    const NAME: &'static str = "entity";

    fn sweep(&self) -> usize {
        self.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new(Uuid::nil(), "Acme", "app.delivc.com", Uuid::new_v4())
    }

    #[test]
    fn keys_render_deterministically() {
        let id = Uuid::parse_str("5f0c9a52-8d1b-4d67-9a43-2a1f3bb0c001").unwrap();
        assert_eq!(
            CacheKey::Account(id).to_string(),
            "account-5f0c9a52-8d1b-4d67-9a43-2a1f3bb0c001"
        );
        assert_eq!(
            CacheKey::Role(id).to_string(),
            "role-5f0c9a52-8d1b-4d67-9a43-2a1f3bb0c001"
        );
        assert_eq!(
            CacheKey::Roles(id).to_string(),
            "roles-5f0c9a52-8d1b-4d67-9a43-2a1f3bb0c001"
        );
    }

    #[test]
    fn set_get_delete() {
        let cache = EntityCache::new();
        let acme = account();
        cache.set(CacheKey::Account(acme.id), CachedEntity::Account(acme.clone()));
        assert_eq!(cache.account(acme.id), Some(acme.clone()));
        cache.delete(CacheKey::Account(acme.id));
        assert!(cache.account(acme.id).is_none());
    }

    #[test]
    fn set_overwrites_previous_value() {
        let cache = EntityCache::new();
        let mut acme = account();
        cache.set(CacheKey::Account(acme.id), CachedEntity::Account(acme.clone()));
        acme.name = "Acme 2".into();
        cache.set(CacheKey::Account(acme.id), CachedEntity::Account(acme.clone()));
        assert_eq!(cache.account(acme.id).map(|a| a.name), Some("Acme 2".into()));
    }

    #[test]
    fn refresh_never_goes_back_in_time() {
        let cache = EntityCache::new();
        let older = account();
        let mut newer = older.clone();
        newer.name = "Acme 2".into();
        newer.updated_at = older.updated_at + chrono::Duration::seconds(1);

        // Newer commit reported first, older one last.
        assert!(cache.refresh(CacheKey::Account(older.id), CachedEntity::Account(newer.clone())));
        assert!(!cache.refresh(CacheKey::Account(older.id), CachedEntity::Account(older.clone())));
        assert_eq!(cache.account(older.id), Some(newer.clone()));

        let mut newest = newer.clone();
        newest.name = "Acme 3".into();
        newest.updated_at = newer.updated_at + chrono::Duration::seconds(1);
        assert!(cache.refresh(CacheKey::Account(older.id), CachedEntity::Account(newest.clone())));
        assert_eq!(cache.account(older.id), Some(newest));
    }

    #[test]
    fn refresh_replaces_expired_or_foreign_entries() {
        let cache = EntityCache::with_ttl(Duration::ZERO);
        let older = account();
        let mut newer = older.clone();
        newer.updated_at = older.updated_at + chrono::Duration::seconds(1);
        cache.set(CacheKey::Account(older.id), CachedEntity::Account(newer));
        assert!(cache.refresh(CacheKey::Account(older.id), CachedEntity::Account(older.clone())));

        let cache = EntityCache::new();
        cache.set(CacheKey::Account(older.id), CachedEntity::Roles(Vec::new()));
        assert!(cache.refresh(CacheKey::Account(older.id), CachedEntity::Account(older.clone())));
        assert_eq!(cache.account(older.id), Some(older));
    }

    #[test]
    fn type_mismatch_evicts_entry() {
        let cache = EntityCache::new();
        let id = Uuid::new_v4();
        cache.set(CacheKey::Account(id), CachedEntity::Roles(Vec::new()));
        assert!(cache.account(id).is_none());
        assert!(cache.get(CacheKey::Account(id)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_absent_and_swept() {
        let cache = EntityCache::with_ttl(Duration::ZERO);
        let acme = account();
        cache.set(CacheKey::Account(acme.id), CachedEntity::Account(acme.clone()));
        assert!(cache.account(acme.id).is_none());
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn delete_many_purges_listed_keys_only() {
        let cache = EntityCache::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        cache.set(CacheKey::Roles(a), CachedEntity::Roles(Vec::new()));
        cache.set(CacheKey::Roles(b), CachedEntity::Roles(Vec::new()));
        cache.delete_many([CacheKey::Roles(a), CacheKey::Role(Uuid::new_v4())]);
        assert!(cache.roles(a).is_none());
        assert!(cache.roles(b).is_some());
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let (cache, handle) = EntityCache::start(Duration::ZERO, Duration::from_millis(10));
        cache.set(CacheKey::Permissions, CachedEntity::Permissions(Vec::new()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());
        cache.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper exits after shutdown")
            .unwrap();
    }
}
