//! Process-local caches with background sweeping.
//!
//! Both caches are advisory: a miss or a poisoned lock degrades to the
//! authoritative path, never to an error.

pub mod auth;
pub mod entity;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use auth::{AuthCache, CachedToken};
pub use entity::{CacheKey, CachedEntity, EntityCache};

/// A cache whose stale entries can be dropped in one pass.
pub(crate) trait Sweep: Send + Sync + 'static {
    const NAME: &'static str;

    /// Removes stale entries and returns how many were dropped.
    fn sweep(&self) -> usize;
}

/// Runs `cache.sweep()` every `every` until `shutdown` is cancelled.
pub(crate) fn spawn_sweeper<C: Sweep>(
    cache: Arc<C>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(cache = C::NAME, "sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        debug!(cache = C::NAME, removed, "swept stale entries");
                    }
                }
            }
        }
    })
}

// A panic while holding the lock leaves the map itself intact; keep serving it.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
