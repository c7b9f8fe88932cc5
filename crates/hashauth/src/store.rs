//! Concurrency-safe string-keyed map with per-entry expiry
//!
//! Expired entries are invisible to every read as soon as their deadline
//! passes, and are physically evicted by a background janitor task that
//! runs on a fixed interval.
//!
//! The janitor sweeps in two phases: it collects expired keys under the
//! read lock, then takes the write lock only to delete them. Each key is
//! re-checked under the write lock, so an entry renewed between the two
//! phases is never deleted.

use crate::error::{AuthError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Default period between janitor sweeps
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(120);

/// Longest ttl or cleanup interval honoured; longer values are clamped
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// `ttl` clamped to [`MAX_TTL`]
pub(crate) fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.min(MAX_TTL)
}

fn deadline(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(clamp_ttl(ttl)).unwrap_or(now)
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at < now
    }
}

type Entries<V> = RwLock<HashMap<String, Entry<V>>>;

struct Janitor {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Map from string key to an expiring value
pub struct ExpiringStore<V> {
    /// Label used in log output
    name: &'static str,
    entries: Arc<Entries<V>>,
    cleanup_interval: Duration,
    janitor: Mutex<Option<Janitor>>,
}

impl<V> ExpiringStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store. A zero `cleanup_interval` selects the default.
    pub fn new(name: &'static str, cleanup_interval: Duration) -> Self {
        let cleanup_interval = if cleanup_interval.is_zero() {
            DEFAULT_CLEANUP_INTERVAL
        } else {
            clamp_ttl(cleanup_interval)
        };

        debug!(
            "Creating {} store (cleanup interval: {:?})",
            name, cleanup_interval
        );

        Self {
            name,
            entries: Arc::new(RwLock::new(HashMap::new())),
            cleanup_interval,
            janitor: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Insert or overwrite `key`, expiring `ttl` from now
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: deadline(Instant::now(), ttl),
        };
        write_entries(&self.entries).insert(key.into(), entry);
    }

    /// Value for `key` if present and not expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        read_entries(&self.entries)
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Whether `key` is present and not expired
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        read_entries(&self.entries)
            .get(key)
            .map_or(false, |entry| entry.is_live(now))
    }

    /// Remove `key` whether or not it has expired
    pub fn remove(&self, key: &str) -> Option<V> {
        write_entries(&self.entries)
            .remove(key)
            .map(|entry| entry.value)
    }

    /// Remove `key`, returning its value only if it was still live
    ///
    /// Atomic with respect to other callers: of several concurrent takes
    /// of the same live key, exactly one gets the value.
    pub fn take(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        write_entries(&self.entries)
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value)
    }

    /// Number of entries held, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        read_entries(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one sweep now, returning the number of evicted entries
    pub fn sweep(&self) -> usize {
        sweep_entries(self.name, &self.entries)
    }

    /// Start the background janitor
    ///
    /// Idempotent. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut janitor = self.janitor.lock().unwrap_or_else(PoisonError::into_inner);
        if janitor.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            AuthError::Configuration(format!(
                "{} janitor requires a tokio runtime: {}",
                self.name, e
            ))
        })?;

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let entries = Arc::clone(&self.entries);
        let name = self.name;
        let period = self.cleanup_interval;

        let handle = runtime.spawn(async move {
            debug!("{} janitor started (interval: {:?})", name, period);

            let mut ticker = tokio::time::interval_at(deadline(Instant::now(), period), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    // Also completes when the sender is dropped with the store
                    _ = &mut shutdown_rx => {
                        debug!("{} janitor shutting down", name);
                        break;
                    }
                    _ = ticker.tick() => {
                        sweep_entries(name, &entries);
                    }
                }
            }
        });

        *janitor = Some(Janitor { shutdown, handle });
        Ok(())
    }

    /// Stop the background janitor and wait for its task to exit
    ///
    /// Idempotent; a no-op if the janitor was never started.
    pub async fn stop(&self) {
        let janitor = self
            .janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(janitor) = janitor {
            let _ = janitor.shutdown.send(());
            if let Err(e) = janitor.handle.await {
                warn!("{} janitor task ended abnormally: {}", self.name, e);
            }
        }
    }

    /// Whether the janitor task is currently running
    pub fn is_running(&self) -> bool {
        self.janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |janitor| !janitor.handle.is_finished())
    }

    #[cfg(test)]
    fn collect_expired(&self) -> Vec<String> {
        collect_expired(&self.entries, Instant::now())
    }

    #[cfg(test)]
    fn evict(&self, keys: Vec<String>) -> usize {
        evict(self.name, &self.entries, keys, Instant::now())
    }
}

impl<V> fmt::Debug for ExpiringStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("name", &self.name)
            .field("entries", &read_entries(&self.entries).len())
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

fn read_entries<V>(entries: &Entries<V>) -> RwLockReadGuard<'_, HashMap<String, Entry<V>>> {
    entries.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_entries<V>(entries: &Entries<V>) -> RwLockWriteGuard<'_, HashMap<String, Entry<V>>> {
    entries.write().unwrap_or_else(PoisonError::into_inner)
}

fn collect_expired<V>(entries: &Entries<V>, now: Instant) -> Vec<String> {
    read_entries(entries)
        .iter()
        .filter(|(_, entry)| entry.is_expired(now))
        .map(|(key, _)| key.clone())
        .collect()
}

fn evict<V>(
    name: &str,
    entries: &Entries<V>,
    keys: Vec<String>,
    now: Instant,
) -> usize {
    let mut map = write_entries(entries);
    let mut evicted = 0;

    for key in keys {
        // The key may have been renewed since it was collected
        if map.get(&key).map_or(false, |entry| entry.is_expired(now)) {
            trace!("{}: ejecting expired {}", name, log_prefix(&key));
            map.remove(&key);
            evicted += 1;
        }
    }

    evicted
}

fn sweep_entries<V>(name: &str, entries: &Entries<V>) -> usize {
    debug!("{}: running cleanup", name);

    let expired = collect_expired(entries, Instant::now());
    let evicted = if expired.is_empty() {
        0
    } else {
        evict(name, entries, expired, Instant::now())
    };

    debug!("{}: completed cleanup, evicted {}", name, evicted);
    evicted
}

/// Short, log-safe prefix of a nonce or token
pub(crate) fn log_prefix(value: &str) -> &str {
    value
        .char_indices()
        .nth(8)
        .map_or(value, |(i, _)| &value[..i])
}
