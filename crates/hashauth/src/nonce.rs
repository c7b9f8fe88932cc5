//! Registry of issued server nonces

use crate::error::Result;
use crate::random::RandomStringGenerator;
use crate::store::{clamp_ttl, log_prefix, ExpiringStore};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default nonce lifetime
pub const DEFAULT_NONCE_LIFETIME: Duration = Duration::from_secs(300);

/// Default nonce length in characters
pub const DEFAULT_NONCE_SIZE: usize = 64;

/// Tracks issued server nonces until they expire
///
/// The stored value is the instant the nonce was issued.
#[derive(Debug)]
pub struct NonceRegistry {
    store: ExpiringStore<Instant>,
    generator: RandomStringGenerator,
    lifetime: Duration,
}

impl NonceRegistry {
    /// Create a registry. Zero values select the defaults.
    pub fn new(lifetime: Duration, size: usize, cleanup_interval: Duration) -> Self {
        let lifetime = if lifetime.is_zero() {
            DEFAULT_NONCE_LIFETIME
        } else {
            clamp_ttl(lifetime)
        };
        let size = if size == 0 { DEFAULT_NONCE_SIZE } else { size };

        debug!("Nonce lifetime {:?}, size {}", lifetime, size);

        Self {
            store: ExpiringStore::new("nonce", cleanup_interval),
            generator: RandomStringGenerator::new(size),
            lifetime,
        }
    }

    /// Generate and record a fresh nonce
    pub fn issue(&self) -> String {
        let nonce = self.generator.generate();
        self.store.put(nonce.clone(), Instant::now(), self.lifetime);
        debug!("Issued nonce {}...", log_prefix(&nonce));
        nonce
    }

    /// Whether `nonce` was issued here and has not expired
    pub fn is_live(&self, nonce: &str) -> bool {
        let live = self.store.contains(nonce);
        if !live {
            debug!("Nonce {}... not found or expired", log_prefix(nonce));
        }
        live
    }

    /// Atomically retire a live nonce; false if it was unknown, expired or
    /// already consumed
    pub fn consume(&self, nonce: &str) -> bool {
        match self.store.take(nonce) {
            Some(issued_at) => {
                debug!(
                    "Consumed nonce {}... after {:?}",
                    log_prefix(nonce),
                    issued_at.elapsed()
                );
                true
            }
            None => false,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Number of tracked nonces, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn sweep(&self) -> usize {
        self.store.sweep()
    }

    pub fn start(&self) -> Result<()> {
        self.store.start()
    }

    pub async fn stop(&self) {
        self.store.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.store.is_running()
    }
}
