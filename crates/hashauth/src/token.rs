//! Registry of issued session tokens

use crate::error::Result;
use crate::random::RandomStringGenerator;
use crate::store::{clamp_ttl, log_prefix, ExpiringStore};
use crate::types::Token;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Default token lifetime
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(30);

/// Default token length in characters
pub const DEFAULT_TOKEN_SIZE: usize = 128;

/// Mints tokens and tracks them until they expire
#[derive(Debug)]
pub struct TokenRegistry {
    store: ExpiringStore<Token>,
    generator: RandomStringGenerator,
    lifetime: Duration,
}

impl TokenRegistry {
    /// Create a registry. Zero values select the defaults.
    pub fn new(lifetime: Duration, size: usize, cleanup_interval: Duration) -> Self {
        let lifetime = if lifetime.is_zero() {
            DEFAULT_TOKEN_LIFETIME
        } else {
            clamp_ttl(lifetime)
        };
        let size = if size == 0 { DEFAULT_TOKEN_SIZE } else { size };

        debug!("Token lifetime {:?}, size {}", lifetime, size);

        Self {
            store: ExpiringStore::new("token", cleanup_interval),
            generator: RandomStringGenerator::new(size),
            lifetime,
        }
    }

    /// Mint and record a new token
    pub fn issue(&self) -> Token {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0));

        let token = Token {
            value: self.generator.generate(),
            expires_at: now.saturating_add(self.lifetime).as_secs(),
        };

        self.store.put(token.value.clone(), token.clone(), self.lifetime);
        debug!(
            "Issued token {}... expiring at {}",
            log_prefix(&token.value),
            token.expires_at
        );
        token
    }

    /// The token for `value`, if it was issued here and has not expired
    pub fn lookup(&self, value: &str) -> Option<Token> {
        let token = self.store.get(value);
        if token.is_none() {
            debug!("Token {}... not found or expired", log_prefix(value));
        }
        token
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Number of tracked tokens, including expired ones not yet evicted
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = TokenRegistry::new(Duration::ZERO, 0, Duration::ZERO);
        assert_eq!(registry.lifetime(), DEFAULT_TOKEN_LIFETIME);
        assert_eq!(registry.issue().value.len(), DEFAULT_TOKEN_SIZE);
    }

    #[test]
    fn test_issue_sets_expiry() {
        let registry = TokenRegistry::new(Duration::from_secs(60), 32, Duration::ZERO);
        let before = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let token = registry.issue();
        assert_eq!(token.value.len(), 32);
        assert!(token.expires_at >= before + 60);
        assert!(token.expires_at <= before + 61);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup() {
        let registry = TokenRegistry::new(Duration::from_secs(30), 32, Duration::from_secs(120));
        let token = registry.issue();

        assert_eq!(registry.lookup(&token.value), Some(token.clone()));
        assert_eq!(registry.lookup("random_junk"), None);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(registry.lookup(&token.value), None);
        assert_eq!(registry.sweep(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_does_not_extend_lifetime() {
        let registry = TokenRegistry::new(Duration::from_secs(10), 32, Duration::from_secs(120));
        let token = registry.issue();

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(2)).await;
            assert!(registry.lookup(&token.value).is_some());
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(registry.lookup(&token.value).is_none());
    }
}
