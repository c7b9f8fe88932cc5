//! Server-side challenge issuance, verification and token validation

use crate::error::{AuthError, Result};
use crate::nonce::{NonceRegistry, DEFAULT_NONCE_LIFETIME, DEFAULT_NONCE_SIZE};
use crate::store::{log_prefix, DEFAULT_CLEANUP_INTERVAL};
use crate::token::{TokenRegistry, DEFAULT_TOKEN_LIFETIME, DEFAULT_TOKEN_SIZE};
use crate::types::{AuthRequest, Authorization, Challenge, Secret, Token};
use std::time::Duration;
use tracing::{debug, info, trace};

/// What happens to a server nonce after a successful verification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoncePolicy {
    /// The nonce stays live until it expires; replaying a verified request
    /// within the nonce lifetime mints another token
    #[default]
    MultiUse,
    /// The nonce is retired by the first successful verification
    SingleUse,
}

/// Server role configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Pre-shared secret, required
    pub secret: Secret,
    pub nonce_lifetime: Duration,
    pub token_lifetime: Duration,
    /// Period of the janitor sweeps in both registries
    pub cleanup_interval: Duration,
    pub nonce_size: usize,
    pub token_size: usize,
    pub nonce_policy: NoncePolicy,
}

impl ServerConfig {
    /// Configuration with default lifetimes and sizes
    pub fn new(secret: impl Into<Secret>) -> Self {
        Self {
            secret: secret.into(),
            nonce_lifetime: DEFAULT_NONCE_LIFETIME,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            nonce_size: DEFAULT_NONCE_SIZE,
            token_size: DEFAULT_TOKEN_SIZE,
            nonce_policy: NoncePolicy::default(),
        }
    }
}

/// Progress of a single authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Challenged,
    Verified,
    TokenIssued,
    Rejected,
}

/// Issues challenges, verifies responses and validates tokens
#[derive(Debug)]
pub struct Server {
    secret: Secret,
    nonces: NonceRegistry,
    tokens: TokenRegistry,
    nonce_policy: NoncePolicy,
}

impl Server {
    /// Create a server. Fails if the secret is empty.
    ///
    /// The registries' janitors are not running until [`Server::start`].
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::Configuration("secret is required".into()));
        }

        debug!("Creating server (nonce policy: {:?})", config.nonce_policy);

        Ok(Self {
            secret: config.secret,
            nonces: NonceRegistry::new(
                config.nonce_lifetime,
                config.nonce_size,
                config.cleanup_interval,
            ),
            tokens: TokenRegistry::new(
                config.token_lifetime,
                config.token_size,
                config.cleanup_interval,
            ),
            nonce_policy: config.nonce_policy,
        })
    }

    /// Start the nonce and token janitors. Requires a tokio runtime.
    pub fn start(&self) -> Result<()> {
        self.nonces.start()?;
        self.tokens.start()?;
        info!("Server started");
        Ok(())
    }

    /// Stop both janitors and wait for them to exit. Idempotent.
    pub async fn shutdown(&self) {
        self.nonces.stop().await;
        self.tokens.stop().await;
        debug!("Server shut down");
    }

    /// Issue a new challenge
    pub fn challenge(&self) -> Challenge {
        let server_nonce = self.nonces.issue();
        trace!(
            "Attempt {}...: {:?}",
            log_prefix(&server_nonce),
            AttemptState::Challenged
        );
        Challenge { server_nonce }
    }

    /// Verify a completed request and mint a token for it
    pub fn verify(&self, request: &AuthRequest) -> Result<Token> {
        let request = request.clone();

        let result = self.check(&request);
        if let Err(ref e) = result {
            debug!(
                "Request {}... rejected: {}",
                log_prefix(&request.server_nonce),
                e
            );
            trace!(
                "Attempt {}...: {:?}",
                log_prefix(&request.server_nonce),
                AttemptState::Rejected
            );
            return Err(e.clone());
        }

        trace!(
            "Attempt {}...: {:?}",
            log_prefix(&request.server_nonce),
            AttemptState::Verified
        );

        let token = self.tokens.issue();

        info!(
            "Request {}... authenticated, token {}... issued",
            log_prefix(&request.server_nonce),
            log_prefix(&token.value)
        );
        trace!(
            "Attempt {}...: {:?}",
            log_prefix(&request.server_nonce),
            AttemptState::TokenIssued
        );
        Ok(token)
    }

    fn check(&self, request: &AuthRequest) -> Result<()> {
        if request.server_nonce.is_empty() {
            return Err(AuthError::MalformedRequest("serverNonce"));
        }
        if request.client_nonce.is_empty() {
            return Err(AuthError::MalformedRequest("clientNonce"));
        }
        if request.hash.is_empty() {
            return Err(AuthError::MalformedRequest("hash"));
        }

        if !self.nonces.is_live(&request.server_nonce) {
            return Err(AuthError::UnknownOrExpiredNonce);
        }

        let expected = request.expected_hash(&self.secret);
        if !request.hash_matches(&expected) {
            return Err(AuthError::HashMismatch);
        }

        // Another verification of the same nonce may have won the race
        if self.nonce_policy == NoncePolicy::SingleUse
            && !self.nonces.consume(&request.server_nonce)
        {
            return Err(AuthError::UnknownOrExpiredNonce);
        }

        Ok(())
    }

    /// Check a presented token without consuming or extending it
    pub fn validate(&self, token: &str) -> Authorization {
        match self.tokens.lookup(token) {
            Some(_) => Authorization::Authorized,
            None => Authorization::Unauthorized,
        }
    }

    pub fn nonce_policy(&self) -> NoncePolicy {
        self.nonce_policy
    }

    pub fn nonces(&self) -> &NonceRegistry {
        &self.nonces
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::compute_hash;

    fn signed(server_nonce: &str, client_nonce: &str, secret: &str) -> AuthRequest {
        AuthRequest {
            server_nonce: server_nonce.to_string(),
            client_nonce: client_nonce.to_string(),
            hash: compute_hash(server_nonce, client_nonce, &Secret::from(secret)),
        }
    }

    #[test]
    fn test_empty_secret_rejected() {
        let err = Server::new(ServerConfig::new("")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::new("abc123");
        assert_eq!(config.nonce_lifetime, Duration::from_secs(300));
        assert_eq!(config.token_lifetime, Duration::from_secs(30));
        assert_eq!(config.cleanup_interval, Duration::from_secs(120));
        assert_eq!(config.nonce_size, 64);
        assert_eq!(config.token_size, 128);
        assert_eq!(config.nonce_policy, NoncePolicy::MultiUse);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_malformed() {
        let server = Server::new(ServerConfig::new("abc123")).unwrap();
        let nonce = server.challenge().server_nonce;

        let mut request = signed(&nonce, "client", "abc123");
        request.server_nonce.clear();
        assert_eq!(
            server.verify(&request),
            Err(AuthError::MalformedRequest("serverNonce"))
        );

        let mut request = signed(&nonce, "client", "abc123");
        request.client_nonce.clear();
        assert_eq!(
            server.verify(&request),
            Err(AuthError::MalformedRequest("clientNonce"))
        );

        let mut request = signed(&nonce, "client", "abc123");
        request.hash.clear();
        assert_eq!(
            server.verify(&request),
            Err(AuthError::MalformedRequest("hash"))
        );

        assert!(server.tokens().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_unknown_nonce() {
        let server = Server::new(ServerConfig::new("abc123")).unwrap();
        let request = signed("never-issued", "client", "abc123");
        assert_eq!(
            server.verify(&request),
            Err(AuthError::UnknownOrExpiredNonce)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_hash_mismatch() {
        let server = Server::new(ServerConfig::new("jk3434")).unwrap();
        let nonce = server.challenge().server_nonce;
        let request = signed(&nonce, "client", "abc123");
        assert_eq!(server.verify(&request), Err(AuthError::HashMismatch));
        assert!(server.tokens().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_and_validate() {
        let server = Server::new(ServerConfig::new("abc123")).unwrap();
        let nonce = server.challenge().server_nonce;

        let token = server.verify(&signed(&nonce, "client", "abc123")).unwrap();
        assert_eq!(token.value.len(), DEFAULT_TOKEN_SIZE);
        assert_eq!(server.validate(&token.value), Authorization::Authorized);
        assert_eq!(server.validate("random_junk"), Authorization::Unauthorized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_use_nonce_replay_mints_new_token() {
        let server = Server::new(ServerConfig::new("abc123")).unwrap();
        let nonce = server.challenge().server_nonce;
        let request = signed(&nonce, "client", "abc123");

        let first = server.verify(&request).unwrap();
        let second = server.verify(&request).unwrap();
        assert_ne!(first.value, second.value);
        assert!(server.nonces().is_live(&nonce));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_use_nonce_rejects_replay() {
        let mut config = ServerConfig::new("abc123");
        config.nonce_policy = NoncePolicy::SingleUse;
        let server = Server::new(config).unwrap();

        let nonce = server.challenge().server_nonce;
        let request = signed(&nonce, "client", "abc123");

        assert!(server.verify(&request).is_ok());
        assert_eq!(
            server.verify(&request),
            Err(AuthError::UnknownOrExpiredNonce)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_use_nonce_survives_failed_attempt() {
        let mut config = ServerConfig::new("abc123");
        config.nonce_policy = NoncePolicy::SingleUse;
        let server = Server::new(config).unwrap();

        let nonce = server.challenge().server_nonce;
        assert_eq!(
            server.verify(&signed(&nonce, "client", "wrong")),
            Err(AuthError::HashMismatch)
        );
        assert!(server.verify(&signed(&nonce, "client", "abc123")).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_lifetimes_do_not_panic() {
        let mut config = ServerConfig::new("abc123");
        config.nonce_lifetime = Duration::MAX;
        config.token_lifetime = Duration::MAX;
        config.cleanup_interval = Duration::MAX;
        let server = Server::new(config).unwrap();
        server.start().unwrap();

        let nonce = server.challenge().server_nonce;
        let token = server.verify(&signed(&nonce, "client", "abc123")).unwrap();
        assert_eq!(server.validate(&token.value), Authorization::Authorized);
        assert_eq!(server.tokens().lifetime(), crate::store::MAX_TTL);

        tokio::time::advance(Duration::from_secs(86400)).await;
        assert!(server.nonces().is_live(&nonce));
        assert!(server.nonces().is_running());
        server.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let server = Server::new(ServerConfig::new("abc123")).unwrap();
        server.start().unwrap();
        assert!(server.nonces().is_running());
        assert!(server.tokens().is_running());

        server.shutdown().await;
        assert!(!server.nonces().is_running());
        assert!(!server.tokens().is_running());
        server.shutdown().await;
    }
}
