//! Client-side challenge response

use crate::error::{AuthError, Result};
use crate::nonce::DEFAULT_NONCE_SIZE;
use crate::random::RandomStringGenerator;
use crate::store::log_prefix;
use crate::types::{compute_hash, AuthRequest, Challenge, Secret};
use tracing::debug;

/// Client role configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Pre-shared secret, required
    pub secret: Secret,
    /// Length of generated client nonces
    pub client_nonce_size: usize,
}

impl ClientConfig {
    pub fn new(secret: impl Into<Secret>) -> Self {
        Self {
            secret: secret.into(),
            client_nonce_size: DEFAULT_NONCE_SIZE,
        }
    }
}

/// Answers server challenges by proving knowledge of the shared secret
///
/// Holds no server state; the only side effect of responding is drawing
/// fresh local randomness for the client nonce.
#[derive(Debug)]
pub struct Client {
    secret: Secret,
    generator: RandomStringGenerator,
}

impl Client {
    /// Create a client. Fails if the secret is empty.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::Configuration("secret is required".into()));
        }

        Ok(Self {
            secret: config.secret,
            generator: RandomStringGenerator::new(config.client_nonce_size),
        })
    }

    /// Build a signed request for `challenge` with a fresh client nonce
    pub fn respond(&self, challenge: &Challenge) -> Result<AuthRequest> {
        if challenge.server_nonce.is_empty() {
            return Err(AuthError::InvalidChallenge);
        }

        let client_nonce = self.generator.generate();
        let hash = compute_hash(&challenge.server_nonce, &client_nonce, &self.secret);

        debug!(
            "Responding to challenge {}... with client nonce {}...",
            log_prefix(&challenge.server_nonce),
            log_prefix(&client_nonce)
        );

        Ok(AuthRequest {
            server_nonce: challenge.server_nonce.clone(),
            client_nonce,
            hash,
        })
    }

    /// Sign `request` in place
    ///
    /// A client nonce is generated only when the request does not already
    /// carry one; the hash is always recomputed.
    pub fn complete(&self, request: &mut AuthRequest) -> Result<()> {
        if request.server_nonce.is_empty() {
            return Err(AuthError::InvalidChallenge);
        }

        if request.client_nonce.is_empty() {
            request.client_nonce = self.generator.generate();
        }

        request.hash = request.expected_hash(&self.secret);
        Ok(())
    }
}
