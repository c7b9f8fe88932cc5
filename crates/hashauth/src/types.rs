//! Payload types carried between the client and server roles
//!
//! Field names on the wire are camelCase: `serverNonce`, `clientNonce`,
//! `hash`, `token` and `expiresAt`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

/// Pre-shared secret known to both roles
///
/// Never serialized, and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Challenge issued by the server: a fresh server nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub server_nonce: String,
}

/// Completed authentication request returned by the client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub server_nonce: String,
    pub client_nonce: String,
    /// Lowercase hex SHA-256 of `server_nonce + client_nonce + secret`
    pub hash: String,
}

impl AuthRequest {
    /// Request for a challenge, with no client nonce or hash yet
    pub fn from_challenge(challenge: &Challenge) -> Self {
        Self {
            server_nonce: challenge.server_nonce.clone(),
            ..Default::default()
        }
    }

    /// Hash this request's nonces with `secret`
    pub fn expected_hash(&self, secret: &Secret) -> String {
        compute_hash(&self.server_nonce, &self.client_nonce, secret)
    }

    /// Constant-time comparison of the carried hash against `expected`
    pub fn hash_matches(&self, expected: &str) -> bool {
        self.hash.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

/// Session token minted after a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub value: String,
    /// Wall-clock expiry, seconds since the Unix epoch
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

/// Outcome of validating a presented token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    Unauthorized,
}

impl Authorization {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Authorization::Authorized)
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Authorized => f.write_str("Authorized"),
            Authorization::Unauthorized => f.write_str("Unauthorized"),
        }
    }
}

/// `hex(SHA-256(server_nonce || client_nonce || secret))`, no delimiters
pub fn compute_hash(server_nonce: &str, client_nonce: &str, secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_nonce.as_bytes());
    hasher.update(client_nonce.as_bytes());
    hasher.update(secret.expose().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_known_value() {
        // sha256("abc") split across the three inputs
        let hash = compute_hash("a", "b", &Secret::from("c"));
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_compute_hash_order_matters() {
        let secret = Secret::from("abc123");
        assert_ne!(
            compute_hash("N", "C", &secret),
            compute_hash("C", "N", &secret)
        );
    }

    #[test]
    fn test_hash_matches() {
        let secret = Secret::from("abc123");
        let mut request = AuthRequest {
            server_nonce: "server".into(),
            client_nonce: "client".into(),
            hash: String::new(),
        };
        let expected = request.expected_hash(&secret);
        assert!(!request.hash_matches(&expected));

        request.hash = expected.clone();
        assert!(request.hash_matches(&expected));
        assert!(!request.hash_matches(&expected[1..]));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::from("abc123");
        assert!(!format!("{:?}", secret).contains("abc123"));
    }

    #[test]
    fn test_wire_field_names() {
        let request = AuthRequest {
            server_nonce: "n".into(),
            client_nonce: "c".into(),
            hash: "h".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["serverNonce"], "n");
        assert_eq!(json["clientNonce"], "c");
        assert_eq!(json["hash"], "h");

        let token = Token {
            value: "t".into(),
            expires_at: 42,
        };
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["token"], "t");
        assert_eq!(json["expiresAt"], 42);

        let challenge: Challenge = serde_json::from_str(r#"{"serverNonce":"abc"}"#).unwrap();
        assert_eq!(challenge.server_nonce, "abc");
    }

    #[test]
    fn test_authorization_display() {
        assert_eq!(Authorization::Authorized.to_string(), "Authorized");
        assert_eq!(Authorization::Unauthorized.to_string(), "Unauthorized");
        assert!(Authorization::Authorized.is_authorized());
        assert!(!Authorization::Unauthorized.is_authorized());
    }
}
