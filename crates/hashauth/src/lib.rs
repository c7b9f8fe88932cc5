//! Shared-secret challenge-response authentication
//!
//! A server issues a single-use nonce, the client proves knowledge of a
//! pre-shared secret by hashing that nonce together with a nonce of its
//! own and the secret, and the server verifies the hash before issuing a
//! short-lived opaque token that stands in for re-authentication.
//!
//! # Features
//!
//! - Time-bounded nonce and token registries with lazy expiry on read and
//!   a background janitor per registry
//! - SHA-256 proof of secret knowledge, hex encoded, compared in constant time
//! - Multi-use or single-use server nonces
//! - Transport-neutral payload types with serde support
//!
//! # Example
//!
//! ```rust,no_run
//! use hashauth::{Authorization, Client, ClientConfig, Server, ServerConfig};
//!
//! # async fn run() -> hashauth::Result<()> {
//! let server = Server::new(ServerConfig::new("abc123"))?;
//! server.start()?;
//!
//! let client = Client::new(ClientConfig::new("abc123"))?;
//!
//! let challenge = server.challenge();
//! let request = client.respond(&challenge)?;
//! let token = server.verify(&request)?;
//!
//! assert_eq!(server.validate(&token.value), Authorization::Authorized);
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod nonce;
pub mod random;
pub mod server;
pub mod store;
pub mod token;
pub mod types;

pub use client::*;
pub use error::*;
pub use nonce::*;
pub use random::*;
pub use server::*;
pub use store::{ExpiringStore, DEFAULT_CLEANUP_INTERVAL, MAX_TTL};
pub use token::*;
pub use types::*;
