//! Random string generation for nonces and tokens

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Alphabet every nonce and token is drawn from
pub const NONCE_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length used when a generator is built with size 0
pub const DEFAULT_SIZE: usize = 64;

/// Fixed-length random strings over [`NONCE_CHARSET`]
///
/// Backed by `StdRng` seeded from OS entropy, a cryptographically secure
/// generator. The rng sits behind a mutex so a single generator can be
/// shared by concurrent request handlers.
#[derive(Debug)]
pub struct RandomStringGenerator {
    rng: Mutex<StdRng>,
    size: usize,
}

impl RandomStringGenerator {
    /// Create a generator producing strings of `size` characters
    pub fn new(size: usize) -> Self {
        Self::with_rng(size, StdRng::from_entropy())
    }

    /// Deterministic generator, for tests
    pub fn seeded(size: usize, seed: u64) -> Self {
        Self::with_rng(size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(size: usize, rng: StdRng) -> Self {
        let size = if size > 0 {
            debug!("Using configured random string size {}", size);
            size
        } else {
            debug!("Using default random string size {}", DEFAULT_SIZE);
            DEFAULT_SIZE
        };

        Self {
            rng: Mutex::new(rng),
            size,
        }
    }

    /// Configured output length
    pub fn size(&self) -> usize {
        self.size
    }

    /// Generate a string of the configured length
    pub fn generate(&self) -> String {
        self.generate_len(self.size)
    }

    /// Generate a string of exactly `len` characters
    pub fn generate_len(&self, len: usize) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..len)
            .map(|_| NONCE_CHARSET[rng.gen_range(0..NONCE_CHARSET.len())] as char)
            .collect()
    }
}

impl Default for RandomStringGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}
