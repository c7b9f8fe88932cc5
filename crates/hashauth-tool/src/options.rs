//! Mapping from the configuration file onto the role configurations

use anyhow::{Context, Result};
use authconfig::{define_options, AuthConfigFile, Count, Duration, GLOBAL_SECTION};
use hashauth::{
    ClientConfig, NoncePolicy, Secret, ServerConfig, DEFAULT_CLEANUP_INTERVAL,
    DEFAULT_NONCE_LIFETIME, DEFAULT_NONCE_SIZE, DEFAULT_TOKEN_LIFETIME, DEFAULT_TOKEN_SIZE,
};

pub const SERVER_SECTION: &str = "server";
pub const CLIENT_SECTION: &str = "client";

define_options! {
    /// Tunables read from `[server]` then `[global]`
    pub struct ServerOptions {
        nonce_lifetime: Duration = Duration(DEFAULT_NONCE_LIFETIME),
        token_lifetime: Duration = Duration(DEFAULT_TOKEN_LIFETIME),
        cleanup_interval: Duration = Duration(DEFAULT_CLEANUP_INTERVAL),
        nonce_size: Count = Count(DEFAULT_NONCE_SIZE as u64),
        token_size: Count = Count(DEFAULT_TOKEN_SIZE as u64),
        /// Retire each server nonce on its first successful verification
        single_use_nonce: bool = false,
    }
}

define_options! {
    /// Tunables read from `[client]` then `[global]`
    pub struct ClientOptions {
        client_nonce_size: Count = Count(DEFAULT_NONCE_SIZE as u64),
    }
}

/// Resolve a role's secret: explicit value first, then the file
fn resolve_secret(
    explicit: Option<&str>,
    file: Option<&AuthConfigFile>,
    section: &str,
) -> Result<Secret> {
    if let Some(secret) = explicit.filter(|s| !s.is_empty()) {
        return Ok(Secret::from(secret));
    }

    let file = file.context("No secret given. Use --secret, HASHAUTH_SECRET or a config file")?;
    let secret = file
        .secret(section)
        .with_context(|| format!("No secret in [{}] or [{}]", section, GLOBAL_SECTION))?;
    Ok(Secret::new(secret))
}

fn to_usize(count: Count, name: &str) -> Result<usize> {
    usize::try_from(count.0).with_context(|| format!("{} is too large", name))
}

pub fn server_config(explicit: Option<&str>, file: Option<&AuthConfigFile>) -> Result<ServerConfig> {
    let secret = resolve_secret(explicit, file, SERVER_SECTION)?;
    let options = match file {
        Some(file) => ServerOptions::from_config(file, &[SERVER_SECTION, GLOBAL_SECTION])
            .context("Invalid [server] options")?,
        None => ServerOptions::default(),
    };

    Ok(ServerConfig {
        secret,
        nonce_lifetime: options.nonce_lifetime.0,
        token_lifetime: options.token_lifetime.0,
        cleanup_interval: options.cleanup_interval.0,
        nonce_size: to_usize(options.nonce_size, "nonce_size")?,
        token_size: to_usize(options.token_size, "token_size")?,
        nonce_policy: if options.single_use_nonce {
            NoncePolicy::SingleUse
        } else {
            NoncePolicy::MultiUse
        },
    })
}

pub fn client_config(explicit: Option<&str>, file: Option<&AuthConfigFile>) -> Result<ClientConfig> {
    let secret = resolve_secret(explicit, file, CLIENT_SECTION)?;
    let options = match file {
        Some(file) => ClientOptions::from_config(file, &[CLIENT_SECTION, GLOBAL_SECTION])
            .context("Invalid [client] options")?,
        None => ClientOptions::default(),
    };

    Ok(ClientConfig {
        secret,
        client_nonce_size: to_usize(options.client_nonce_size, "client_nonce_size")?,
    })
}
