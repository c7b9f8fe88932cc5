//! hashauth command-line tool
//!
//! Runs the shared-secret challenge-response flow in-process and exposes
//! the hash and random-string primitives for scripting.

mod options;

use anyhow::{bail, Context, Result};
use authconfig::AuthConfigFile;
use clap::{Parser, Subcommand};
use hashauth::{compute_hash, Client, RandomStringGenerator, Server};
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hashauth")]
#[command(about = "Shared-secret challenge-response authentication", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(
        short = 'c',
        long,
        env = "HASHAUTH_CONF",
        default_value = "/etc/hashauth/hashauth.conf"
    )]
    conf: String,

    /// Shared secret
    /// If not specified, will be read from the configuration file
    #[arg(long, env = "HASHAUTH_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate a client against a server in-process and print the token
    Demo {
        /// Secret used by the client (defaults to the server's)
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Print the response hash for a pair of nonces
    Hash {
        #[arg(long)]
        server_nonce: String,
        #[arg(long)]
        client_nonce: String,
    },
    /// Print a random string from the nonce alphabet
    Random {
        #[arg(short, long, default_value = "64")]
        length: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Demo { client_secret } => {
            let config_file = load_config(&cli.conf)?;
            let server_config = options::server_config(cli.secret.as_deref(), config_file.as_ref())?;
            let client_secret = client_secret.or(cli.secret);
            let client_config =
                options::client_config(client_secret.as_deref(), config_file.as_ref())?;

            run_demo(
                Server::new(server_config).context("Failed to create server")?,
                Client::new(client_config).context("Failed to create client")?,
            )
            .await?;
        }
        Commands::Hash {
            server_nonce,
            client_nonce,
        } => {
            let config_file = load_config(&cli.conf)?;
            let config = options::client_config(cli.secret.as_deref(), config_file.as_ref())?;
            println!("{}", compute_hash(&server_nonce, &client_nonce, &config.secret));
        }
        Commands::Random { length } => {
            println!("{}", RandomStringGenerator::default().generate_len(length));
        }
    }

    Ok(())
}

/// Parse the configuration file if it exists
fn load_config(path: &str) -> Result<Option<AuthConfigFile>> {
    if !Path::new(path).exists() {
        debug!("Configuration file not found: {}", path);
        return Ok(None);
    }

    debug!("Loading configuration from: {}", path);
    let config =
        AuthConfigFile::from_file(path).with_context(|| format!("Failed to parse {}", path))?;
    Ok(Some(config))
}

async fn run_demo(server: Server, client: Client) -> Result<()> {
    server.start().context("Failed to start server")?;
    let result = authenticate(&server, &client);
    server.shutdown().await;
    result
}

fn authenticate(server: &Server, client: &Client) -> Result<()> {
    let challenge = server.challenge();
    debug!("Challenge: {}", serde_json::to_string(&challenge)?);

    let request = client
        .respond(&challenge)
        .context("Failed to answer challenge")?;

    let token = server.verify(&request).context("Authentication failed")?;
    info!("Authenticated");
    println!("{}", serde_json::to_string_pretty(&token)?);

    let authorization = server.validate(&token.value);
    println!("token: {}", authorization);

    let junk = RandomStringGenerator::default().generate_len(token.value.len());
    println!("junk token: {}", server.validate(&junk));

    if !authorization.is_authorized() {
        bail!("Issued token was not accepted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashauth::{ClientConfig, Secret, ServerConfig};

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "hashauth",
            "--secret",
            "abc123",
            "hash",
            "--server-nonce",
            "s",
            "--client-nonce",
            "c",
        ])
        .unwrap();
        assert_eq!(cli.secret.as_deref(), Some("abc123"));
        assert!(matches!(cli.command, Commands::Hash { .. }));

        let cli = Cli::try_parse_from(["hashauth", "random", "-l", "12"]).unwrap();
        assert!(matches!(cli.command, Commands::Random { length: 12 }));
    }

    #[tokio::test]
    async fn test_malformed_config_only_affects_commands_that_read_it() {
        let path = std::env::temp_dir().join(format!("hashauth-bad-{}.conf", std::process::id()));
        std::fs::write(&path, "[server\nsecret = abc123\n").unwrap();
        let conf = path.to_str().unwrap();

        assert!(load_config(conf).is_err());

        let cli = Cli::try_parse_from(["hashauth", "-c", conf, "random", "-l", "8"]).unwrap();
        assert!(run(cli).await.is_ok());

        let cli = Cli::try_parse_from([
            "hashauth",
            "-c",
            conf,
            "--secret",
            "abc123",
            "hash",
            "--server-nonce",
            "s",
            "--client-nonce",
            "c",
        ])
        .unwrap();
        assert!(run(cli).await.is_err());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_config_is_optional() {
        assert!(load_config("/nonexistent/hashauth.conf").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_demo() {
        let server = Server::new(ServerConfig::new("abc123")).unwrap();
        let client = Client::new(ClientConfig::new("abc123")).unwrap();
        assert!(run_demo(server, client).await.is_ok());
    }

    #[tokio::test]
    async fn test_demo_wrong_secret() {
        let server = Server::new(ServerConfig::new("jk3434")).unwrap();
        let client = Client::new(ClientConfig::new(Secret::from("abc123"))).unwrap();
        let err = run_demo(server, client).await.unwrap_err();
        assert!(err.to_string().contains("Authentication failed"));
    }
}
