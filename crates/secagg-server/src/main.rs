//! Secure Aggregation Server
//!
//! Hosts one aggregation session over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use secagg_coordinator::{Coordinator, SharedCoordinator};
use secagg_core::{Configuration, SaInt, DEFAULT_MODULUS, DEFAULT_THRESHOLD, DEFAULT_USERS};
use tracing::{info, Level};

/// Secure aggregation server CLI arguments
#[derive(Parser, Debug)]
#[command(name = "secagg-server")]
#[command(about = "Coordinator service for secure aggregation sessions")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "SECAGG_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Number of users expected to log in
    #[arg(short = 'n', long, env = "SECAGG_USERS", default_value_t = DEFAULT_USERS)]
    users: usize,

    /// Minimum number of surviving users
    #[arg(short, long, env = "SECAGG_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: usize,

    /// Modulus all values are reduced by
    #[arg(short, long, env = "SECAGG_MODULUS", default_value_t = DEFAULT_MODULUS)]
    modulus: u64,

    /// Key derivation salt (hex); random when omitted
    #[arg(long, env = "SECAGG_SALT")]
    salt: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let salt = match &args.salt {
        Some(salt) => hex::decode(salt).context("Invalid salt hex")?,
        None => {
            let mut salt = vec![0u8; 16];
            rand::thread_rng().fill_bytes(&mut salt);
            salt
        }
    };

    let config = Configuration::new(args.users, args.threshold, args.modulus, salt)
        .context("Invalid session configuration")?;
    let coordinator = Coordinator::<SaInt>::new(config)?;

    info!(
        listen = %args.listen,
        users = args.users,
        threshold = args.threshold,
        modulus = args.modulus,
        "Starting secure aggregation server"
    );

    let app = secagg_server::router(SharedCoordinator::new(coordinator));

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
