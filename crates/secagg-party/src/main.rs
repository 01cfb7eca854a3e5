//! SecAgg Party CLI
//!
//! Command-line participant for secure aggregation sessions:
//! - Contribute a value to a session
//! - Close the server's current collection phase
//! - Inspect session status

use anyhow::Result;
use clap::{Parser, Subcommand};
use secagg_client::HttpTransport;
use secagg_core::{run_session, Participant, SaInt};
use std::time::Duration;
use tracing::{info, Level};

/// SecAgg Party - secure aggregation participant
#[derive(Parser)]
#[command(name = "secagg-party")]
#[command(about = "Secure aggregation participant")]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "SECAGG_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "SECAGG_TIMEOUT", default_value = "30")]
    timeout_secs: u64,

    /// Milliseconds between polls while a phase is open
    #[arg(long, env = "SECAGG_POLL_MS", default_value = "250")]
    poll_ms: u64,

    /// Polls before giving up on a phase
    #[arg(long, env = "SECAGG_POLL_ATTEMPTS", default_value = "1200")]
    poll_attempts: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a session and contribute a value
    Run {
        /// Private value to aggregate
        #[arg(short, long)]
        value: u64,
    },

    /// Close the collection phase that is currently open
    Finish,

    /// Show session status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let transport = HttpTransport::new(&cli.server)
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_poll_interval(Duration::from_millis(cli.poll_ms))
        .with_poll_attempts(cli.poll_attempts);

    match cli.command {
        Commands::Run { value } => run(&transport, value).await?,
        Commands::Finish => {
            let phase = transport.finish().await?;
            println!("Phase: {}", phase);
        }
        Commands::Status => {
            let status = transport.status::<SaInt>().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

async fn run(transport: &HttpTransport, value: u64) -> Result<()> {
    info!(server = transport.url(), "Joining session");

    let mut participant = Participant::new(SaInt(value));

    let mut progress = participant.subscribe();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            info!(status = progress.borrow().name(), "Progress");
        }
    });

    let sum = run_session(&mut participant, transport).await?;

    info!(%sum, "Session finished");
    println!("Aggregate: {}", sum);

    Ok(())
}
