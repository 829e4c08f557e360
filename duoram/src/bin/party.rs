//! A duoram party process
//!
//! Holds one additive share of the memory vector, serves client writes and
//! secure reads, and cooperates with its peer over the residual channel.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

use anyhow::ensure;
use clap::Parser;
use duoram::party::{Party, PartyConfig};
use duoram::Role;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Party server configuration
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Role label, A or B
    #[clap(long, value_enum)]
    role: Role,

    /// Number of logical rows in the shared memory
    #[clap(long)]
    rows: u32,

    /// Client-facing listen address
    #[clap(long, default_value = "0.0.0.0:9700")]
    listen: String,

    /// Port of the residual listener, bound on the same host as `--listen`
    #[clap(long, default_value_t = 9701)]
    peer_listen: u16,

    /// Address of the peer's residual listener
    #[clap(long, default_value = "127.0.0.1:9801")]
    peer: String,

    /// Address of the dealer
    #[clap(long, default_value = "127.0.0.1:9300")]
    share: String,

    /// Seconds a read may wait for the dealer to pair its triple request
    #[clap(long, default_value_t = 30)]
    dealer_timeout_secs: u64,
}

/// Main entry point for a party
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    ensure!(cli.rows > 0, "--rows must be at least 1");

    let user_listener = TcpListener::bind(&cli.listen).await?;
    let host = cli.listen.rsplit_once(':').map(|(host, _)| host).unwrap_or("0.0.0.0");
    let peer_listener = TcpListener::bind((host, cli.peer_listen)).await?;

    let party = Party::new(
        PartyConfig {
            role: cli.role,
            rows: cli.rows,
            peer: cli.peer,
            dealer: cli.share,
            dealer_timeout: Duration::from_secs(cli.dealer_timeout_secs),
        },
        user_listener,
        peer_listener,
    );
    info!(user = %party.user_addr()?, residual = %party.peer_addr()?, "party listening");
    party.serve().await?;
    Ok(())
}
