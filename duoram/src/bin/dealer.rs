//! Correlated-randomness dealer for the duoram service
//!
//! Pairs two triple requests of equal dimension and deals each side one
//! additive share of a fresh Beaver triple. Holds no secrets between
//! pairings; the transient waiting table is the only state.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

use clap::Parser;
use duoram::dealer::Dealer;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Dealer server configuration
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[clap(long, default_value = "0.0.0.0:9300")]
    listen: String,

    /// Seconds a lone request may wait for its peer before expiring
    #[clap(long, default_value_t = 30)]
    waiter_ttl_secs: u64,
}

/// Main entry point for the dealer
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let listener = TcpListener::bind(&cli.listen).await?;
    info!(addr = %listener.local_addr()?, "dealer listening");

    let dealer = Dealer::new(Duration::from_secs(cli.waiter_ttl_secs));
    dealer.serve(listener).await?;
    Ok(())
}
