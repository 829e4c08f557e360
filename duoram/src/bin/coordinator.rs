//! Client coordinator for the duoram service
//!
//! Splits each request into two additive shares, dispatches one share to
//! each party in parallel, and reconstructs read results by summing the
//! returned shares.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

use anyhow::{bail, ensure};
use clap::{Parser, ValueEnum};
use duoram::{coordinator, strings};
use tracing_subscriber::EnvFilter;

/// Request kind
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Op {
    /// Accumulate an integer at an index
    Write,
    /// Reconstruct the integer at an index
    Read,
    /// Store a text slot in a striped memory
    WriteStr,
    /// Load a text slot from a striped memory
    ReadStr,
}

/// Coordinator configuration
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Operation to run
    #[clap(long, value_enum)]
    op: Op,

    /// Number of logical rows (for text ops: number of text slots)
    #[clap(long)]
    dim: u32,

    /// Target index
    #[clap(long)]
    idx: u32,

    /// Integer value for `write`
    #[clap(long, default_value_t = 0)]
    val: i64,

    /// Text value for `write-str`
    #[clap(long)]
    text: Option<String>,

    /// Address of party A
    #[clap(long)]
    c0: String,

    /// Address of party B
    #[clap(long)]
    c1: String,
}

/// Main entry point for the coordinator
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    ensure!(cli.idx < cli.dim, "idx < dim required");

    match cli.op {
        Op::Write => {
            coordinator::write(&cli.c0, &cli.c1, cli.dim, cli.idx, cli.val).await?;
            println!("WRITE idx={} value={}", cli.idx, cli.val);
        },
        Op::Read => {
            let value = coordinator::read(&cli.c0, &cli.c1, cli.dim, cli.idx).await?;
            println!("READ idx={} -> {}", cli.idx, value);
        },
        Op::WriteStr => {
            let Some(text) = cli.text.as_deref() else {
                bail!("--text is required for write-str");
            };
            strings::put(&cli.c0, &cli.c1, cli.dim, cli.idx, text).await?;
            println!("WRITE idx={} value={}", cli.idx, text);
        },
        Op::ReadStr => {
            let text = strings::get(&cli.c0, &cli.c1, cli.dim, cli.idx).await?;
            println!("READ idx={} -> {}", cli.idx, text);
        },
    }
    Ok(())
}
