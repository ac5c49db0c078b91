//! Wrapped Alpha bridge - move wrapped subnet tokens between networks
//!
//! Resolves transfer parameters interactively, submits the LayerZero OFT
//! transfer and follows delivery on the LayerZero scan API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

mod chain;
mod commands;
mod config;
mod error;
mod resolve;
mod transfer;
mod ui;
mod wallet;
mod workflow;

use commands::Session;
use config::Settings;
use error::{BridgeError, BridgeResult};
use resolve::{BridgeArgs, TerminalPrompter};

#[derive(Parser)]
#[command(name = "wab", version, about = "A CLI interface for Wrapped Alpha")]
struct Cli {
    /// Configuration file (defaults to $WAB_CONFIG, then the built-in settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check account information
    #[command(alias = "a")]
    Account,

    /// Bridge Wrapped Alpha tokens between networks
    #[command(alias = "b")]
    Bridge {
        /// Netuid to use
        #[arg(long)]
        netuid: Option<String>,
        /// Chain to bridge from
        #[arg(long, alias = "fromChain")]
        from_chain: Option<String>,
        /// Chain to bridge to
        #[arg(long, alias = "toChain")]
        to_chain: Option<String>,
        /// Amount to bridge, or "all"
        #[arg(long)]
        amount: Option<String>,
        /// Destination address (defaults to your own)
        #[arg(long)]
        to: Option<String>,
    },

    /// Acquire Wrapped Alpha tokens with TAO
    #[command(alias = "w")]
    Wrap {
        #[arg(long)]
        netuid: Option<String>,
        #[arg(long)]
        amount: Option<String>,
    },

    /// Unwrap Wrapped Alpha tokens back to TAO
    #[command(alias = "u")]
    Unwrap {
        #[arg(long)]
        netuid: Option<String>,
        #[arg(long)]
        amount: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting wab v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(cli.config.as_deref())?;
    info!(
        "Loaded configuration for {} networks, {} bridgeable",
        settings.networks.len(),
        settings.bridgeable_chains().len()
    );

    let session = Session::open(settings).context("Failed to open wallet session")?;

    tokio::select! {
        result = run(&session, cli.command) => result.map_err(explain),
        _ = shutdown_signal() => {
            warn!("Interrupted");
            anyhow::bail!("Interrupted. A submitted transfer may still complete, check LayerZero Scan")
        }
    }
}

async fn run(session: &Session, command: Command) -> BridgeResult<()> {
    let mut prompter = TerminalPrompter::new();

    match command {
        Command::Account => commands::account::run(session).await?,
        Command::Bridge {
            netuid,
            from_chain,
            to_chain,
            amount,
            to,
        } => {
            let args = BridgeArgs {
                netuid,
                from_chain,
                to_chain,
                amount,
                to,
            };
            commands::bridge::run(session, &mut prompter, args).await?
        }
        Command::Wrap { netuid, amount } => {
            commands::wrap::wrap(session, &mut prompter, netuid.as_deref(), amount.as_deref())
                .await?;
        }
        Command::Unwrap { netuid, amount } => {
            commands::wrap::unwrap(session, &mut prompter, netuid.as_deref(), amount.as_deref())
                .await?
        }
    }

    Ok(())
}

/// Attach a hint for the error classes the user can act on
fn explain(err: BridgeError) -> anyhow::Error {
    if err.is_configuration() {
        anyhow::Error::new(err).context("Check the network and netuid configuration")
    } else if err.is_retryable() {
        anyhow::Error::new(err).context("RPC endpoint failed, retrying may succeed")
    } else {
        anyhow::Error::new(err)
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let crate_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,{}={}", env!("CARGO_CRATE_NAME"), crate_level))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
