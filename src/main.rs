//! Bundler CLI
//!
//! Drives the bundle engine and volume sessions from the command line.
//! Results are printed to stdout as JSON; logs go to stderr.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bundler::config::Config;
use bundler::endpoints;
use bundler::notify::Notifier;
use bundler::tx_builder::lamports_from_sol;
use bundler::types::{success_count, BatchResult, WalletExport};
use bundler::volume::{VolumeRunner, VolumeSession};
use bundler::{Address, BundleEngine, JsonRpcClient, JupiterClient, Keypair};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "bundler.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Metrics port (overrides the configuration file)
    #[arg(long)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate keypairs and print them as JSON
    Keygen {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Print the address of a base58 private key
    Address {
        #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
        key: String,
    },

    /// Transfer SOL from the source key
    Transfer {
        #[arg(long)]
        to: String,

        #[arg(long)]
        sol: f64,

        #[arg(long, env = "SOURCE_PRIVATE_KEY", hide_env_values = true)]
        source_key: String,
    },

    /// Generate a session, fund it, buy and optionally sell
    Bundle {
        /// Mint of the asset to buy
        #[arg(long)]
        asset: String,

        #[arg(long)]
        sol_per_wallet: f64,

        /// Fixed buy amount per wallet; defaults to balance minus fee reserve
        #[arg(long)]
        buy_sol: Option<f64>,

        /// Sell everything after buying
        #[arg(long)]
        sell: bool,

        /// Wallet count (defaults to the configured session size)
        #[arg(long)]
        wallets: Option<usize>,

        #[arg(long, env = "SOURCE_PRIVATE_KEY", hide_env_values = true)]
        source_key: String,
    },

    /// Run buy-then-sell cycles from one wallet until Ctrl-C
    Volume {
        #[arg(long)]
        asset: String,

        #[arg(long)]
        trade_sol: f64,

        #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.json_logs)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting bundler");

    let config = load_config(&args.config)?;
    config.validate().context("Invalid configuration")?;

    match args.command {
        Command::Keygen { count } => {
            let wallets: Vec<WalletExport> = (0..count)
                .map(|index| {
                    let keypair = Keypair::generate();
                    WalletExport {
                        index,
                        public_key: keypair.address(),
                        private_key: keypair.to_base58().as_str().to_owned(),
                    }
                })
                .collect();
            print_json(&wallets)?;
        }

        Command::Address { key } => {
            let keypair = Keypair::from_base58(key.trim()).context("Invalid private key")?;
            println!("{}", keypair.address());
        }

        Command::Transfer {
            to,
            sol,
            source_key,
        } => {
            let engine = build_engine(&config)?;
            let source = Keypair::from_base58(source_key.trim()).context("Invalid source key")?;
            let recipient: Address = to.parse().context("Invalid recipient address")?;
            let lamports = lamports_from_sol(sol)?;
            let signature = engine
                .executor()
                .transfer(&source, &recipient, lamports)
                .await?;
            println!("{}", signature);
        }

        Command::Bundle {
            asset,
            sol_per_wallet,
            buy_sol,
            sell,
            wallets,
            source_key,
        } => {
            start_metrics(&config, args.metrics_port);
            let engine = build_engine(&config)?;
            run_bundle(&engine, &asset, sol_per_wallet, buy_sol, sell, wallets, &source_key)
                .await?;
        }

        Command::Volume {
            asset,
            trade_sol,
            key,
        } => {
            start_metrics(&config, args.metrics_port);
            let engine = build_engine(&config)?;
            run_volume(&config, &engine, &asset, trade_sol, &key).await?;
        }
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "bundler=debug,info"
    } else {
        "bundler=info,warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!(path, "Config file not found, using defaults");
        let mut config = Config::default();
        dotenvy::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}

fn start_metrics(config: &Config, port_override: Option<u16>) {
    if !config.monitoring.enable_metrics {
        return;
    }
    let port = port_override.unwrap_or(config.monitoring.metrics_port);
    tokio::spawn(async move {
        if let Err(e) = endpoints::endpoint_server(port).await {
            error!(error = %e, "Metrics server error");
        }
    });
}

fn build_engine(config: &Config) -> Result<BundleEngine> {
    info!(
        rpc_endpoints = config.rpc.endpoints.len(),
        swap_endpoints = config.swap.endpoints.len(),
        "Initializing clients"
    );
    let rpc = Arc::new(JsonRpcClient::new(config.rpc_client_config())?);
    let swap = Arc::new(JupiterClient::new(config.swap_client_config())?);
    let notifier = Notifier::new(config.notifications.webhook_url.clone());
    Ok(BundleEngine::new(rpc, swap, config.engine_config(), notifier)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(stage: &str, results: &[BatchResult]) -> Result<()> {
    info!(
        stage,
        succeeded = success_count(results),
        total = results.len(),
        "Stage finished"
    );
    print_json(&serde_json::json!({ "stage": stage, "results": results }))
}

async fn run_bundle(
    engine: &BundleEngine,
    asset: &str,
    sol_per_wallet: f64,
    buy_sol: Option<f64>,
    sell: bool,
    wallets: Option<usize>,
    source_key: &str,
) -> Result<()> {
    let count = wallets.unwrap_or(engine.config().wallets_per_session);
    let generated = engine.generate_wallets(count)?;
    let session_id = generated.session_id;
    print_json(&generated)?;

    let funded = engine
        .fund_wallets(session_id, source_key, sol_per_wallet)
        .await?;
    report("fund", &funded)?;

    let bought = engine.buy_asset(session_id, asset, buy_sol).await?;
    report("buy", &bought)?;

    if sell {
        let sold = engine.sell_all(session_id).await?;
        report("sell", &sold)?;
    }

    print_json(&engine.session(session_id)?)
}

async fn run_volume(
    config: &Config,
    engine: &BundleEngine,
    asset: &str,
    trade_sol: f64,
    key: &str,
) -> Result<()> {
    let wallet = Keypair::from_base58(key.trim()).context("Invalid private key")?;
    let asset: Address = asset.parse().context("Invalid asset address")?;

    let session = Arc::new(VolumeSession::new(
        engine.executor().clone(),
        config.volume.clone(),
        Notifier::new(config.notifications.webhook_url.clone()),
        wallet,
        asset,
    )?);
    session.set_trade_size(trade_sol)?;
    session.start().await?;

    let runner = VolumeRunner::new(&config.volume);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");
    };
    let totals = runner.run_until(session, shutdown).await;

    print_json(&totals)
}
