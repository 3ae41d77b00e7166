//! `custody` command line: derive addresses, read balances, sweep deposits.
//!
//! Results go to stdout as JSON; logs go to stderr.
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use hd_custody::{CustodyConfig, CustodyService, Network};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "custody")]
#[command(about = "HD deposit addresses, balances and sweeps")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the deposit address for a user index (canonical scheme only)
    Derive {
        #[arg(long)]
        network: Network,
        #[arg(long)]
        index: u32,
        /// Also print the hex private key
        #[arg(long)]
        show_private_key: bool,
    },
    /// Read balances, e.g. `btc:bc1q... sol:9xQe...`
    Balance {
        #[arg(required = true, value_parser = parse_query)]
        queries: Vec<(Network, String)>,
    },
    /// Sweep a BTC deposit address into the configured treasury
    Sweep {
        #[arg(long, default_value = "btc")]
        network: Network,
        #[arg(long)]
        index: u32,
    },
    /// Find which scheme and index produced an address, legacy schemes included (never sweeps)
    Locate {
        #[arg(long)]
        network: Network,
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = 100)]
        max_index: u32,
    },
}

fn parse_query(s: &str) -> Result<(Network, String), String> {
    let (tag, address) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NETWORK:ADDRESS, got '{}'", s))?;
    let network = tag.parse::<Network>().map_err(|e| e.to_string())?;
    if address.is_empty() {
        return Err(format!("missing address in '{}'", s));
    }
    Ok((network, address.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    info!("Starting custody v{}", env!("CARGO_PKG_VERSION"));

    let config = CustodyConfig::load().context("failed to load configuration")?;
    let service = CustodyService::from_env(config).context("failed to start custody service")?;

    match args.command {
        Commands::Derive {
            network,
            index,
            show_private_key,
        } => {
            let key = service.derive_key(network, index)?;
            let mut out = json!({
                "network": key.network,
                "index": key.index,
                "path": key.path,
                "address": key.address,
            });
            if show_private_key {
                out["private_key_hex"] = json!(key.private_key_hex.as_str());
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Balance { queries } => {
            for reading in service.read_balances(&queries).await {
                println!("{}", serde_json::to_string(&reading)?);
            }
        }
        Commands::Sweep { network, index } => {
            let report = service.sweep(network, index).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Locate {
            network,
            address,
            max_index,
        } => {
            let hits = service.locate(network, &address, max_index)?;
            if hits.is_empty() {
                return Err(anyhow!("{} not found in indices 0..={}", address, max_index));
            }
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=info,reqwest=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
