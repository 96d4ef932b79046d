use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroize;

use lumino_node::chain::{ContractAddresses, LedgerClient, LocalSigner};
use lumino_node::config::Config;
use lumino_node::decoder::ContractErrorDecoder;
use lumino_node::node::{known_node_id, register, NodeStore};
use lumino_node::orchestrator::EpochOrchestrator;
use lumino_node::workload::ConfiguredWorkload;

#[derive(Parser)]
#[command(name = "lumino-node")]
#[command(about = "Lumino compute node client", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Node id assigned at registration; saved to the data directory
        #[arg(long)]
        node_id: Option<u64>,

        /// Hex private key of the node account
        #[arg(long, env = "NODE_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,

        /// Register with this compute rating when no node id is known yet
        #[arg(long)]
        compute_rating: Option<u64>,

        /// Stop after one processed epoch
        #[arg(long)]
        once: bool,
    },

    /// Stake and register the node account, saving the assigned id
    Register {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Hex private key of the node account
        #[arg(long, env = "NODE_PRIVATE_KEY", hide_env_values = true)]
        private_key: Option<String>,

        /// Compute rating to register with; falls back to node.compute_rating
        #[arg(long)]
        compute_rating: Option<u64>,
    },

    /// Generate a default configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },

    /// Decode a contract revert payload
    Decode {
        /// Hex revert data, optionally prefixed with 0x or "execution reverted: "
        payload: String,
    },

    /// List the known contract errors and their selectors
    Selectors,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumino_node=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, node_id, private_key, compute_rating, once } => {
            run_node(&config, node_id, private_key, compute_rating, once).await?;
        }
        Commands::Register { config, private_key, compute_rating } => {
            register_node(&config, private_key, compute_rating).await?;
        }
        Commands::Init { output } => {
            let config = Config::default();
            config.save(&output)?;
            info!("Configuration file created at: {}", output);
        }
        Commands::Decode { payload } => {
            let decoder = ContractErrorDecoder::new()?;
            info!("{}", decoder.decode(&payload));
        }
        Commands::Selectors => {
            let decoder = ContractErrorDecoder::new()?;
            for (selector, definition) in decoder.definitions() {
                info!("0x{}  {}", hex::encode(selector), definition.signature());
            }
        }
    }

    Ok(())
}

fn load_signer(private_key: Option<String>) -> Result<LocalSigner> {
    let mut private_key = private_key.ok_or_else(|| anyhow!("NODE_PRIVATE_KEY is not set"))?;
    let signer = LocalSigner::from_hex(&private_key);
    private_key.zeroize();
    signer.context("Invalid NODE_PRIVATE_KEY")
}

async fn connect(config: &Config, signer: LocalSigner) -> Result<LedgerClient> {
    let contracts = ContractAddresses::from_config(&config.contracts)?;
    info!("Node address: {}", signer.address());

    let client = LedgerClient::new(config.chain.client_config(), contracts, signer)?;
    client
        .connect()
        .await
        .with_context(|| format!("Cannot reach ledger at {}", config.chain.rpc_url))?;
    Ok(client)
}

async fn register_node(config_path: &str, private_key: Option<String>, compute_rating: Option<u64>) -> Result<()> {
    let config = Config::load(config_path)?;
    let compute_rating = compute_rating
        .or(config.node.compute_rating)
        .ok_or_else(|| anyhow!("No compute rating: pass --compute-rating or set node.compute_rating"))?;

    let store = NodeStore::new(&config.node.data_dir);
    if let Some(node_id) = known_node_id(None, config.node.node_id, &store)? {
        info!("Node already registered with ID: {}", node_id);
        return Ok(());
    }

    let client = connect(&config, load_signer(private_key)?).await?;
    register(&client, compute_rating, &store).await?;
    Ok(())
}

async fn run_node(
    config_path: &str,
    node_id: Option<u64>,
    private_key: Option<String>,
    compute_rating: Option<u64>,
    once: bool,
) -> Result<()> {
    let config = Config::load(config_path)?;

    let decoder = Arc::new(ContractErrorDecoder::new()?);
    info!("Loaded {} contract error definitions", decoder.len());

    let signer = load_signer(private_key)?;
    let store = NodeStore::new(&config.node.data_dir);
    let known = known_node_id(node_id, config.node.node_id, &store)?;
    let client = connect(&config, signer).await?;

    let node_id = match (known, compute_rating.or(config.node.compute_rating)) {
        (Some(node_id), _) => node_id,
        (None, Some(rating)) => register(&client, rating, &store).await?,
        (None, None) => {
            return Err(anyhow!(
                "No node id configured: pass --node-id, set node.node_id, or pass --compute-rating to register ({})",
                store.path().display()
            ))
        }
    };
    info!("Node ID: {}", node_id);

    let workload = ConfiguredWorkload::from_config(&config.workload)?;

    let mut orchestrator_config = config.orchestrator.orchestrator_config();
    orchestrator_config.bounded |= once;

    let mut orchestrator = EpochOrchestrator::new(client, node_id, workload, decoder, orchestrator_config);
    orchestrator.run().await?;
    Ok(())
}
