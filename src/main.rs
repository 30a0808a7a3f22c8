use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use oracle_bridge::config::PRIVATE_KEY_ENV;
use oracle_bridge::crypto::Signer;
use oracle_bridge::inference::{load_model, PredictionCache, Signal};
use oracle_bridge::metrics::{self, BridgeMetrics};
use oracle_bridge::rpc::{HttpClient, LedgerClient};
use oracle_bridge::submitter::{confidence_percent, scale_prediction};
use oracle_bridge::types::U256;
use oracle_bridge::{Bridge, Config, InputDecoder};

#[derive(Parser)]
#[command(name = "oracle-bridge")]
#[command(about = "Serve on-chain prediction requests with an off-chain model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, default_value = "bridge.toml")]
    config: PathBuf,

    /// Log level; overrides the configuration file
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge loop until interrupted
    Run,

    /// Run the model on a feature vector, e.g. '[50, 750, 3]'
    Predict {
        /// JSON array of numbers
        input: String,

        /// Model file; defaults to the configured model
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Validate the configuration file
    CheckConfig,

    /// Show ledger and oracle account status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Predict { .. } if !cli.config.exists() => Config::default(),
        _ => Config::from_file(&cli.config)
            .with_context(|| format!("Invalid configuration {}", cli.config.display()))?,
    };

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run => run_bridge(config).await?,

        Commands::Predict { input, model } => {
            let path = model.unwrap_or_else(|| config.model.path.clone());
            predict(path, &input)?;
        }

        Commands::CheckConfig => {
            println!("Configuration {} is valid", cli.config.display());
            println!("  ledger:   {} (chain {})", config.ledger.rpc_url, config.ledger.chain_id);
            println!("  oracle:   {}", config.contract.oracle_address);
            println!("  requests: {}", config.contract.request_address());
            println!("  model:    {}", config.model.path.display());
        }

        Commands::Status => status(config).await?,
    }

    Ok(())
}

fn load_signer() -> Result<Signer> {
    let key = std::env::var(PRIVATE_KEY_ENV)
        .with_context(|| format!("{} must hold the oracle private key", PRIVATE_KEY_ENV))?;
    Signer::from_hex(&key).context("Invalid oracle private key")
}

fn connect(config: &Config) -> Result<Arc<dyn LedgerClient>> {
    let client = HttpClient::new(config.ledger.rpc_url.clone(), config.ledger.request_timeout())?;
    Ok(Arc::new(client))
}

async fn run_bridge(config: Config) -> Result<()> {
    info!("Starting oracle bridge v{}", oracle_bridge::VERSION);
    info!("Ledger endpoint: {}", config.ledger.rpc_url);

    let signer = load_signer()?;
    let ledger = connect(&config)?;
    let mut bridge = Bridge::from_config(&config, signer, ledger).await?;

    if config.metrics.enabled {
        let addr = config.metrics.listen_addr()?;
        let registry = Arc::new(BridgeMetrics::new()?);
        bridge = bridge.with_metrics(registry.clone());
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(addr, registry).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    bridge.run(shutdown_rx).await;
    Ok(())
}

fn predict(model: PathBuf, input: &str) -> Result<()> {
    let engine = load_model(&model).with_context(|| format!("Cannot load model {}", model.display()))?;
    let decoded = InputDecoder::new(false)
        .decode(input.as_bytes())
        .context("Input must be a JSON array of numbers")?;

    let mut cache = PredictionCache::new(engine);
    let inference = cache.infer(&decoded.vector)?;
    let value = inference.prediction.primary().unwrap_or_default();

    println!("Model:      {}", cache.engine().model_id());
    println!("Input:      {:?}", decoded.vector.as_slice());
    println!("Prediction: {:?}", inference.prediction.values);
    println!("Confidence: {:.2}%", inference.prediction.confidence);
    println!("Signal:     {}", Signal::from_prediction(value));
    println!(
        "On-chain:   scaled {} with confidence {}",
        scale_prediction(value),
        confidence_percent(inference.prediction.confidence)
    );
    Ok(())
}

async fn status(config: Config) -> Result<()> {
    let ledger = connect(&config)?;
    let chain_id = ledger.chain_id().await.context("Ledger unreachable")?;
    let head = ledger.block_number().await?;

    println!("Ledger:   {}", config.ledger.rpc_url);
    println!("Chain ID: {} (configured {})", chain_id, config.ledger.chain_id);
    println!("Head:     {}", head);
    println!("Oracle:   {}", config.contract.oracle_address);

    match load_signer() {
        Ok(signer) => {
            let balance = ledger.balance(signer.address()).await?;
            let nonce = ledger.transaction_count(signer.address()).await?;
            println!("Account:  {}", signer.address());
            println!("Balance:  {} ETH", format_ether(balance));
            println!("Nonce:    {}", nonce);
        }
        Err(e) => println!("Account:  unavailable ({})", e),
    }
    Ok(())
}

fn format_ether(wei: U256) -> String {
    let unit = U256::exp10(18);
    let micro = U256::exp10(12);
    format!("{}.{:06}", wei / unit, ((wei % unit) / micro).low_u64())
}
