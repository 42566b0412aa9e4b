//! VitalRisk scoring service

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use vitalrisk_core::{ArtifactStore, RiskConfig, Scorer};
use vitalrisk_service::{serve, AppState};

#[derive(Parser, Debug)]
#[command(name = "vitalrisk-service")]
#[command(author = "VitalRisk Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve VitalRisk predictions over HTTP", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact directory (overrides configuration)
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Bind host (overrides configuration)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides configuration)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = RiskConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = args.artifacts {
        config.artifacts.dir = dir;
    }
    if let Some(host) = args.host {
        config.service.host = host;
    }
    if let Some(port) = args.port {
        config.service.port = port;
    }

    info!("VitalRisk Service v{}", env!("CARGO_PKG_VERSION"));
    let store = ArtifactStore::new(config.artifacts.clone());
    let scorer = Scorer::from_store(&store, config.default_threshold)
        .context("Failed to load model artifacts")?;

    serve(AppState::new(Arc::new(scorer)), &config.service.bind_addr()).await?;
    info!("VitalRisk Service stopped");
    Ok(())
}

fn init_logging() {
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
