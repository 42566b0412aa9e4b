//! VitalRisk Trainer CLI
//!
//! Trains the at-risk classifier and writes model, hash, metrics and
//! evaluation report into the artifact directory.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vitalrisk_trainer::{render_summary, run_training, SyntheticProfile, TrainRequest};

#[derive(Parser, Debug)]
#[command(name = "vitalrisk-train")]
#[command(author = "VitalRisk Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train the VitalRisk at-risk classifier", long_about = None)]
struct Args {
    /// Data source: synthetic, csv or db
    #[arg(long, default_value = "synthetic")]
    source: String,

    /// Training CSV (with --source csv); must include an at_risk column
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Keep at most this many rows
    #[arg(long)]
    limit: Option<usize>,

    /// Rows to generate for the synthetic source
    #[arg(long, default_value = "2000")]
    rows: usize,

    /// Synthetic profile: vitals or activity
    #[arg(long, default_value = "vitals")]
    profile: SyntheticProfile,

    /// Seed for synthetic generation and the train/held-out split
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Reference cutoff for reported metrics (defaults to the configured threshold)
    #[arg(long)]
    threshold: Option<f64>,

    /// Artifact output directory (overrides configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("VitalRisk Trainer v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");

    let request = TrainRequest {
        source: args.source,
        csv: args.csv,
        limit: args.limit,
        rows: args.rows,
        profile: args.profile,
        seed: args.seed,
        threshold: args.threshold,
        output: args.output,
        config: args.config,
    };
    let summary = run_training(&request).context("Training failed")?;

    info!("═══════════════════════════════════════════");
    render_summary(&summary, &mut std::io::stdout().lock()).context("Failed to print summary")?;

    Ok(())
}
