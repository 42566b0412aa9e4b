//! One-shot inference from the command line

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use vitalrisk_service::{exit_code, render_outcome, run_prediction, PredictRequest};

#[derive(Parser, Debug)]
#[command(name = "vitalrisk-predict")]
#[command(author = "VitalRisk Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score one JSON payload with a trained VitalRisk model", long_about = None)]
struct Args {
    /// Model artifact (defaults to the configured artifact directory)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Metrics artifact (defaults to the configured artifact directory)
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// JSON object with feature values
    #[arg(long)]
    json: Option<String>,

    /// Fallback threshold when the metrics carry none
    #[arg(long)]
    threshold: Option<f64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }

    let request = PredictRequest {
        model: args.model,
        metrics: args.metrics,
        json: args.json,
        threshold: args.threshold,
        config: args.config,
    };
    let result = run_prediction(&request)
        .and_then(|outcome| render_outcome(&outcome, &mut std::io::stdout().lock()));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(exit_code(&err))
        }
    }
}
