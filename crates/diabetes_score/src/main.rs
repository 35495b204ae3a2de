//! Diabetes Risk Prediction Service
//!
//! Trains a logistic regression classifier on the diabetes dataset and
//! serves its predictions over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use diabetes_score::commands;
use diabetes_score::commands::predict::FeatureArgs;
use ml_model::{HeaderMode, TrainingConfig};
use tracing_subscriber::EnvFilter;

/// Diabetes Risk Prediction Service
#[derive(Parser)]
#[command(name = "diabetes-score")]
#[command(about = "Logistic regression diabetes risk predictor with an HTTP API")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP prediction service
    Serve {
        /// Address to listen on (overrides `BIND_ADDR`)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Train the model and write the artifact
    Train {
        /// Path to the training CSV (overrides `DATASET_PATH`)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Where to write the model artifact (overrides `MODEL_PATH`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// How to treat the first CSV row: auto, present or absent
        #[arg(long, default_value_t = HeaderMode::Auto)]
        header: HeaderMode,

        /// Seed for the stratified train/test split
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value = "0.2")]
        test_size: f64,
    },

    /// Score a single set of measurements with the trained model
    Predict {
        /// Model artifact to use (overrides `MODEL_PATH`)
        #[arg(short, long)]
        model: Option<PathBuf>,

        #[command(flatten)]
        features: FeatureArgs,
    },

    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve { bind } => {
            let config = Config {
                bind_addr: bind.unwrap_or(config.bind_addr),
                ..config
            };
            commands::serve::run(&config).await?;
        }
        Commands::Train {
            dataset,
            output,
            header,
            seed,
            test_size,
        } => {
            let dataset = dataset.unwrap_or(config.dataset_path);
            let output = output.unwrap_or(config.model_path);
            let training = TrainingConfig::new()
                .with_seed(seed)
                .with_test_size(test_size);
            commands::train::run(&dataset, &output, header, &training)?;
        }
        Commands::Predict { model, features } => {
            let model = model.unwrap_or(config.model_path);
            commands::predict::run(&model, &features)?;
        }
        Commands::Migrate => {
            commands::migrate::run(&config.database_url).await?;
        }
    }

    Ok(())
}
