//! Rental price estimation CLI
//!
//! Import listings, train the price model and predict nightly prices.

use clap::{Parser, Subcommand};
use pricer::{Config, Result};

#[derive(Parser)]
#[command(name = "pricer")]
#[command(about = "Short-term rental price estimation", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Fit the encoder and train the price model
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override learning rate
        #[arg(long)]
        lr: Option<f64>,
    },
    /// Predict prices for one or more listings
    Predict {
        /// JSON file holding a listing object or an array of listings
        #[arg(long, conflicts_with = "json")]
        input: Option<String>,
        /// Listing as an inline JSON string
        #[arg(long)]
        json: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import listings from a JSON Lines or CSV file
    Import {
        /// Path to the .jsonl or .csv file
        path: String,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show fitted state information
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { path } => commands::data_import(&config, &path),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Train { epochs, lr } => commands::train(&config, epochs, lr),
        Commands::Predict {
            input,
            json,
            format,
        } => commands::predict(&config, input, json, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use std::sync::Arc;

    use pricer::data::Database;
    use pricer::features::{MissingPolicy, Normalizer, RawRecord, Schema};
    use pricer::predict::{FittedStateStore, FsStateStore, PredictionPipeline};
    use pricer::training::{fit_price_model, TrainBackend};
    use pricer::{PredictionResponse, PricerError};
    use serde_json::Value;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        let db_dir = std::path::Path::new(&config.data.database_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        std::fs::create_dir_all(&db_dir)?;
        std::fs::create_dir_all(&config.data.artifact_dir)?;
        println!(
            "Created {}/ and {}/ directories",
            db_dir.display(),
            config.data.artifact_dir
        );

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'pricer data import listings.csv' to load training data");
        println!("  3. Run 'pricer train' to fit the model");
        println!("  4. Run 'pricer predict --json '{{\"city\": \"NYC\"}}'' to price a listing");

        Ok(())
    }

    pub fn data_import(config: &Config, path: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        println!("Importing listings from {}...", path);
        let summary = db.import_file(path)?;
        println!("Stored {} listings in database", summary.imported);
        if summary.skipped > 0 {
            println!("Skipped {} rows without a usable price", summary.skipped);
        }

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:       {}", config.data.database_path);
        println!("  Listings:   {}", stats.listing_count);
        if let Some(mean) = stats.mean_log_price {
            println!("  Mean price: ${:.2} (geometric)", mean.exp());
        }
        if let Some(last) = stats.last_import {
            println!("  Imported:   {}", last.format("%Y-%m-%d %H:%M UTC"));
        }

        Ok(())
    }

    pub fn train(config: &Config, epochs: Option<usize>, lr: Option<f64>) -> Result<()> {
        let mut training_config = config.clone();
        if let Some(e) = epochs {
            training_config.training.epochs = e;
        }
        if let Some(lr) = lr {
            training_config.training.learning_rate = lr;
        }

        println!("Initializing training...");

        let db = Database::open(&config.data.database_path)?;
        let rows = db.get_all_listings()?;
        if rows.is_empty() {
            return Err(PricerError::NoTrainingData);
        }
        println!("Loaded {} listings from database", rows.len());

        println!("\nStarting training...\n");
        let report = fit_price_model::<TrainBackend>(&rows, &training_config, Default::default())?;

        let store = FsStateStore::new(&config.data.artifact_dir);
        store.save(&config.data.state_id, &report.state)?;

        println!("\nTraining complete!");
        println!("  Saved to:       {}", store.path_for(&config.data.state_id).display());
        println!("  Best epoch:     {}", report.history.best_epoch + 1);
        println!("  Best val MSE:   {:.4}", report.history.best_val_loss);
        println!("  Val R²:         {:.3}", report.history.best_val_r2());

        Ok(())
    }

    /// Parse a listing object or an array of listing objects
    fn parse_listings(text: &str) -> Result<Vec<RawRecord>> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| PricerError::Parse(format!("Invalid listing JSON: {}", e)))?;
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(PricerError::Parse(format!(
                    "Expected a listing object, got {}",
                    other
                ))),
            })
            .collect()
    }

    pub fn predict(
        config: &Config,
        input: Option<String>,
        json: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let text = match (input, json) {
            (Some(path), _) => std::fs::read_to_string(path)?,
            (None, Some(json)) => json,
            (None, None) => {
                return Err(PricerError::Config(
                    "Provide a listing with --input <file> or --json '<object>'".to_string(),
                ))
            }
        };
        let listings = parse_listings(&text)?;

        let store: Arc<dyn FittedStateStore> = Arc::new(FsStateStore::new(&config.data.artifact_dir));
        let pipeline = PredictionPipeline::from_store(
            Normalizer::from_config(&config.normalizer, MissingPolicy::Defaults),
            store,
            config.data.state_id.clone(),
        );
        pipeline.warm_up()?;

        match format {
            OutputFormat::Table => {
                println!("{:>4}  {:>12}  {:>10}", "#", "Price", "log_price");
                println!("──────────────────────────────");
                for (i, result) in pipeline.predict_batch(&listings).into_iter().enumerate() {
                    match result {
                        Ok(p) => println!("{:>4}  {:>12.2}  {:>10.4}", i + 1, p.price, p.log_price),
                        Err(e) => println!("{:>4}  error: {}", i + 1, e),
                    }
                }
            }
            OutputFormat::Json => {
                let responses: Vec<PredictionResponse> =
                    listings.iter().map(|l| pipeline.respond(l)).collect();
                let out = if responses.len() == 1 {
                    serde_json::to_string_pretty(&responses[0])
                } else {
                    serde_json::to_string_pretty(&responses)
                }
                .map_err(|e| PricerError::Parse(e.to_string()))?;
                println!("{}", out);
            }
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let store = FsStateStore::new(&config.data.artifact_dir);
        let state = store.load(&config.data.state_id)?;
        let schema = Schema::current();

        println!("Fitted State");
        println!("───────────────────────────────");
        println!("  Path:      {}", store.path_for(&config.data.state_id).display());
        println!("  Schema:    v{}", schema.version());
        println!("  Features:  {}", state.encoder.dim());
        let widths: Vec<String> = state
            .model
            .layers()
            .iter()
            .map(|l| l.output_dim.to_string())
            .collect();
        println!("  Layers:    {} -> {}", state.encoder.dim(), widths.join(" -> "));

        if let Some(summary) = &state.summary {
            println!("  Trained:   {}", summary.trained_at.format("%Y-%m-%d %H:%M UTC"));
            println!(
                "  Samples:   {} train / {} validation",
                summary.train_samples, summary.val_samples
            );
            println!("  Epochs:    {}", summary.epochs_run);
            println!("  Val RMSE:  {:.4} (log price)", summary.val_rmse);
            println!("  Val R²:    {:.3}", summary.val_r2);
        }

        println!("\nFeature order:");
        for (i, (name, kind)) in schema.feature_order().iter().enumerate() {
            println!("  {:>2}. {:<24} {:?}", i + 1, name, kind);
        }

        Ok(())
    }
}
