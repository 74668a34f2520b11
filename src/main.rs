//! autojudge CLI
//!
//! Trains and applies the problem difficulty classifier and score regressor.

use clap::{Parser, Subcommand};
use autojudge::{Config, Result};

#[derive(Parser)]
#[command(name = "autojudge")]
#[command(about = "Programming problem difficulty prediction with random forests", long_about = None)]
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
    /// Initialize a new project with default config
    Init,
    /// Train the classifier and regressor and store them
    Train {
        /// Override the dataset path
        #[arg(long)]
        data: Option<String>,
        /// Override the tree count of both forests
        #[arg(long)]
        trees: Option<usize>,
        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Report format
        #[arg(long, default_value = "text")]
        format: ReportFormat,
    },
    /// Predict class and score for problem statements
    Predict {
        /// JSONL file of problem statements
        #[arg(long)]
        input: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// Show dataset status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show stored models and the latest evaluation
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

#[derive(Clone, Debug)]
enum ReportFormat {
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown format: {}. Use text or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

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
        Commands::Init => commands::init(&cli.config),
        Commands::Train {
            data,
            trees,
            seed,
            format,
        } => commands::train(&config, data, trees, seed, format),
        Commands::Predict { input, format } => commands::predict(&config, &input, format),
        Commands::Data { action } => match action {
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use autojudge::data::{dataset, ModelStore, ProblemDataset, CLASSIFIER_ID, REGRESSOR_ID};
    use autojudge::model::{ClassifierPipeline, RegressorPipeline};
    use autojudge::predict::{format_csv, format_predictions, Predictor};
    use autojudge::training::Trainer;
    use std::fs::File;
    use std::io::BufReader;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("models")?;
        println!("Created data/ and models/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Put labeled problems in {}", config.data.dataset_path);
        println!("  3. Run 'autojudge train' to train both models");
        println!("  4. Run 'autojudge predict --input problems.jsonl' to score new problems");

        Ok(())
    }

    pub fn train(
        config: &Config,
        data: Option<String>,
        trees: Option<usize>,
        seed: Option<u64>,
        format: ReportFormat,
    ) -> Result<()> {
        let mut config = config.clone();
        if let Some(path) = data {
            config.data.dataset_path = path;
        }
        if let Some(n) = trees {
            config.classifier.n_trees = n;
            config.regressor.n_trees = n;
        }
        if let Some(s) = seed {
            config.training.seed = s;
        }
        config.validate()?;

        let dataset = ProblemDataset::load(&config.data.dataset_path)?;
        let trainer = Trainer::new(config.clone());
        let trained = trainer.run(&dataset)?;

        let store = ModelStore::open(&config.data.store_path)?;
        store.save_pipelines(&trained)?;

        match format {
            ReportFormat::Text => {
                println!();
                print!("{}", trained.report);
                println!("\nModels saved to {}", config.data.store_path);
            }
            ReportFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&trained.report)?);
            }
        }

        Ok(())
    }

    pub fn predict(config: &Config, input: &str, format: OutputFormat) -> Result<()> {
        let store = ModelStore::open(&config.data.store_path)?;
        let predictor = Predictor::load(&store, &config.features)?;

        let file = File::open(input)?;
        let statements = dataset::read_statements(BufReader::new(file))?;
        log::info!("Scoring {} statements from {}", statements.len(), input);

        let predictions = predictor.predict(&statements)?;

        match format {
            OutputFormat::Table => print!("{}", format_predictions(&predictions)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&predictions)?),
            OutputFormat::Csv => print!("{}", format_csv(&predictions)),
        }

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let dataset = ProblemDataset::load(&config.data.dataset_path)?;

        println!("Dataset Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.dataset_path);
        println!("  Records:  {}", dataset.len());
        if let Some((min, max, mean)) = dataset.score_summary() {
            println!("  Score:    {:.2} to {:.2} (mean {:.2})", min, max, mean);
        }
        println!("  Classes:");
        for (class, count) in dataset.class_distribution() {
            println!("    {:<16} {}", class, count);
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let store = ModelStore::open(&config.data.store_path)?;
        let classifier: ClassifierPipeline = store.load(CLASSIFIER_ID)?;
        let regressor: RegressorPipeline = store.load(REGRESSOR_ID)?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Store:          {}", config.data.store_path);
        for entry in store.list()? {
            let created = entry
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "  {:<15} {} ({} bytes)",
                format!("{}:", entry.identifier),
                created,
                entry.payload_bytes
            );
        }
        println!(
            "  Vocabulary:     {} terms",
            classifier.features.vocabulary.len()
        );
        println!(
            "  Numeric dims:   {}",
            classifier.features.standardization.dim()
        );
        println!(
            "  Classifier:     {} trees, classes {}",
            classifier.model.n_trees(),
            classifier.model.classes().join(", ")
        );
        println!("  Regressor:      {} trees", regressor.model.n_trees());

        if let Some(report) = store.latest_report()? {
            println!();
            print!("{}", report);
        }

        Ok(())
    }
}
