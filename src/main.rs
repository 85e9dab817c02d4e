use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use plant_analytics::config::AppConfig;
use plant_analytics::ingestion::CsvDirectorySource;
use plant_analytics::{Clock, DataAssistant, FixedClock, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plant-analytics")]
#[command(about = "Canonical plant data and analytical questions over it")]
struct Args {
    /// JSON configuration file (or set PLANT_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of plant exports (overrides the configuration)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Pin "today" (YYYY-MM-DD) for reproducible answers
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every export and print quality reports and the load summary
    Load,
    /// Answer a question and print the structured result
    Ask {
        question: String,
    },
    /// List loaded plant ids
    Plants,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = args.data_dir {
        config.ingestion.data_dir = dir;
    }

    let clock: Arc<dyn Clock> = match args.today {
        Some(date) => Arc::new(FixedClock::at_date(date)),
        None => Arc::new(SystemClock),
    };

    let source = CsvDirectorySource::from_config(&config.ingestion);
    info!("Reading plant exports from {:?}", config.ingestion.data_dir);
    let assistant = DataAssistant::with_clock(config, clock);
    assistant.load(&source).context("loading plant exports")?;

    match args.command {
        Command::Load => {
            let output = serde_json::json!({
                "summary": assistant.load_summary()?,
                "quality_reports": assistant.quality_reports()?,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Ask { question } => {
            let result = assistant.ask(&question)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Plants => {
            for id in assistant.plant_ids()? {
                println!("{}", id);
            }
        }
    }

    Ok(())
}
