use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use magician_scraper::collectors::{
    collect_all, Collector, CsvFileCollector, DirectoryApiCollector, JsonFileCollector,
    SeedCollector,
};
use magician_scraper::common::error::{PipelineError, Result};
use magician_scraper::config::Config;
use magician_scraper::domain::{Listing, RawListing};
use magician_scraper::infra::geocoding::NominatimClient;
use magician_scraper::infra::places::GooglePlacesClient;
use magician_scraper::observability::logging::init_logging;
use magician_scraper::pipeline::enrich::{Enricher, PlacesPort};
use magician_scraper::pipeline::load::Loader;
use magician_scraper::pipeline::orchestrator::PipelineOrchestrator;
use magician_scraper::storage::{InMemoryStorage, SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "magician_scraper")]
#[command(about = "Data collection pipeline for the magician directory")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect raw listings from the configured sources into a JSON file
    Collect {
        /// Comma-separated sources: seed, json:<path>, csv:<path>, directory:<base-url>
        #[arg(long, default_value = "seed")]
        sources: String,
        /// Where to write the raw listings
        #[arg(long, default_value = "data/raw-listings.json")]
        output: PathBuf,
    },
    /// Validate, normalize, enrich, and dedupe a raw listings file
    Process {
        /// Raw listings JSON produced by `collect`
        #[arg(long, default_value = "data/raw-listings.json")]
        input: PathBuf,
        /// Where to write the processed listings
        #[arg(long, default_value = "data/processed-listings.json")]
        output: PathBuf,
        /// Skip external geocoding/places lookups
        #[arg(long)]
        skip_enrich: bool,
    },
    /// Load a processed listings file into the database
    Load {
        /// Processed listings JSON produced by `process`
        #[arg(long, default_value = "data/processed-listings.json")]
        input: PathBuf,
    },
    /// Run collect, process, and load as one batch
    FullPipeline {
        /// Comma-separated sources: seed, json:<path>, csv:<path>, directory:<base-url>
        #[arg(long, default_value = "seed")]
        sources: String,
        /// Skip external geocoding/places lookups
        #[arg(long)]
        skip_enrich: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    init_logging();

    // Missing configuration is the one error that aborts before any record
    // is processed.
    let config = Config::load()?;

    match cli.command {
        Commands::Collect { sources, output } => {
            let collectors = parse_sources(&sources)?;
            let listings = collect_all(&collectors).await;
            write_json(&output, &listings)?;
            info!("Wrote {} raw listings to {}", listings.len(), output.display());
        }
        Commands::Process {
            input,
            output,
            skip_enrich,
        } => {
            let raw: Vec<RawListing> = read_json(&input)?;
            let enricher = build_enricher(&config, skip_enrich)?;
            // The real sink stays untouched; `process` only writes files.
            let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
            let orchestrator = PipelineOrchestrator::new(
                enricher,
                Loader::with_batch_size(storage, config.loader.batch_size),
                &config.review.path,
            );
            let (listings, summary) = orchestrator.process_only(raw).await?;
            write_json(&output, &listings)?;
            info!(
                "Processed {} listings ({} valid, {} invalid, {} merged); wrote {}",
                summary.total,
                summary.valid,
                summary.invalid,
                summary.merged_duplicates,
                output.display()
            );
        }
        Commands::Load { input } => {
            let listings: Vec<Listing> = read_json(&input)?;
            let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.database.path)?);
            let loader = Loader::with_batch_size(storage, config.loader.batch_size);
            let report = loader.load(&listings).await;
            info!(
                "Load finished: {}/{} loaded, {} failed",
                report.loaded, report.attempted, report.failed
            );
        }
        Commands::FullPipeline {
            sources,
            skip_enrich,
        } => {
            let collectors = parse_sources(&sources)?;
            let raw = collect_all(&collectors).await;

            let enricher = build_enricher(&config, skip_enrich)?;
            let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.database.path)?);
            let orchestrator = PipelineOrchestrator::new(
                enricher,
                Loader::with_batch_size(storage, config.loader.batch_size),
                &config.review.path,
            );
            let summary = orchestrator.run(raw).await?;
            info!(
                "Full pipeline finished: {} collected, {} loaded, {} invalid (see {})",
                summary.total,
                summary.loaded,
                summary.invalid,
                config.review.path
            );
        }
    }

    Ok(())
}

fn parse_sources(spec: &str) -> Result<Vec<Box<dyn Collector>>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match part.split_once(':') {
            None if part == "seed" => collectors.push(Box::new(SeedCollector)),
            Some(("json", path)) => collectors.push(Box::new(JsonFileCollector::new(path))),
            Some(("csv", path)) => collectors.push(Box::new(CsvFileCollector::new(path))),
            Some(("directory", base_url)) => {
                collectors.push(Box::new(DirectoryApiCollector::new(base_url)))
            }
            _ => {
                return Err(PipelineError::Config(format!(
                    "unknown source '{}': expected seed, json:<path>, csv:<path>, or directory:<url>",
                    part
                )))
            }
        }
    }
    if collectors.is_empty() {
        return Err(PipelineError::Config(
            "no collection sources specified".to_string(),
        ));
    }
    Ok(collectors)
}

fn build_enricher(config: &Config, skip_enrich: bool) -> Result<Option<Enricher>> {
    if skip_enrich {
        return Ok(None);
    }
    let geocoder = Arc::new(NominatimClient::new(&config.geocoding)?);
    let places = GooglePlacesClient::from_config(&config.places)
        .map(|c| Arc::new(c) as Arc<dyn PlacesPort>);
    if places.is_none() {
        info!("No places API key configured; skipping business-detail enrichment");
    }
    Ok(Some(Enricher::with_geocode_delay(
        geocoder,
        places,
        Duration::from_millis(config.geocoding.delay_ms),
    )))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
