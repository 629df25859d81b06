use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use housing_pipeline::config::Config;
use housing_pipeline::logging::init_logging;
use housing_pipeline::observability::metrics::describe_metrics;
use housing_pipeline::pipeline::runner::{CapitalRunSummary, HousingRunSummary};
use housing_pipeline::pipeline::{CapitalRunner, HousingRunner};
use housing_pipeline::sources::socrata::SocrataSource;
use housing_pipeline::sources::DataSourcePort;
use housing_pipeline::storage::{InMemoryStorage, Storage};

const DEFAULT_HOUSING_FEED: &str = "https://data.cityofnewyork.us/resource/cwnb-gqzx.json";
const DEFAULT_AFFORDABLE_FEED: &str = "https://data.cityofnewyork.us/resource/hg8x-zxpr.json";
const DEFAULT_CAPITAL_FEED: &str = "https://data.cityofnewyork.us/resource/fi59-268w.json";

#[derive(Parser)]
#[command(name = "housing_pipeline")]
#[command(about = "NYC housing and capital-project data reconciliation pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Run everything but suppress the destructive replace
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the housing feeds (construction, demolition, affordability)
    Housing,
    /// Reconcile the capital-project feed and simplify geometry
    Capital,
    /// Run both pipelines sequentially
    Run,
}

fn feed_url(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn housing_sources() -> (Box<dyn DataSourcePort>, Box<dyn DataSourcePort>) {
    let construction = SocrataSource::new(
        "dcp_housing",
        &feed_url("HOUSING_FEED_URL", DEFAULT_HOUSING_FEED),
    );
    let affordable = SocrataSource::new(
        "hpd_affordable",
        &feed_url("AFFORDABLE_FEED_URL", DEFAULT_AFFORDABLE_FEED),
    );
    (Box::new(construction), Box::new(affordable))
}

fn print_housing_summary(summary: &HousingRunSummary) {
    println!("\n📊 Housing Run {}:", summary.run_id);
    println!(
        "   Constructions: {} accepted / {} dropped",
        summary.construction_normalize.accepted, summary.construction_normalize.dropped
    );
    println!(
        "   Overlays merged: {} ({:.1}% affordable)",
        summary.overlay.records_overlaid, summary.overlay.affordable_percentage
    );
    println!(
        "   Dedupe: {} -> {} ({} removed)",
        summary.dedupe.original_count, summary.dedupe.surviving_count, summary.dedupe.removed_count
    );
    println!(
        "   Demolitions: {} matched / {} standalone",
        summary.demolition.matched, summary.demolition.standalone
    );
    for outcome in &summary.collections {
        println!(
            "   {}: {} rows, {} ({})",
            outcome.collection,
            outcome.record_count,
            if outcome.replaced { "replaced" } else { "skipped" },
            outcome.verdict.reason
        );
    }
}

fn print_capital_summary(summary: &CapitalRunSummary) {
    println!("\n📊 Capital Run {}:", summary.run_id);
    println!(
        "   Projects: {} accepted / {} dropped",
        summary.normalize.accepted, summary.normalize.dropped
    );
    for outcome in &summary.collections {
        println!(
            "   {}: {} rows, {} ({})",
            outcome.collection,
            outcome.record_count,
            if outcome.replaced { "replaced" } else { "skipped" },
            outcome.verdict.reason
        );
    }
}

async fn run_housing(storage: Arc<dyn Storage>, config: Config, dry_run: bool) -> bool {
    let (construction, affordable) = housing_sources();
    let runner = HousingRunner::new(construction, affordable, storage, config, dry_run);
    match runner.run().await {
        Ok(summary) => {
            print_housing_summary(&summary);
            if !summary.validation_passed {
                for failure in &summary.validation_failures {
                    error!(check = %failure.check, detail = %failure.detail, "Validation failure");
                }
            }
            summary.validation_passed
        }
        Err(e) => {
            error!("Housing run failed: {}", e);
            false
        }
    }
}

async fn run_capital(storage: Arc<dyn Storage>, config: Config, dry_run: bool) -> bool {
    let source = SocrataSource::new(
        "capital_projects",
        &feed_url("CAPITAL_FEED_URL", DEFAULT_CAPITAL_FEED),
    );
    let runner = CapitalRunner::new(Box::new(source), storage, config, dry_run);
    match runner.run().await {
        Ok(summary) => {
            print_capital_summary(&summary);
            summary.validation_passed
        }
        Err(e) => {
            error!("Capital run failed: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_logging();
    describe_metrics();

    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    info!(dry_run = cli.dry_run, "Pipeline starting");

    let ok = match cli.command {
        Commands::Housing => run_housing(storage, config, cli.dry_run).await,
        Commands::Capital => run_capital(storage, config, cli.dry_run).await,
        Commands::Run => {
            let housing_ok = run_housing(storage.clone(), config.clone(), cli.dry_run).await;
            let capital_ok = run_capital(storage, config, cli.dry_run).await;
            housing_ok && capital_ok
        }
    };

    if !ok {
        std::process::exit(1);
    }
}
