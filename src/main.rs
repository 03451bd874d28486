use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use rental_zones::config::Config;
use rental_zones::error::PipelineError;
use rental_zones::logging;
use rental_zones::metrics::{init_metrics, push_to_gateway};
use rental_zones::pipeline::{Pipeline, PipelineSummary};

#[derive(Parser)]
#[command(name = "rental_zones")]
#[command(about = "Clean rental listing exports and split them into per-zipcode datasets")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to the one next to the executable).
    /// Relative paths and the logs/ directory resolve against its directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hide the partition progress bar
    #[arg(long)]
    quiet: bool,
}

fn print_summary(summary: &PipelineSummary) {
    println!("\n📊 Run summary:");
    println!("   Rows loaded: {}", summary.rows_loaded);
    println!("   Rows cleaned: {}", summary.rows_cleaned);
    println!(
        "   Postal codes filled: {}/{}",
        summary.enrichment.enriched, summary.enrichment.attempted
    );
    if summary.unresolved > 0 {
        println!("   Rows without postal code: {}", summary.unresolved);
    }
    println!(
        "   Partitions: {} on {} workers",
        summary.partitions, summary.workers
    );
    println!("   Zones written: {}", summary.zones_written.len());
    println!("   Zones skipped: {}", summary.zones_skipped.len());
    println!("   Inventory: {}", summary.inventory_path.display());

    if let Some(report) = &summary.failure_report {
        println!(
            "\n⚠️  {} geocoding failures written to {}",
            summary.enrichment.failures.len(),
            report.display()
        );
    }
}

async fn run(cli: &Cli) -> Result<PipelineSummary, PipelineError> {
    let config = Config::load(cli.config.as_deref())?;
    info!(
        input = %config.input.dir.display(),
        output = %config.output.dir.display(),
        region = %config.cleaning.region,
        "configuration loaded"
    );
    Pipeline::from_config(config)?
        .with_progress(!cli.quiet)
        .run()
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let _guard = logging::init_logging(&logging::log_dir(cli.config.as_deref()));
    init_metrics();

    println!("🚀 Running rental zone pipeline...");
    let code = match run(&cli).await {
        Ok(summary) => {
            print_summary(&summary);
            println!("\n✅ Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(exit_code = e.exit_code(), "Pipeline failed: {}", e);
            println!("❌ Pipeline failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    };

    if let Err(e) = push_to_gateway("rental_zones").await {
        warn!("Failed to push metrics: {:#}", e);
    }
    code
}
