use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

use sales_pipeline::constants;
use sales_pipeline::infra::FsArtifactStore;
use sales_pipeline::observability;
use sales_pipeline::{Config, Pipeline, Stage, StageReport};

#[derive(Parser)]
#[command(name = "sales_pipeline")]
#[command(about = "Reconciles CRM, ERP and e-commerce sales into a KPI snapshot")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "SALES_PIPELINE_CONFIG", default_value = constants::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for the rotated JSON log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the three sources and write the integrated dataset
    Integrate,
    /// Derive calendar, channel, first-purchase and seller fields
    Enrich,
    /// Aggregate the final dataset into the KPI snapshot
    Kpis,
    /// Run every stage in order
    Run,
}

fn print_report(report: &StageReport) {
    match report {
        StageReport::Integrate(summary) => {
            println!("\n📥 Integration results:");
            for source in &summary.sources {
                println!(
                    "   {}: {} rows read, {} kept, {} defects, {} duplicates",
                    source.source,
                    source.rows_read,
                    source.records_emitted,
                    source.defects(),
                    source.duplicates_dropped
                );
            }
            println!("   CRM customers: {}", summary.customers);
            println!("   Integrated records: {}", summary.reconcile.integrated_records);
            println!("   Unmatched orders: {}", summary.reconcile.unmatched_orders);
            println!("   Output file: {}", summary.output_file);
        }
        StageReport::Enrich(summary) => {
            println!("\n🔧 Enrichment results:");
            println!("   Records: {}", summary.enrich.records);
            println!("   First purchases: {}", summary.enrich.first_purchases);
            println!(
                "   Physical / online: {} / {}",
                summary.enrich.physical_orders, summary.enrich.online_orders
            );
            if summary.enrich.undated_records > 0 {
                println!("   ⚠️  Records without timestamp: {}", summary.enrich.undated_records);
            }
            println!(
                "   Period: {} .. {}",
                summary.min_order_date.as_deref().unwrap_or("-"),
                summary.max_order_date.as_deref().unwrap_or("-")
            );
            println!("   Output file: {}", summary.output_file);
        }
        StageReport::Kpis(summary) => {
            println!("\n📊 KPI results:");
            println!("   Total revenue: {:.2}", summary.total_revenue);
            println!("   Total orders: {}", summary.total_orders);
            println!("   Sellers ranked: {}", summary.sellers_ranked);
            println!("   Output file: {}", summary.output_file);
        }
    }
}

async fn write_metrics_snapshot(path: Option<&Path>) {
    let Some(path) = path else { return };
    if let Err(e) = observability::metrics::write_snapshot(path).await {
        warn!("Failed to write metrics snapshot: {:#}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let _guard = observability::init_logging(&cli.log_dir)?;
    if let Err(e) = observability::init() {
        warn!("Metrics disabled: {:#}", e);
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let snapshot_path = config.metrics.snapshot_path.clone();
    let pipeline = Pipeline::new(Arc::new(FsArtifactStore::new()), config);

    let outcome = match cli.command {
        Commands::Integrate => pipeline.run_stage(Stage::Integrate).await.map(|r| vec![r]),
        Commands::Enrich => pipeline.run_stage(Stage::Enrich).await.map(|r| vec![r]),
        Commands::Kpis => pipeline.run_stage(Stage::Kpis).await.map(|r| vec![r]),
        Commands::Run => {
            println!("🚀 Running full pipeline (integrate + enrich + kpis)...");
            pipeline.run_all().await.map(|result| result.stages)
        }
    };

    write_metrics_snapshot(snapshot_path.as_deref()).await;

    match outcome {
        Ok(reports) => {
            for report in &reports {
                print_report(report);
            }
            println!("\n✅ Pipeline completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            println!("❌ Pipeline failed: {:#}", e);
            Err(e)
        }
    }
}
