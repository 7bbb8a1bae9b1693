use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use course_catalog::config::Config;
use course_catalog::logging;
use course_catalog::observability;
use course_catalog::pipeline::processing::validate::ValidationStatus;
use course_catalog::pipeline::Pipeline;
use course_catalog::storage::FileStorage;

#[derive(Parser)]
#[command(name = "course_catalog")]
#[command(about = "Course catalogue extraction and programme table builder")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract course records from the raw catalogue export
    Extract,
    /// Build per-category requirement sets from a flag table
    Categories {
        /// Flag table (defaults to the configured course table)
        #[arg(long)]
        table: Option<PathBuf>,
    },
    /// Join course records and categories into the aggregate table
    Aggregate {
        /// Output file (defaults to the configured course table)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rewrite a legacy table into canonical course codes
    Reconcile {
        /// Legacy table to rewrite
        input: PathBuf,
        /// Output file (defaults to overwriting the input)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write a JSON report of resolved and unresolved rows
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Check that raw record file names match their course codes
    Validate {
        /// Directory to check (defaults to the configured courses dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Run extract, categories and aggregate sequentially
    Run,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _guard = logging::init_logging(&config.paths.log_dir);
    match &config.source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    let metrics = observability::install_recorder();

    let storage = FileStorage::from_paths(&config.paths);
    let pipeline = Pipeline::new(&storage, &config);
    let mut exit_code = 0;

    match cli.command {
        Commands::Extract => {
            println!("📥 Extracting course records...");
            run_extract(&pipeline)?;
        }
        Commands::Categories { table } => {
            println!("🗂️  Building requirement sets...");
            let table = table.unwrap_or_else(|| config.paths.course_table.clone());
            run_categories(&pipeline, &table)?;
        }
        Commands::Aggregate { output } => {
            println!("🔗 Building aggregate table...");
            let output = output.unwrap_or_else(|| config.paths.course_table.clone());
            run_aggregate(&pipeline, &output)?;
        }
        Commands::Reconcile {
            input,
            output,
            report,
        } => {
            println!("🔁 Reconciling legacy table...");
            let legacy = File::open(&input)
                .with_context(|| format!("failed to open {}", input.display()))?;
            let outcome = pipeline.reconcile(legacy)?;

            let output = output.unwrap_or_else(|| input.clone());
            outcome.table.write_to(BufWriter::new(File::create(&output)?))?;

            println!("\n📊 Reconcile Results:");
            println!("   Resolved: {}", outcome.report.resolved.len());
            println!("   Unresolved: {}", outcome.report.unresolved.len());
            println!(
                "   Unresolved alternatives: {}",
                outcome.report.unresolved_alternatives.len()
            );
            println!("   Output file: {}", output.display());
            for row in &outcome.report.unresolved {
                println!("   - row {}: {} ({})", row.row, row.name, row.legacy_id);
            }

            if let Some(path) = report {
                fs::write(&path, serde_json::to_string_pretty(&outcome.report)?)?;
                info!("Wrote reconcile report to {}", path.display());
            }
        }
        Commands::Validate { dir } => {
            println!("🔍 Validating course files...");
            let dir = dir.unwrap_or_else(|| config.paths.courses_dir.clone());
            let sources =
                FileStorage::new(&dir, &config.paths.output_dir, &config.paths.programme_dir);
            let report = Pipeline::new(&sources, &config).validate()?;

            for result in &report.results {
                match &result.status {
                    ValidationStatus::Ok { code } => println!("✅ {}: {}", result.file, code),
                    ValidationStatus::Mismatch { expected, actual } => println!(
                        "❌ {}: expected {}, found {}",
                        result.file, expected, actual
                    ),
                    ValidationStatus::Error { message } => {
                        println!("⚠️  {}: {}", result.file, message)
                    }
                }
            }

            if report.all_valid() {
                println!("\n✅ All {} files valid", report.results.len());
            } else {
                println!(
                    "\n❌ {} of {} files have issues",
                    report.failures().count(),
                    report.results.len()
                );
                exit_code = 1;
            }
        }
        Commands::Run => {
            println!("🚀 Running full pipeline (extract + categories + aggregate)...");

            println!("\n📥 Step 1: Extracting course records...");
            run_extract(&pipeline)?;

            println!("\n🗂️  Step 2: Building requirement sets...");
            run_categories(&pipeline, &config.paths.course_table)?;

            println!("\n🔗 Step 3: Building aggregate table...");
            run_aggregate(&pipeline, &config.paths.course_table)?;

            println!("✅ Full pipeline completed successfully!");
        }
    }

    if let (Some(handle), Some(path)) = (&metrics, &config.paths.metrics_file) {
        if let Err(e) = observability::write_snapshot(handle, path) {
            warn!("Failed to write metrics snapshot: {}", e);
        }
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn run_extract(pipeline: &Pipeline) -> anyhow::Result<()> {
    let result = pipeline.extract()?;
    println!("\n📊 Extraction Results:");
    println!("   Total records: {}", result.total_records);
    println!("   Extracted: {}", result.extracted);
    println!("   Without course code: {}", result.without_id);
    println!("   Errors: {}", result.errors.len());

    if !result.errors.is_empty() {
        warn!("{} errors encountered during extraction", result.errors.len());
        println!("\n⚠️  Errors encountered:");
        for error in &result.errors {
            println!("   - {}", error);
        }
    }
    Ok(())
}

fn run_categories(pipeline: &Pipeline, table: &Path) -> anyhow::Result<()> {
    let file = File::open(table).with_context(|| format!("failed to open {}", table.display()))?;
    let categories = pipeline.build_categories(file)?;
    for set in &categories.sets {
        println!("   {}: {} requirements", set.name, set.requirements.len());
    }
    Ok(())
}

fn run_aggregate(pipeline: &Pipeline, output: &Path) -> anyhow::Result<()> {
    match pipeline.aggregate_to_file(output) {
        Ok(result) => {
            println!("\n📊 Aggregate Results:");
            println!("   Courses: {}", result.total_courses);
            println!("   Rows written: {}", result.rows_written);
            println!("   Skipped: {}", result.skipped);
            println!("   Output file: {}", output.display());
            Ok(())
        }
        Err(e) => {
            error!("Aggregate failed: {}", e);
            Err(e).with_context(|| format!("failed to write {}", output.display()))
        }
    }
}
