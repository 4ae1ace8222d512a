use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fluency_prosody::{
    process_timeline, read_textgrid, run_batch, validate, BatchConfig, ProcessConfig,
    ProcessOutcome, TierLayout, Validation,
};

#[derive(Parser)]
#[command(name = "fluency-prosody")]
#[command(author, version, about = "Fluency and prosody metrics from TextGrid annotations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every TextGrid in a directory and update the metrics table
    Process {
        /// Directory holding the TextGrid files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Aggregate CSV table (existing rows are kept)
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// Directory for the reconciled TextGrids
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Directory for per-file JSON reports
        #[arg(long)]
        json_dir: Option<PathBuf>,

        /// Files processed in parallel (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Delete each input once its reconciled copy is saved (needs --save-dir)
        #[arg(long)]
        remove_processed: bool,

        #[command(flatten)]
        tiers: TierArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the consistency checks on one file
    Check {
        /// Input TextGrid file
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        tiers: TierArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate, reconcile and measure one file without writing anything
    Analyze {
        /// Input TextGrid file
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        tiers: TierArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Tier names for each role
#[derive(Args)]
struct TierArgs {
    #[arg(long, default_value = "Phrases")]
    phrases_tier: String,

    #[arg(long, default_value = "DFauto (English)")]
    segmental_tier: String,

    #[arg(long, default_value = "Repairs")]
    repairs_tier: String,

    #[arg(long, default_value = "Japanese")]
    language_tier: String,

    #[arg(long, default_value = "Intensity")]
    intensity_tier: String,

    #[arg(long, default_value = "Pitch")]
    pitch_tier: String,
}

impl TierArgs {
    fn process_config(self) -> ProcessConfig {
        ProcessConfig {
            layout: TierLayout {
                phrases: self.phrases_tier,
                segmental: self.segmental_tier,
                repairs: self.repairs_tier,
                language_tags: self.language_tier,
                intensity: self.intensity_tier,
                pitch: self.pitch_tier,
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input_dir,
            table,
            save_dir,
            json_dir,
            jobs,
            remove_processed,
            tiers,
            verbose,
        } => {
            setup_logging(verbose);
            if remove_processed && save_dir.is_none() {
                warn!("--remove-processed has no effect without --save-dir");
            }
            let defaults = BatchConfig::default();
            let config = BatchConfig {
                input_dir,
                table_path: table,
                remove_processed: remove_processed && save_dir.is_some(),
                save_dir,
                json_dir,
                jobs: jobs.unwrap_or(defaults.jobs),
                process: tiers.process_config(),
            };
            process_directory(config).await
        }
        Commands::Check {
            input,
            tiers,
            verbose,
        } => {
            setup_logging(verbose);
            check_file(&input, &tiers.process_config())
        }
        Commands::Analyze {
            input,
            tiers,
            verbose,
        } => {
            setup_logging(verbose);
            analyze_file(&input, &tiers.process_config())
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn process_directory(config: BatchConfig) -> Result<()> {
    info!("Processing TextGrids in {:?}", config.input_dir);
    let summary = run_batch(config).await.context("Batch run failed")?;

    println!("Batch Summary ({})", summary.generated_at.to_rfc3339());
    println!("=============");
    println!("Processed: {}", summary.processed());
    println!("Invalid: {}", summary.invalid());
    println!("Failed: {}", summary.failed());
    println!("Table rows: {}", summary.table_rows);

    let problems = summary.problem_lines();
    if !problems.is_empty() {
        println!();
        println!("Diagnostics");
        println!("-----------");
        for line in problems {
            println!("{}", line);
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn check_file(input: &Path, config: &ProcessConfig) -> Result<()> {
    info!("Checking {:?}", input);
    let timeline = read_textgrid(input, &config.layout).context("Failed to read TextGrid")?;

    match validate(&timeline, &config.validation, &config.undefined_sentinel) {
        Validation::Valid => {
            println!("{}: ok", file_name(input));
            Ok(())
        }
        Validation::Invalid(diagnostics) => {
            let name = file_name(input);
            for diagnostic in &diagnostics {
                println!("{}", diagnostic.render(&name));
            }
            bail!("{}: {} problems found", name, diagnostics.len())
        }
    }
}

fn analyze_file(input: &Path, config: &ProcessConfig) -> Result<()> {
    info!("Analyzing {:?}", input);
    let timeline = read_textgrid(input, &config.layout).context("Failed to read TextGrid")?;
    let name = file_name(input);

    let processed = match process_timeline(timeline, &name, config)
        .context("Failed to measure TextGrid")?
    {
        ProcessOutcome::Processed(processed) => processed,
        ProcessOutcome::Invalid(diagnostics) => {
            for diagnostic in &diagnostics {
                println!("{}", diagnostic.render(&name));
            }
            bail!("{}: {} problems found", name, diagnostics.len())
        }
    };

    let report = &processed.report;
    println!("TextGrid Analysis");
    println!("=================");
    println!(
        "File: {} (ID {}, RECN {}, Date {})",
        report.identity.filename, report.identity.id, report.identity.recn, report.identity.date
    );
    println!();

    println!("Reconciliation");
    println!("--------------");
    let changes = &report.reconcile;
    println!("Vowels inside repairs: {}", changes.segmental_to_repair);
    println!("Vowels inside filled pauses: {}", changes.segmental_to_filled_pause);
    println!("Repairs inserted into Phrases: {}", changes.phrase_repairs_inserted);
    println!("Phrases gaps filled: {}", changes.phrase_gaps_filled);
    println!("Second-language vowels: {}", changes.segmental_to_language);
    println!("Long vowels: {}", changes.segmental_to_long_vowel);
    println!();

    println!("Metrics");
    println!("-------");
    for (column, cell) in report.metrics.columns() {
        println!("{}: {}", column, cell);
    }

    Ok(())
}
