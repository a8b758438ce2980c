//! Docsweep CLI - turn a zip of office documents into a contact spreadsheet
//!
//! Reads an archive from disk, runs it through the docsweep-core pipeline,
//! and writes the resulting xlsx next to the caller.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use console::style;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use docsweep_core::{
    ArchiveUpload, CancellationToken, ConfigManager, FailureKind, Pipeline, PipelineConfig,
    PipelineError, RunOutcome,
};

/// Decoder crates that log every malformed object they skip
const QUIET_DECODERS: [&str; 2] = ["pdf_extract=error", "lopdf=error"];

#[derive(Parser)]
#[command(name = "docsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract emails and phone numbers from a zip of PDF/DOC/DOCX files", long_about = None)]
struct Cli {
    /// Zip archive to process
    archive: PathBuf,

    /// Where to write the spreadsheet
    #[arg(short, long, default_value = "output.xlsx")]
    output: PathBuf,

    /// Directory under which the per-run working directory is created
    #[arg(long)]
    scratch: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leave extracted files in place while walking (the working directory is still removed)
    #[arg(long)]
    keep_files: bool,

    /// Maximum number of documents extracted at once
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    report: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", style(format!("Error: {:#}", e)).red());
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(cli.verbose, &config.log_level) {
        eprintln!("{}", style(format!("Warning: logging disabled: {:#}", e)).yellow());
    }

    match run(&cli, config).await {
        Ok(outcome) => {
            print_summary(&cli.output, &outcome);
            if cli.report {
                print_report(&outcome);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<PipelineError>() {
                Some(pipeline_err) => {
                    let kind = pipeline_err.kind();
                    eprintln!("{}", style(format!("Error: {}", kind.user_message())).red());
                    ExitCode::from(exit_code(kind))
                }
                None => {
                    eprintln!("{}", style(format!("Error: {:#}", e)).red());
                    ExitCode::from(1)
                }
            }
        }
    }
}

/// Load config from `--config` or the default location, then apply flags
fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            ConfigManager::with_path(path.clone())?.into_config()
        }
        // A broken default config should not block one-off runs
        None => ConfigManager::new()
            .map(ConfigManager::into_config)
            .unwrap_or_default(),
    };

    if cli.keep_files {
        config.delete_after_process = false;
    }
    if let Some(jobs) = cli.jobs {
        config.max_concurrency = jobs;
    }
    config.validate()?;

    Ok(config)
}

/// Setup logging: `RUST_LOG` wins, then `--verbose`, then the configured level
fn init_logging(verbose: bool, log_level: &str) -> anyhow::Result<()> {
    let fallback = if verbose {
        "info,docsweep_core=debug"
    } else {
        log_level
    };
    let mut filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback)?,
    };

    for directive in QUIET_DECODERS {
        filter = filter.add_directive(directive.parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

async fn run(cli: &Cli, config: PipelineConfig) -> anyhow::Result<RunOutcome> {
    if !cli.archive.is_file() {
        return Err(PipelineError::NoInput(format!(
            "{} is not a file",
            cli.archive.display()
        ))
        .into());
    }

    let upload = ArchiveUpload::from_path(&cli.archive).await?;
    let scratch = cli.scratch.clone().unwrap_or_else(std::env::temp_dir);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let pipeline = Pipeline::new(config);
    let outcome = pipeline.run_in(upload, &scratch, &cancel).await?;

    tokio::fs::write(&cli.output, &outcome.document.bytes)
        .await
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    Ok(outcome)
}

/// User mistakes exit with 2, everything else with 1
fn exit_code(kind: FailureKind) -> u8 {
    match kind {
        FailureKind::NoInput | FailureKind::CorruptArchive | FailureKind::PathTraversal => 2,
        _ => 1,
    }
}

fn print_summary(output: &Path, outcome: &RunOutcome) {
    println!(
        "{} {} ({} rows)",
        style("Wrote").bold().green(),
        output.display(),
        outcome.records.len()
    );

    let walk = &outcome.walk;
    if walk.unsupported > 0 {
        println!("  {} unsupported files skipped", style(walk.unsupported).yellow());
    }
    if walk.extraction_failures + walk.timeouts > 0 {
        println!(
            "  {} documents produced no text ({} failed, {} timed out)",
            style(walk.extraction_failures + walk.timeouts).yellow(),
            walk.extraction_failures,
            walk.timeouts
        );
    }
}

fn print_report(outcome: &RunOutcome) {
    let report = serde_json::json!({
        "expansion": outcome.expansion,
        "walk": outcome.walk,
        "output": {
            "file_name": outcome.document.file_name,
            "mime_type": outcome.document.mime_type,
            "bytes": outcome.document.bytes.len(),
        },
    });
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{}", style(format!("Failed to render report: {}", e)).red()),
    }
}
