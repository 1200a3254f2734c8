//! Microtrait CLI - Command-line interface
//!
//! Usage:
//!   microtrait extract <records.jsonl>
//!   microtrait evaluate <rows.jsonl> [--json]
//!   microtrait worklist <rows.jsonl>
//!
//! Input files hold one JSON object per line; `-` reads standard input.
//! Results go to standard output, logs to standard error.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use microtrait_core::config::LoggingConfig;
use microtrait_core::{AppConfig, TextRecord, TraitRecord};
use microtrait_extractor::{BatchPipeline, PatternLibrary};

#[derive(Parser)]
#[command(name = "microtrait")]
#[command(about = "Microsporidia trait extraction and evaluation")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults plus MICROTRAIT_* environment otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract traits from title/abstract records
    Extract {
        /// JSON Lines file of records with id, title and abstract
        input: PathBuf,
    },
    /// Score predictions against recorded values
    Evaluate {
        /// JSON Lines file of rows with recorded/predicted trait fields
        input: PathBuf,
        /// Print the full batch report as JSON
        #[arg(long)]
        json: bool,
        /// Score recorded names as listed, without aligning them to the text
        #[arg(long)]
        no_resolve: bool,
    },
    /// List recorded names that the text never mentions
    Worklist {
        /// JSON Lines file of rows with recorded trait fields
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    let patterns = PatternLibrary::new(&config.extraction).context("compiling patterns")?;
    let pipeline = BatchPipeline::new(&patterns, &config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Extract { input } => {
            let records: Vec<TextRecord> = read_jsonl(&input)?;
            for prediction in pipeline.extract_batch(&records)? {
                writeln!(out, "{}", serde_json::to_string(&prediction)?)?;
            }
        }
        Commands::Evaluate {
            input,
            json,
            no_resolve,
        } => {
            let rows: Vec<TraitRecord> = read_jsonl(&input)?;
            let report = pipeline
                .with_name_resolution(!no_resolve)
                .process_batch(&rows);

            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                write!(out, "{}", report.aggregate.report())?;
                for error in &report.errors {
                    writeln!(out, "Skipped {}", error)?;
                }
            }
        }
        Commands::Worklist { input } => {
            let rows: Vec<TraitRecord> = read_jsonl(&input)?;
            let report = pipeline.process_batch(&rows);
            for item in report.worklist.pending_items() {
                writeln!(out, "{}", serde_json::to_string(item)?)?;
            }
            tracing::info!(
                pending = report.worklist.stats().pending,
                "Worklist written"
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "microtrait_cli={level},microtrait_extractor={level},microtrait_core={level}",
            level = logging.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read one JSON value per non-blank line
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut values = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), index + 1))?;
        values.push(value);
    }

    tracing::info!(path = %path.display(), records = values.len(), "Loaded input");
    Ok(values)
}
