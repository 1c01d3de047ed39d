use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use doclaynet_eval::aggregate::{extract_averages, write_averages};
use doclaynet_eval::config::{EvalConfig, OutputLayout, DEFAULT_OUTPUT_DIR};
use doclaynet_eval::evaluator::{run, summarize_threshold};
use doclaynet_eval::stats::EvalStats;
use doclaynet_eval::threshold::{percent_key, validate_threshold};
use doclaynet_eval::{CategoryFilter, EvalError, Source};

/// Evaluate DocLayNet layout detectors at fixed IoU thresholds
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match predictions against ground truth and write every table
    Evaluate(EvaluateArgs),
    /// Re-aggregate existing per-image tables of one threshold
    Summarize(ThresholdArgs),
    /// Collect the AVERAGE row of every per-image table of one threshold
    Extract(ThresholdArgs),
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Ground-truth annotations in COCO JSON format
    #[arg(long, env = "GT_JSON", value_name = "FILE")]
    gt_json: Option<PathBuf>,

    /// Folder with one prediction JSON per page
    #[arg(long, env = "PRED_FOLDER", value_name = "DIR")]
    pred_folder: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,

    /// IoU thresholds to sweep (repeatable; default 0.5, 0.75, 0.9)
    #[arg(long = "iou", value_name = "THRESHOLD")]
    thresholds: Vec<f64>,
}

#[derive(Args, Debug)]
struct ThresholdArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// IoU threshold whose tables are read
    #[arg(long = "iou", value_name = "THRESHOLD")]
    threshold: f64,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Root directory for every produced table
    #[arg(long, env = "EVAL_OUTPUT", default_value = DEFAULT_OUTPUT_DIR, value_name = "DIR")]
    output: PathBuf,

    /// Named prediction sources (default DETR,FRCNN); ALL is always added
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    sources: Vec<String>,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    // RUST_LOG wins unless a verbosity flag was given explicitly.
    let filter = if verbose == 0 && !quiet {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    } else {
        EnvFilter::new(default_level)
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Configured sources, or the defaults, always ending with the pooled pass.
fn sources(common: &CommonArgs) -> Vec<Source> {
    if common.sources.is_empty() {
        Source::defaults()
    } else {
        Source::with_pooled(common.sources.iter().cloned())
    }
}

fn evaluate(args: EvaluateArgs) -> Result<ExitCode> {
    let config = EvalConfig::from_parts(
        args.gt_json,
        args.pred_folder,
        args.common.output,
        &args.thresholds,
        &args.common.sources,
    )?;

    info!("Ground truth: {}", config.ground_truth.display());
    info!("Predictions: {}", config.predictions.display());
    info!("Output: {}", config.layout.root().display());

    let report = run(&config).context("evaluation could not start")?;

    if report.thresholds.is_empty() {
        error!("No IoU threshold could be evaluated");
        return Ok(ExitCode::FAILURE);
    }
    if report.stats.failed_units > 0 {
        warn!("{} evaluation passes failed", report.stats.failed_units);
    }
    if report.stats.failed_merges > 0 {
        warn!(
            "{} thresholds are missing from the cross-threshold table",
            report.stats.failed_merges
        );
    }

    for row in &report.cross_threshold {
        info!(
            "{:<8} IOU={:>3}  mAP={:.4}  mAR={:.4}  F1={:.4}",
            row.model, row.iou, row.map, row.mar, row.f1
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn summarize(args: ThresholdArgs) -> Result<ExitCode> {
    validate_threshold(args.threshold)?;
    let layout = OutputLayout::new(&args.common.output);
    let iou = percent_key(args.threshold);

    info!("--- Calculate metrics from CSVs for IOU={iou} ---");
    let mut stats = EvalStats::new();
    let filters = CategoryFilter::sweep();
    let (summary, merged) =
        summarize_threshold(&layout, &sources(&args.common), &filters, iou, &mut stats)
            .with_context(|| format!("summarizing IOU={iou}"))?;

    info!(
        "{} model rows, {} category rows; cross-threshold table has {} rows",
        summary.models.len(),
        summary.categories.len(),
        merged.len()
    );
    stats.log_summary();
    Ok(ExitCode::SUCCESS)
}

fn extract(args: ThresholdArgs) -> Result<ExitCode> {
    validate_threshold(args.threshold)?;
    let layout = OutputLayout::new(&args.common.output);
    let iou = percent_key(args.threshold);

    let dir = layout.threshold_dir(iou);
    let averages =
        extract_averages(&dir).with_context(|| format!("reading tables in {}", dir.display()))?;
    let path = layout.averages_path(iou);
    write_averages(&path, &averages)?;
    info!("Summary successfully written to: {} ({} tables)", path.display(), averages.len());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let outcome = match cli.command {
        Command::Evaluate(args) => evaluate(args),
        Command::Summarize(args) => summarize(args),
        Command::Extract(args) => extract(args),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            if let Some(EvalError::Configuration(msg)) = err.downcast_ref::<EvalError>() {
                error!("Configuration error: {msg}");
            } else {
                error!("{err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
