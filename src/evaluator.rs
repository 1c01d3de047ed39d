//! Main evaluation orchestrator for the multi-threshold sweep.
//!
//! For each IoU threshold and each category filter (the eleven classes, then
//! `ALL`), every page is matched once per source. Pages are independent and
//! are evaluated in parallel; rows are put back in page order before a table
//! is written. Aggregation and the cross-threshold merge then run on the
//! calling thread.

use crate::aggregate::{
    extract_averages, load_tables, summarize, write_averages, write_category_summary,
    write_model_summary, AverageRow, ModelSummaryRow, Summary,
};
use crate::config::{EvalConfig, OutputLayout};
use crate::error::{EvalError, Result};
use crate::loader::{load_ground_truth, load_predictions, GroundTruth, PredictionSet};
use crate::matching::{match_detections, select_ground_truth, select_predictions};
use crate::report::{ImageMetricRow, ImageTable};
use crate::stats::EvalStats;
use crate::threshold::{percent_key, validate_threshold};
use crate::types::{Annotation, CategoryFilter, Prediction, Source};
use rayon::prelude::*;
use std::fs;
use tracing::{debug, error, info};

/// Everything produced for one IoU threshold.
#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub threshold: f64,
    pub iou: u32,
    pub tables: Vec<ImageTable>,
    pub summary: Summary,
    pub averages: Vec<AverageRow>,
}

/// Outcome of a full sweep.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub thresholds: Vec<ThresholdReport>,
    /// Content of the cross-threshold table after the last merge.
    pub cross_threshold: Vec<ModelSummaryRow>,
    pub stats: EvalStats,
}

/// Evaluate one page for every source under one category filter.
///
/// Returns one row per source, in the order of `sources`.
pub fn evaluate_page(
    image: &str,
    ground_truth: &[Annotation],
    predictions: &[Prediction],
    sources: &[Source],
    filter: CategoryFilter,
    threshold: f64,
) -> Vec<ImageMetricRow> {
    let gt_boxes = select_ground_truth(ground_truth, filter);

    sources
        .iter()
        .map(|source| {
            let pred_boxes = select_predictions(predictions, source, filter);
            let result = match_detections(&pred_boxes, &gt_boxes, threshold);
            debug!(
                "{image} [{source}/{filter}]: TP={} FP={} FN={}",
                result.true_positives, result.false_positives, result.false_negatives
            );
            ImageMetricRow::from_match(image, &result)
        })
        .collect()
}

/// Build one table per source for a single category filter.
///
/// Pages are taken from `predictions`; pages without a prediction file are
/// not evaluated.
pub fn evaluate_pass(
    ground_truth: &GroundTruth,
    predictions: &PredictionSet,
    sources: &[Source],
    filter: CategoryFilter,
    threshold: f64,
) -> Vec<ImageTable> {
    let page_rows: Vec<Vec<ImageMetricRow>> = predictions
        .pages
        .par_iter()
        .map(|page| {
            evaluate_page(
                &page.image,
                ground_truth.for_page(&page.image),
                &page.predictions,
                sources,
                filter,
                threshold,
            )
        })
        .collect();

    let mut tables: Vec<ImageTable> = sources
        .iter()
        .map(|source| ImageTable::new(source.clone(), filter))
        .collect();

    for rows in page_rows {
        for (table, row) in tables.iter_mut().zip(rows) {
            table.push(row);
        }
    }

    for table in &mut tables {
        table.sort_rows();
    }
    tables
}

/// Build every table of one threshold, without touching the filesystem.
pub fn evaluate_threshold(
    ground_truth: &GroundTruth,
    predictions: &PredictionSet,
    sources: &[Source],
    filters: &[CategoryFilter],
    threshold: f64,
) -> Result<Vec<ImageTable>> {
    validate_threshold(threshold)?;
    Ok(filters
        .iter()
        .flat_map(|&filter| evaluate_pass(ground_truth, predictions, sources, filter, threshold))
        .collect())
}

/// Evaluate, persist and summarize one threshold.
///
/// A category pass whose tables cannot be written is logged, counted in
/// `stats` and left out of the summaries; the remaining passes continue.
pub fn run_threshold(
    config: &EvalConfig,
    ground_truth: &GroundTruth,
    predictions: &PredictionSet,
    threshold: f64,
    stats: &mut EvalStats,
) -> Result<ThresholdReport> {
    let iou = percent_key(threshold);
    info!("--- Start evaluation for IOU={threshold:.2} ---");

    let evaluated = evaluate_threshold(
        ground_truth,
        predictions,
        &config.sources,
        &config.filters,
        threshold,
    )?;

    let layout = &config.layout;
    fs::create_dir_all(layout.threshold_dir(iou))?;

    // One chunk per category pass, in the order of `config.filters`.
    let mut tables = Vec::new();
    for pass in evaluated.chunks(config.sources.len().max(1)) {
        let filter = pass[0].filter;
        match write_tables(layout, iou, pass) {
            Ok(()) => tables.extend_from_slice(pass),
            Err(err) => {
                error!("Skipping category {filter} at IOU={iou}: {err}");
                stats.failed_units += 1;
            }
        }
    }

    let summary = summarize(&tables, iou);
    let averages = persist_summary(layout, iou, &summary)?;

    Ok(ThresholdReport {
        threshold,
        iou,
        tables,
        summary,
        averages,
    })
}

fn write_tables(layout: &OutputLayout, iou: u32, tables: &[ImageTable]) -> Result<()> {
    for table in tables {
        let path = layout.table_path(iou, &table.source, table.filter);
        table.write_csv(&path)?;
        debug!("Results saved to: {}", path.display());
    }
    Ok(())
}

/// Write the model and category summaries and the AVERAGE-row extract.
fn persist_summary(layout: &OutputLayout, iou: u32, summary: &Summary) -> Result<Vec<AverageRow>> {
    let model_path = layout.model_summary_path(iou);
    write_model_summary(&model_path, &summary.models)?;
    info!("Comparison table saved in: {}", model_path.display());

    let category_path = layout.category_summary_path(iou);
    write_category_summary(&category_path, &summary.categories)?;
    info!("Category comparison saved in: {}", category_path.display());

    let averages = extract_averages(&layout.threshold_dir(iou))?;
    write_averages(layout.averages_path(iou), &averages)?;
    Ok(averages)
}

/// Re-aggregate the tables already on disk for one threshold and merge the
/// result into the cross-threshold table.
///
/// Missing or malformed tables are skipped and counted in `stats`.
pub fn summarize_threshold(
    layout: &OutputLayout,
    sources: &[Source],
    filters: &[CategoryFilter],
    iou: u32,
    stats: &mut EvalStats,
) -> Result<(Summary, Vec<ModelSummaryRow>)> {
    let dir = layout.threshold_dir(iou);
    if !dir.is_dir() {
        return Err(EvalError::MissingInput(format!(
            "No tables for IOU={iou} in {}",
            dir.display()
        )));
    }

    let loaded = load_tables(&dir, sources, filters)?;
    stats.skipped_tables += loaded.skipped.len();

    let summary = summarize(&loaded.tables, iou);
    persist_summary(layout, iou, &summary)?;
    let merged = layout.cross_threshold_store().upsert(summary.models.clone())?;
    Ok((summary, merged))
}

/// Run the full sweep described by `config`.
///
/// Configuration and input-loading failures abort before any evaluation.
/// A threshold that fails afterwards is logged and skipped; the sweep moves
/// on to the next one. A threshold whose tables and summaries were written
/// but whose merge into the cross-threshold table failed is still reported.
///
/// # Arguments
///
/// * `config` - Input locations, output root, thresholds, sources and filters
///
/// # Returns
///
/// A [`RunReport`] with one entry per evaluated threshold, the final content
/// of the cross-threshold table and the run statistics.
pub fn run(config: &EvalConfig) -> Result<RunReport> {
    config.validate()?;

    let document = load_ground_truth(&config.ground_truth)?;
    let ground_truth = GroundTruth::from_document(&document)?;
    let predictions = load_predictions(&config.predictions)?;

    let mut report = RunReport::default();
    report.stats.pages = predictions.pages.len();
    report.stats.predictions = predictions.prediction_count();
    report.stats.skipped_annotations = ground_truth.skipped;
    report.stats.skipped_prediction_files = predictions.skipped_files;
    report.stats.skipped_predictions = predictions.skipped_predictions;

    info!(
        "Loaded {} annotations on {} pages and {} predictions on {} pages",
        ground_truth.annotation_count(),
        ground_truth.page_count(),
        report.stats.predictions,
        report.stats.pages
    );

    let store = config.layout.cross_threshold_store();
    for &threshold in &config.thresholds {
        let threshold_report =
            match run_threshold(config, &ground_truth, &predictions, threshold, &mut report.stats) {
                Ok(threshold_report) => threshold_report,
                Err(err) => {
                    error!("Evaluation for IOU={threshold:.2} failed: {err}");
                    report.stats.failed_units += 1;
                    continue;
                }
            };

        match store.upsert(threshold_report.summary.models.clone()) {
            Ok(merged) => report.cross_threshold = merged,
            Err(err) => {
                error!(
                    "Could not merge IOU={threshold:.2} into {}: {err}",
                    store.path().display()
                );
                report.stats.failed_merges += 1;
            }
        }
        report.thresholds.push(threshold_report);
    }

    report.stats.log_summary();
    Ok(report)
}
