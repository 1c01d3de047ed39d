//! Model- and category-level summaries of the per-image tables of one threshold.
//!
//! Every summary value is a macro average: the plain mean of per-image rates
//! across all contributing rows, rounded to [`SUMMARY_PRECISION`] places.

use crate::error::{EvalError, Result};
use crate::metrics::precision_recall::SUMMARY_PRECISION;
use crate::report::{validate_columns, write_records, ImageTable, Rates};
use crate::types::{CategoryFilter, Source};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Header of model summary tables and of the cross-threshold table.
pub const MODEL_SUMMARY_COLUMNS: [&str; 5] = ["Model", "IOU", "mAP", "mAR", "F1"];

/// Header of the category summary table.
pub const CATEGORY_SUMMARY_COLUMNS: [&str; 6] =
    ["category", "source", "Precision", "Recall", "F1-Score", "IOU"];

/// Header of the extracted AVERAGE-row table.
pub const AVERAGE_COLUMNS: [&str; 4] = ["Filename", "Precision", "Recall", "F1"];

/// Macro summary of one model at one IoU threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummaryRow {
    #[serde(rename = "Model")]
    pub model: String,
    /// Threshold as an integer percent, e.g. 50 for 0.5.
    #[serde(rename = "IOU")]
    pub iou: u32,
    #[serde(rename = "mAP")]
    pub map: f64,
    #[serde(rename = "mAR")]
    pub mar: f64,
    #[serde(rename = "F1")]
    pub f1: f64,
}

/// Summary of one (category filter, model) pair at one IoU threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummaryRow {
    pub category: String,
    pub source: String,
    #[serde(rename = "Precision")]
    pub precision: f64,
    #[serde(rename = "Recall")]
    pub recall: f64,
    #[serde(rename = "F1-Score")]
    pub f1: f64,
    #[serde(rename = "IOU")]
    pub iou: u32,
}

/// AVERAGE row of one per-image table file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageRow {
    #[serde(rename = "Filename")]
    pub file_name: String,
    #[serde(rename = "Precision")]
    pub precision: f64,
    #[serde(rename = "Recall")]
    pub recall: f64,
    #[serde(rename = "F1")]
    pub f1: f64,
}

/// Output of [`summarize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub models: Vec<ModelSummaryRow>,
    pub categories: Vec<CategorySummaryRow>,
}

/// Tables read back from a threshold directory.
#[derive(Debug, Default)]
pub struct LoadedTables {
    pub tables: Vec<ImageTable>,
    /// Files that were absent or unreadable, with the reason.
    pub skipped: Vec<(PathBuf, EvalError)>,
}

/// Fold the per-image tables of one threshold into model and category summaries.
///
/// Model rows pool every page row of every category pass of a source, the
/// `ALL` pass included. Category rows use the rows of one table. Groups
/// without rows are omitted. Output follows first appearance in `tables`.
///
/// # Arguments
///
/// * `tables` - Per-image tables of one threshold, AVERAGE rows excluded
/// * `iou` - Threshold as an integer percent, copied into every row
///
/// # Returns
///
/// A [`Summary`] holding one model row per source and one category row per
/// (filter, source) pair.
pub fn summarize(tables: &[ImageTable], iou: u32) -> Summary {
    let mut by_source: Vec<(&Source, Vec<Rates>)> = Vec::new();
    let mut by_category: Vec<((CategoryFilter, &Source), Vec<Rates>)> = Vec::new();

    for table in tables {
        let rates = table.rows.iter().map(|row| row.rates);

        match by_source.iter_mut().find(|(source, _)| *source == &table.source) {
            Some((_, collected)) => collected.extend(rates.clone()),
            None => by_source.push((&table.source, rates.clone().collect())),
        }

        let key = (table.filter, &table.source);
        match by_category.iter_mut().find(|(k, _)| *k == key) {
            Some((_, collected)) => collected.extend(rates),
            None => by_category.push((key, rates.collect())),
        }
    }

    let models = by_source
        .into_iter()
        .filter_map(|(source, rates)| {
            let avg = Rates::mean_of(&rates, SUMMARY_PRECISION)?;
            Some(ModelSummaryRow {
                model: source.to_string(),
                iou,
                map: avg.precision,
                mar: avg.recall,
                f1: avg.f1,
            })
        })
        .collect();

    let categories = by_category
        .into_iter()
        .filter_map(|((filter, source), rates)| {
            let avg = Rates::mean_of(&rates, SUMMARY_PRECISION)?;
            Some(CategorySummaryRow {
                category: filter.to_string(),
                source: source.to_string(),
                precision: avg.precision,
                recall: avg.recall,
                f1: avg.f1,
                iou,
            })
        })
        .collect();

    Summary { models, categories }
}

/// Read every expected (source, filter) table from a threshold directory.
///
/// A missing or malformed table is logged and skipped; its siblings are
/// still loaded. Errors that are not confined to one table (see
/// [`EvalError::is_recoverable`]) are returned.
pub fn load_tables(
    dir: &Path,
    sources: &[Source],
    filters: &[CategoryFilter],
) -> Result<LoadedTables> {
    let mut loaded = LoadedTables::default();

    for source in sources {
        for &filter in filters {
            let path = dir.join(crate::report::table_file_name(source, filter));
            let result = if path.is_file() {
                ImageTable::read_csv(&path, source.clone(), filter)
            } else {
                Err(EvalError::MissingInput(path.display().to_string()))
            };

            match result {
                Ok(table) => {
                    debug!("Loaded {} rows from {}", table.rows.len(), path.display());
                    loaded.tables.push(table);
                }
                Err(err) if err.is_recoverable() => {
                    warn!("Skipping table {}: {}", path.display(), err);
                    loaded.skipped.push((path, err));
                }
                Err(err) => return Err(err),
            }
        }
    }

    Ok(loaded)
}

/// Write a model summary table.
pub fn write_model_summary<P: AsRef<Path>>(path: P, rows: &[ModelSummaryRow]) -> Result<()> {
    write_records(File::create(path)?, &MODEL_SUMMARY_COLUMNS, rows)
}

/// Write a category summary table.
pub fn write_category_summary<P: AsRef<Path>>(path: P, rows: &[CategorySummaryRow]) -> Result<()> {
    write_records(File::create(path)?, &CATEGORY_SUMMARY_COLUMNS, rows)
}

/// Collect the AVERAGE row of every per-image table file in `dir`.
///
/// Files are those whose name contains `evaluation`, ends in `.csv` and does
/// not start with `__`. A file without data rows, or whose last row does not
/// end in three numeric rate columns, is logged and skipped.
pub fn extract_averages(dir: &Path) -> Result<Vec<AverageRow>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            name.ends_with(".csv") && name.contains("evaluation") && !name.starts_with("__")
        })
        .collect();
    names.sort();

    let mut averages = Vec::new();
    for name in names {
        match read_last_rates(&dir.join(&name)) {
            Ok(Some(rates)) => averages.push(AverageRow {
                file_name: name,
                precision: rates.precision,
                recall: rates.recall,
                f1: rates.f1,
            }),
            Ok(None) => debug!("No data rows in {name}"),
            Err(err) => warn!("Error processing {name}: {err}"),
        }
    }

    Ok(averages)
}

/// Write the extracted AVERAGE rows.
pub fn write_averages<P: AsRef<Path>>(path: P, rows: &[AverageRow]) -> Result<()> {
    write_records(File::create(path)?, &AVERAGE_COLUMNS, rows)
}

fn read_last_rates(path: &Path) -> Result<Option<Rates>> {
    let mut reader = csv::Reader::from_path(path)?;
    let table = path.display().to_string();
    validate_columns(reader.headers()?, &table, &["Precision", "Recall", "F1-Score"])?;

    let mut last = None;
    for record in reader.records() {
        last = Some(record?);
    }
    let Some(record) = last else {
        return Ok(None);
    };

    let parse = |offset: usize| -> Result<f64> {
        let field = record
            .len()
            .checked_sub(offset)
            .and_then(|idx| record.get(idx))
            .ok_or_else(|| EvalError::MissingColumn {
                table: table.clone(),
                column: format!("rate column -{offset}"),
            })?;
        field.trim().parse().map_err(|_| {
            EvalError::InvalidAnnotation(format!("Non-numeric rate '{field}' in {table}"))
        })
    };

    Ok(Some(Rates {
        precision: parse(3)?,
        recall: parse(2)?,
        f1: parse(1)?,
    }))
}
