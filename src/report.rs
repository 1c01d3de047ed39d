//! Per-image metric rows and the CSV tables that hold them.
//!
//! One [`ImageTable`] is produced per (source, category filter, IoU threshold).
//! Each row carries the confusion counts of one page and its rates rounded to
//! [`ROW_PRECISION`] places. The synthetic `AVERAGE` row is the column-wise mean
//! of the stored rates, never a rate recomputed from summed counts.

use crate::error::{EvalError, Result};
use crate::matching::MatchResult;
use crate::metrics::f1_score::rates_from_counts;
use crate::metrics::precision_recall::{mean, round_to, ROW_PRECISION};
use crate::types::{CategoryFilter, Source};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Image column value of the synthetic summary row.
pub const AVERAGE_LABEL: &str = "AVERAGE";

/// Column header of the per-image table, in file order.
pub const IMAGE_TABLE_COLUMNS: [&str; 7] =
    ["Image", "TP", "FP", "FN", "Precision", "Recall", "F1-Score"];

/// Precision, recall and F1 of one row or one aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rates {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Rates {
    /// Column-wise mean of `rates` rounded to `places`, `None` when empty.
    pub fn mean_of(rates: &[Rates], places: i32) -> Option<Rates> {
        let precision: Vec<f64> = rates.iter().map(|r| r.precision).collect();
        let recall: Vec<f64> = rates.iter().map(|r| r.recall).collect();
        let f1: Vec<f64> = rates.iter().map(|r| r.f1).collect();
        Some(Rates {
            precision: round_to(mean(&precision)?, places),
            recall: round_to(mean(&recall)?, places),
            f1: round_to(mean(&f1)?, places),
        })
    }
}

/// Metrics for a single page within one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetricRow {
    pub image: String,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub rates: Rates,
}

impl ImageMetricRow {
    /// Build a row from raw counts; rates are rounded here and only here.
    pub fn from_counts(
        image: impl Into<String>,
        true_positives: usize,
        false_positives: usize,
        false_negatives: usize,
    ) -> Self {
        let (precision, recall, f1) =
            rates_from_counts(true_positives, false_positives, false_negatives, ROW_PRECISION);
        Self {
            image: image.into(),
            true_positives,
            false_positives,
            false_negatives,
            rates: Rates {
                precision,
                recall,
                f1,
            },
        }
    }

    /// Build a row from a matcher outcome.
    pub fn from_match(image: impl Into<String>, result: &MatchResult) -> Self {
        Self::from_counts(
            image,
            result.true_positives,
            result.false_positives,
            result.false_negatives,
        )
    }
}

/// CSV shape shared by page rows and the AVERAGE row.
#[derive(Debug, Serialize, Deserialize)]
struct ImageRecord {
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "TP")]
    true_positives: Option<usize>,
    #[serde(rename = "FP")]
    false_positives: Option<usize>,
    #[serde(rename = "FN")]
    false_negatives: Option<usize>,
    #[serde(rename = "Precision")]
    precision: f64,
    #[serde(rename = "Recall")]
    recall: f64,
    #[serde(rename = "F1-Score")]
    f1: f64,
}

/// All page rows for one (source, category filter) pass at one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTable {
    pub source: Source,
    pub filter: CategoryFilter,
    pub rows: Vec<ImageMetricRow>,
}

impl ImageTable {
    pub fn new(source: Source, filter: CategoryFilter) -> Self {
        Self {
            source,
            filter,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ImageMetricRow) {
        self.rows.push(row);
    }

    /// Stable sort by page identifier; applied before a table is persisted.
    pub fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| a.image.cmp(&b.image));
    }

    /// Mean of the stored per-row rates, `None` for an empty table.
    pub fn average(&self) -> Option<Rates> {
        let rates: Vec<Rates> = self.rows.iter().map(|row| row.rates).collect();
        Rates::mean_of(&rates, ROW_PRECISION)
    }

    /// File name of this table inside its threshold directory.
    pub fn file_name(&self) -> String {
        table_file_name(&self.source, self.filter)
    }

    /// Write the table, followed by the AVERAGE row when non-empty.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        // Header is written by hand so empty tables still carry it.
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(IMAGE_TABLE_COLUMNS)?;

        for row in &self.rows {
            csv_writer.serialize(ImageRecord {
                image: row.image.clone(),
                true_positives: Some(row.true_positives),
                false_positives: Some(row.false_positives),
                false_negatives: Some(row.false_negatives),
                precision: row.rates.precision,
                recall: row.rates.recall,
                f1: row.rates.f1,
            })?;
        }

        if let Some(avg) = self.average() {
            csv_writer.serialize(ImageRecord {
                image: AVERAGE_LABEL.to_string(),
                true_positives: None,
                false_positives: None,
                false_negatives: None,
                precision: avg.precision,
                recall: avg.recall,
                f1: avg.f1,
            })?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write the table to `path`, replacing any previous content.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }

    /// Parse a table; the AVERAGE row is dropped since it is derived.
    ///
    /// `name` is used in error messages only.
    pub fn read_from<R: Read>(
        reader: R,
        name: &str,
        source: Source,
        filter: CategoryFilter,
    ) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        validate_columns(
            csv_reader.headers()?,
            name,
            &["Image", "Precision", "Recall", "F1-Score"],
        )?;

        let mut table = ImageTable::new(source, filter);
        for record in csv_reader.deserialize() {
            let record: ImageRecord = record?;
            if record.image == AVERAGE_LABEL {
                continue;
            }
            table.push(ImageMetricRow {
                image: record.image,
                true_positives: record.true_positives.unwrap_or_default(),
                false_positives: record.false_positives.unwrap_or_default(),
                false_negatives: record.false_negatives.unwrap_or_default(),
                rates: Rates {
                    precision: record.precision,
                    recall: record.recall,
                    f1: record.f1,
                },
            });
        }

        Ok(table)
    }

    /// Read a table from `path`.
    pub fn read_csv<P: AsRef<Path>>(path: P, source: Source, filter: CategoryFilter) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::read_from(file, &path.display().to_string(), source, filter)
    }
}

/// Write `rows` under a fixed header; the header is emitted even with no rows.
pub fn write_records<T, W>(writer: W, columns: &[&str], rows: &[T]) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(columns)?;
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// `DOCLAYNET_evaluation_<source>_<category>.csv`
pub fn table_file_name(source: &Source, filter: CategoryFilter) -> String {
    format!("DOCLAYNET_evaluation_{source}_{filter}.csv")
}

/// Check that every required column is present in a CSV header.
pub fn validate_columns(headers: &csv::StringRecord, table: &str, required: &[&str]) -> Result<()> {
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(EvalError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}
