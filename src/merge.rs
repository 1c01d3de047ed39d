//! Cross-threshold summary table: one row per (Model, IOU), rewritten in full.

use crate::aggregate::{ModelSummaryRow, MODEL_SUMMARY_COLUMNS};
use crate::error::Result;
use crate::report::{validate_columns, write_records};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Upsert `new_rows` into `existing`, keyed on (model, iou).
///
/// Existing rows whose key appears in `new_rows` are replaced, all others are
/// kept. The result is sorted by model then threshold, so applying the same
/// rows twice yields the same table.
///
/// # Arguments
///
/// * `existing` - Rows already persisted, or `None` when there is no usable table
/// * `new_rows` - Model summary rows of the threshold just evaluated
///
/// # Returns
///
/// The merged table, sorted by `(model, iou)`.
///
/// # Example
///
/// ```
/// use doclaynet_eval::aggregate::ModelSummaryRow;
/// use doclaynet_eval::merge::merge;
///
/// let row = |map| ModelSummaryRow { model: "DETR".into(), iou: 50, map, mar: 0.5, f1: 0.5 };
/// let merged = merge(Some(vec![row(0.1)]), vec![row(0.9)]);
/// assert_eq!(merged, vec![row(0.9)]);
/// ```
pub fn merge(
    existing: Option<Vec<ModelSummaryRow>>,
    new_rows: Vec<ModelSummaryRow>,
) -> Vec<ModelSummaryRow> {
    let mut merged: Vec<ModelSummaryRow> = match existing {
        Some(existing) => {
            let replaced: HashSet<(&str, u32)> = new_rows
                .iter()
                .map(|row| (row.model.as_str(), row.iou))
                .collect();
            existing
                .into_iter()
                .filter(|row| !replaced.contains(&(row.model.as_str(), row.iou)))
                .collect()
        }
        None => Vec::new(),
    };
    merged.extend(new_rows);

    // Stable, so duplicate keys inside `new_rows` keep their given order.
    merged.sort_by(|a, b| a.model.cmp(&b.model).then(a.iou.cmp(&b.iou)));
    merged
}

/// The persistent `summary_across_IOUs.csv` file.
///
/// Updates are whole-table read-modify-write cycles; callers must not run
/// two [`CrossThresholdStore::upsert`] calls on the same path concurrently.
#[derive(Debug, Clone)]
pub struct CrossThresholdStore {
    path: PathBuf,
}

impl CrossThresholdStore {
    /// Default file name inside the output root.
    pub const FILE_NAME: &'static str = "summary_across_IOUs.csv";

    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store located in `output_root` under [`Self::FILE_NAME`].
    pub fn in_dir<P: AsRef<Path>>(output_root: P) -> Self {
        Self::new(output_root.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted rows.
    ///
    /// Returns `Ok(None)` when the file does not exist, when its header lacks
    /// the key columns, or when a row cannot be parsed (e.g. `IOU` stored as
    /// `50.0`). The last two are logged since the old content is about to be
    /// replaced.
    pub fn load(&self) -> Result<Option<Vec<ModelSummaryRow>>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let table = self.path.display().to_string();
        if let Err(err) = validate_columns(reader.headers()?, &table, &["Model", "IOU"]) {
            warn!("{err}; existing cross-threshold table is ignored and will be recreated");
            return Ok(None);
        }

        match reader
            .deserialize()
            .collect::<std::result::Result<Vec<ModelSummaryRow>, _>>()
        {
            Ok(rows) => Ok(Some(rows)),
            Err(err) => {
                warn!("Unreadable row in {table}: {err}; existing cross-threshold table is ignored and will be recreated");
                Ok(None)
            }
        }
    }

    /// Replace the persisted table with `rows`.
    ///
    /// The content goes to a temporary file next to the target which is then
    /// renamed over it, so readers never observe a half-written table.
    pub fn store(&self, rows: &[ModelSummaryRow]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        write_records(tmp.as_file_mut(), &MODEL_SUMMARY_COLUMNS, rows)?;
        tmp.as_file_mut().flush()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Load, merge `new_rows` in, and store the result.
    pub fn upsert(&self, new_rows: Vec<ModelSummaryRow>) -> Result<Vec<ModelSummaryRow>> {
        let merged = merge(self.load()?, new_rows);
        self.store(&merged)?;
        info!(
            "Summary of all IOUs stored in: {} ({} rows)",
            self.path.display(),
            merged.len()
        );
        Ok(merged)
    }
}

/// Read a model summary file written by [`crate::aggregate::write_model_summary`].
pub fn read_model_summary<P: AsRef<Path>>(path: P) -> Result<Vec<ModelSummaryRow>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    validate_columns(
        reader.headers()?,
        &path.display().to_string(),
        &MODEL_SUMMARY_COLUMNS,
    )?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ModelSummaryRow>, _>>()?;
    Ok(rows)
}
