//! Statistics tracking for an evaluation run
//!
//! Counts what was evaluated and what was skipped while loading inputs and
//! aggregating tables, so that skipped work is reported rather than lost.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Statistics collected during one evaluation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalStats {
    /// Number of pages with a prediction file
    pub pages: usize,

    /// Total number of predictions loaded
    pub predictions: usize,

    /// Ground-truth annotations skipped due to unknown images or categories
    pub skipped_annotations: usize,

    /// Prediction files that could not be parsed
    pub skipped_prediction_files: usize,

    /// Predictions skipped due to malformed boxes
    pub skipped_predictions: usize,

    /// Per-image tables that were missing or malformed at aggregation time
    pub skipped_tables: usize,

    /// (threshold, category) passes that failed and were skipped
    pub failed_units: usize,

    /// Thresholds whose results could not be merged into the cross-threshold table
    pub failed_merges: usize,
}

impl EvalStats {
    /// Create a new `EvalStats` with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of inputs skipped anywhere in the run
    pub fn total_skipped(&self) -> usize {
        self.skipped_annotations
            + self.skipped_prediction_files
            + self.skipped_predictions
            + self.skipped_tables
    }

    /// Log a summary of the run, at `warn` level when anything was skipped
    pub fn log_summary(&self) {
        info!("{}", self.summary_string());
        if self.total_skipped() > 0 || self.failed_units > 0 || self.failed_merges > 0 {
            warn!(
                "Skipped: {} annotations, {} prediction files, {} predictions, {} tables; {} failed passes, {} failed merges",
                self.skipped_annotations,
                self.skipped_prediction_files,
                self.skipped_predictions,
                self.skipped_tables,
                self.failed_units,
                self.failed_merges
            );
        }
    }

    /// Get a formatted string summary of the statistics
    pub fn summary_string(&self) -> String {
        format!(
            "EvalStats {{ pages: {}, predictions: {}, skipped: {}, failed_units: {}, failed_merges: {} }}",
            self.pages,
            self.predictions,
            self.total_skipped(),
            self.failed_units,
            self.failed_merges
        )
    }
}
