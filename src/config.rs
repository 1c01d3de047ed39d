//! Evaluation configuration and output layout.
//!
//! The binary maps CLI flags and environment variables onto [`EvalConfig`];
//! library callers build it directly. [`OutputLayout`] owns every path the
//! sweep writes to.

use crate::error::{EvalError, Result};
use crate::merge::CrossThresholdStore;
use crate::report::table_file_name;
use crate::threshold::{normalize_thresholds, threshold_dir_name, DEFAULT_IOU_THRESHOLDS};
use crate::types::{CategoryFilter, Source};
use std::path::{Path, PathBuf};

/// Output root used when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "Evaluator_DocLayNet";

/// Everything one multi-threshold sweep needs.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub ground_truth: PathBuf,
    pub predictions: PathBuf,
    pub layout: OutputLayout,
    pub thresholds: Vec<f64>,
    pub sources: Vec<Source>,
    pub filters: Vec<CategoryFilter>,
}

impl EvalConfig {
    /// Config with default thresholds, sources and category filters.
    pub fn new<G, P, O>(ground_truth: G, predictions: P, output_root: O) -> Self
    where
        G: Into<PathBuf>,
        P: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        Self {
            ground_truth: ground_truth.into(),
            predictions: predictions.into(),
            layout: OutputLayout::new(output_root),
            thresholds: DEFAULT_IOU_THRESHOLDS.to_vec(),
            sources: Source::defaults(),
            filters: CategoryFilter::sweep(),
        }
    }

    /// Build a config from optional input locations.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Configuration`] when either location is absent,
    /// and [`EvalError::InvalidThreshold`] for an unusable threshold list.
    pub fn from_parts(
        ground_truth: Option<PathBuf>,
        predictions: Option<PathBuf>,
        output_root: PathBuf,
        thresholds: &[f64],
        source_names: &[String],
    ) -> Result<Self> {
        let ground_truth = ground_truth.ok_or_else(|| {
            EvalError::Configuration("ground truth JSON (GT_JSON) is not set".to_string())
        })?;
        let predictions = predictions.ok_or_else(|| {
            EvalError::Configuration("prediction folder (PRED_FOLDER) is not set".to_string())
        })?;

        let mut config = Self::new(ground_truth, predictions, output_root);
        if !thresholds.is_empty() {
            config.thresholds = normalize_thresholds(thresholds)?;
        }
        if !source_names.is_empty() {
            config.sources = Source::with_pooled(source_names.iter().cloned());
        }
        Ok(config)
    }

    pub fn with_thresholds(mut self, thresholds: &[f64]) -> Result<Self> {
        self.thresholds = normalize_thresholds(thresholds)?;
        Ok(self)
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_filters(mut self, filters: Vec<CategoryFilter>) -> Self {
        self.filters = filters;
        self
    }

    /// Check that the input locations exist before any work starts.
    pub fn validate(&self) -> Result<()> {
        if !self.ground_truth.is_file() {
            return Err(EvalError::Configuration(format!(
                "ground truth file {} does not exist",
                self.ground_truth.display()
            )));
        }
        if !self.predictions.is_dir() {
            return Err(EvalError::Configuration(format!(
                "prediction folder {} does not exist",
                self.predictions.display()
            )));
        }
        normalize_thresholds(&self.thresholds)?;
        Ok(())
    }
}

/// File layout under the output root.
///
/// ```text
/// <root>/summary_across_IOUs.csv
/// <root>/IOU_50/DOCLAYNET_evaluation_<source>_<category>.csv
/// <root>/IOU_50/__comparison_IOU50.csv
/// <root>/IOU_50/__category_summary_IOU50.csv
/// <root>/IOU_50/summary_metrics.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn threshold_dir(&self, key: u32) -> PathBuf {
        self.root.join(threshold_dir_name(key))
    }

    pub fn table_path(&self, key: u32, source: &Source, filter: CategoryFilter) -> PathBuf {
        self.threshold_dir(key).join(table_file_name(source, filter))
    }

    pub fn model_summary_path(&self, key: u32) -> PathBuf {
        self.threshold_dir(key)
            .join(format!("__comparison_IOU{key:02}.csv"))
    }

    pub fn category_summary_path(&self, key: u32) -> PathBuf {
        self.threshold_dir(key)
            .join(format!("__category_summary_IOU{key:02}.csv"))
    }

    pub fn averages_path(&self, key: u32) -> PathBuf {
        self.threshold_dir(key).join("summary_metrics.csv")
    }

    pub fn cross_threshold_store(&self) -> CrossThresholdStore {
        CrossThresholdStore::in_dir(&self.root)
    }
}
