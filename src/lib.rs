//! # doclaynet-eval
//!
//! A Rust library for evaluating document-layout detectors on DocLayNet with
//! a fixed-IoU-threshold greedy matcher.
//!
//! For every page, predictions of each model are matched against the ground
//! truth and counted as true positives, false positives and false negatives.
//! These counts are rolled up into:
//! - **per-image tables** of precision, recall and F1 (plus an `AVERAGE` row)
//! - **model summaries** (mAP / mAR / F1 as macro averages of per-image rates)
//! - **category summaries** per (category, model)
//! - a **cross-threshold table** that keeps one row per (model, IoU)
//!
//! mAP here is the mean of per-image precision values, not the area under a
//! ranked-confidence precision-recall curve.
//!
//! ## Quick Start
//!
//! ```rust
//! use doclaynet_eval::matching::match_detections;
//! use doclaynet_eval::report::ImageMetricRow;
//! use doclaynet_eval::types::BoundingBox;
//!
//! let ground_truth = vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)];
//! let predictions = vec![BoundingBox::new(100.0, 100.0, 110.0, 110.0)];
//!
//! let result = match_detections(&predictions, &ground_truth, 0.5);
//! let row = ImageMetricRow::from_match("page.png", &result);
//! assert_eq!((row.true_positives, row.false_positives, row.false_negatives), (0, 1, 1));
//! assert_eq!(row.rates.f1, 0.0);
//! ```
//!
//! A full sweep over files is driven by [`evaluator::run`]:
//!
//! ```no_run
//! use doclaynet_eval::config::EvalConfig;
//! use doclaynet_eval::evaluator::run;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EvalConfig::new("COCO/test.json", "predictions", "Evaluator_DocLayNet");
//! let report = run(&config)?;
//! for row in &report.cross_threshold {
//!     println!("{} @ {}: mAP={:.4} mAR={:.4} F1={:.4}", row.model, row.iou, row.map, row.mar, row.f1);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;
pub mod loader;
pub mod threshold;
pub mod metrics;
pub mod matching;
pub mod report;
pub mod aggregate;
pub mod merge;
pub mod stats;
pub mod config;
pub mod evaluator;

// Re-export commonly used types and functions
pub use error::{EvalError, Result};
pub use types::{
    Annotation, BoundingBox, Category, CategoryFilter, GroundTruthDocument, Prediction, Source,
};
pub use matching::{match_detections, MatchResult};
pub use report::{ImageMetricRow, ImageTable, Rates};
pub use aggregate::{summarize, CategorySummaryRow, ModelSummaryRow, Summary};
pub use merge::{merge, CrossThresholdStore};
pub use config::EvalConfig;
pub use evaluator::run;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_compiles() {
        // Basic smoke test to ensure the library compiles
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bbox.is_valid());
    }
}
