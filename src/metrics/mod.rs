//! Metrics calculation modules for detection evaluation.

pub mod iou;
pub mod precision_recall;
pub mod f1_score;

pub use iou::calculate_iou;
pub use precision_recall::{calculate_precision_recall, mean, round_to, PrecisionRecall};
pub use f1_score::{calculate_f1_score, rates_from_counts};
