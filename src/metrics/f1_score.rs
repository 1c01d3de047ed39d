//! F1 Score calculation.

use crate::metrics::precision_recall::{calculate_precision_recall, round_to, PrecisionRecall};

/// Calculate F1 score from precision and recall.
///
/// F1 score is the harmonic mean of precision and recall:
/// F1 = 2 × (Precision × Recall) / (Precision + Recall)
///
/// Returns 0.0 if both precision and recall are 0.
///
/// # Example
///
/// ```
/// use doclaynet_eval::metrics::f1_score::calculate_f1_score;
///
/// let f1 = calculate_f1_score(0.8, 0.6);
/// assert!((f1 - 0.6857).abs() < 0.001);
/// ```
pub fn calculate_f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall <= 0.0 {
        return 0.0;
    }

    2.0 * (precision * recall) / (precision + recall)
}

/// Calculate F1 score from a PrecisionRecall struct.
pub fn calculate_f1_from_pr(pr: &PrecisionRecall) -> f64 {
    calculate_f1_score(pr.precision, pr.recall)
}

/// Precision, recall and F1 for one image, each rounded to `places`.
///
/// F1 is derived from the unrounded rates; rounding happens once, on output.
///
/// ```
/// use doclaynet_eval::metrics::f1_score::rates_from_counts;
///
/// let (p, r, f1) = rates_from_counts(2, 1, 0, 3);
/// assert_eq!((p, r, f1), (0.667, 1.0, 0.8));
/// ```
pub fn rates_from_counts(
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
    places: i32,
) -> (f64, f64, f64) {
    let pr = calculate_precision_recall(true_positives, false_positives, false_negatives);
    let f1 = calculate_f1_from_pr(&pr);
    (
        round_to(pr.precision, places),
        round_to(pr.recall, places),
        round_to(f1, places),
    )
}
