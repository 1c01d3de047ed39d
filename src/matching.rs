//! Detection matching utilities for evaluating predictions against ground truth.

use crate::metrics::iou::calculate_iou;
use crate::types::{Annotation, BoundingBox, CategoryFilter, Prediction, Source};
use std::collections::{BTreeSet, HashMap};

/// Outcome of matching one page's predictions against its ground truth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Indices into the ground-truth slice that were consumed by a prediction.
    pub matched: BTreeSet<usize>,
}

/// Match predictions to ground truth boxes for a single page.
///
/// Uses greedy first-match: predictions are visited in the order given
/// (there is no confidence score to sort by), and each one consumes the
/// first not-yet-consumed ground truth whose IoU reaches `iou_threshold`.
/// The best-overlapping candidate is *not* searched for. A ground truth is
/// consumed at most once and a prediction matches at most one ground truth.
///
/// # Arguments
///
/// * `predictions` - Predicted boxes of one page, in file order
/// * `ground_truths` - Ground truth boxes of the same page
/// * `iou_threshold` - Minimum IoU (inclusive) for a prediction to count as a hit
///
/// # Returns
///
/// A [`MatchResult`] with TP, FP and FN counts and the consumed ground truth
/// indices. FN is the number of ground truths left unmatched.
///
/// # Example
///
/// ```
/// use doclaynet_eval::matching::match_detections;
/// use doclaynet_eval::types::BoundingBox;
///
/// let gt = vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)];
/// let preds = vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)];
/// let result = match_detections(&preds, &gt, 0.5);
/// assert_eq!(result.true_positives, 1);
/// assert_eq!(result.false_negatives, 0);
/// ```
pub fn match_detections(
    predictions: &[BoundingBox],
    ground_truths: &[BoundingBox],
    iou_threshold: f64,
) -> MatchResult {
    let mut result = MatchResult::default();

    for pred_box in predictions {
        let hit = ground_truths
            .iter()
            .enumerate()
            .filter(|(gt_idx, _)| !result.matched.contains(gt_idx))
            .find(|(_, gt_box)| calculate_iou(pred_box, gt_box) >= iou_threshold)
            .map(|(gt_idx, _)| gt_idx);

        match hit {
            Some(gt_idx) => {
                result.matched.insert(gt_idx);
                result.true_positives += 1;
            }
            None => result.false_positives += 1,
        }
    }

    result.false_negatives = ground_truths.len() - result.matched.len();
    result
}

/// Boxes of the ground truth that take part in a category pass.
pub fn select_ground_truth(annotations: &[Annotation], filter: CategoryFilter) -> Vec<BoundingBox> {
    annotations
        .iter()
        .filter(|ann| filter.matches(Some(ann.label.as_str())))
        .map(|ann| ann.bbox)
        .collect()
}

/// Boxes of the predictions that take part in a (source, category) pass.
///
/// Input order is preserved since it drives the greedy matcher.
pub fn select_predictions(
    predictions: &[Prediction],
    source: &Source,
    filter: CategoryFilter,
) -> Vec<BoundingBox> {
    predictions
        .iter()
        .filter(|pred| source.matches(pred.source.as_deref()))
        .filter(|pred| filter.matches(pred.label.as_deref()))
        .map(|pred| pred.bbox)
        .collect()
}

/// Group annotations by page, keeping document order within a page.
pub fn group_annotations<I>(annotations: I) -> HashMap<String, Vec<Annotation>>
where
    I: IntoIterator<Item = Annotation>,
{
    let mut groups: HashMap<String, Vec<Annotation>> = HashMap::new();

    for annotation in annotations {
        groups
            .entry(annotation.image.clone())
            .or_default()
            .push(annotation);
    }

    groups
}
