//! IoU threshold utilities.

use crate::error::{EvalError, Result};

/// IoU thresholds swept when none are configured.
pub const DEFAULT_IOU_THRESHOLDS: [f64; 3] = [0.5, 0.75, 0.9];

/// Integer percent used as the `IOU` column value and in directory names.
///
/// # Example
///
/// ```
/// use doclaynet_eval::threshold::percent_key;
///
/// assert_eq!(percent_key(0.5), 50);
/// assert_eq!(percent_key(0.29), 29);
/// ```
pub fn percent_key(threshold: f64) -> u32 {
    (threshold * 100.0).round() as u32
}

/// `IOU_<pp>` directory holding the tables of one threshold.
pub fn threshold_dir_name(key: u32) -> String {
    format!("IOU_{key:02}")
}

/// Validate that an IoU threshold is in the range (0.0, 1.0].
///
/// A zero threshold would turn every prediction on a page with ground truth
/// into a match and is rejected.
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(EvalError::InvalidThreshold(format!(
            "IoU threshold must be in (0.0, 1.0], got {threshold}"
        )));
    }
    Ok(())
}

/// Validate and de-duplicate a threshold list, keeping first occurrences.
///
/// Thresholds that map to the same percent key would overwrite each other's
/// output, so only the first one is kept.
pub fn normalize_thresholds(thresholds: &[f64]) -> Result<Vec<f64>> {
    if thresholds.is_empty() {
        return Err(EvalError::InvalidThreshold(
            "At least one IoU threshold is required".to_string(),
        ));
    }

    let mut seen = Vec::new();
    let mut normalized = Vec::new();
    for &threshold in thresholds {
        validate_threshold(threshold)?;
        let key = percent_key(threshold);
        if !seen.contains(&key) {
            seen.push(key);
            normalized.push(threshold);
        }
    }
    Ok(normalized)
}
