//! JSON loading utilities for ground truth and per-page prediction files.

use crate::error::{EvalError, Result};
use crate::matching::group_annotations;
use crate::types::{Annotation, BoundingBox, GroundTruthDocument, Prediction, PredictionRecord};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

/// Extension of the page images that prediction files are named after.
pub const PAGE_IMAGE_EXTENSION: &str = "png";

/// Ground-truth annotations indexed by page file name.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    pages: HashMap<String, Vec<Annotation>>,
    /// Annotations dropped because their image or category id is unknown.
    pub skipped: usize,
}

impl GroundTruth {
    /// Resolve image and category ids and convert boxes to corner form.
    pub fn from_document(document: &GroundTruthDocument) -> Result<Self> {
        let category_names: HashMap<u64, &str> = document
            .categories
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();
        let image_files: HashMap<u64, &str> = document
            .images
            .iter()
            .map(|img| (img.id, img.file_name.as_str()))
            .collect();

        let mut skipped = 0;
        let mut annotations = Vec::with_capacity(document.annotations.len());
        for annotation in &document.annotations {
            let (Some(label), Some(image)) = (
                category_names.get(&annotation.category_id),
                image_files.get(&annotation.image_id),
            ) else {
                warn!(
                    "Skipping annotation with unknown image {} or category {}",
                    annotation.image_id, annotation.category_id
                );
                skipped += 1;
                continue;
            };

            annotations.push(Annotation {
                image: image.to_string(),
                label: label.to_string(),
                bbox: annotation.to_bbox()?,
            });
        }

        Ok(GroundTruth {
            pages: group_annotations(annotations),
            skipped,
        })
    }

    /// Annotations of one page, in document order; empty for unknown pages.
    pub fn for_page(&self, image: &str) -> &[Annotation] {
        self.pages.get(image).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of pages carrying at least one annotation.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total number of annotations.
    pub fn annotation_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }
}

/// Predictions of one page, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePredictions {
    pub image: String,
    pub predictions: Vec<Prediction>,
}

/// All prediction files of a folder.
#[derive(Debug, Clone, Default)]
pub struct PredictionSet {
    /// Pages sorted by image name.
    pub pages: Vec<PagePredictions>,
    /// Files that could not be read or parsed.
    pub skipped_files: usize,
    /// Individual predictions dropped for a malformed box.
    pub skipped_predictions: usize,
}

impl PredictionSet {
    pub fn prediction_count(&self) -> usize {
        self.pages.iter().map(|p| p.predictions.len()).sum()
    }
}

/// Load a ground-truth document from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or fails validation.
///
/// # Example
///
/// ```no_run
/// use doclaynet_eval::loader::load_ground_truth;
///
/// let document = load_ground_truth("COCO/test.json").unwrap();
/// println!("Loaded {} annotations", document.annotations.len());
/// ```
pub fn load_ground_truth<P: AsRef<Path>>(path: P) -> Result<GroundTruthDocument> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let document: GroundTruthDocument = serde_json::from_reader(reader)?;

    validate_document(&document)?;

    Ok(document)
}

/// Load a ground-truth document from a JSON string.
///
/// # Example
///
/// ```
/// use doclaynet_eval::loader::load_ground_truth_from_str;
///
/// let json = r#"{
///     "categories": [{"id": 10, "name": "Text"}],
///     "images": [{"id": 1, "file_name": "page.png"}],
///     "annotations": [{"image_id": 1, "category_id": 10, "bbox": [0, 0, 10, 10]}]
/// }"#;
/// let document = load_ground_truth_from_str(json).unwrap();
/// assert_eq!(document.annotations.len(), 1);
/// ```
pub fn load_ground_truth_from_str(json_str: &str) -> Result<GroundTruthDocument> {
    let document: GroundTruthDocument = serde_json::from_str(json_str)?;
    validate_document(&document)?;
    Ok(document)
}

/// Validate that a ground-truth document has the required structure.
fn validate_document(document: &GroundTruthDocument) -> Result<()> {
    if document.categories.is_empty() {
        return Err(EvalError::EmptyDataset(
            "Ground truth must contain at least one category".to_string(),
        ));
    }

    for (idx, annotation) in document.annotations.iter().enumerate() {
        if annotation.bbox.len() != 4 {
            return Err(EvalError::InvalidAnnotation(format!(
                "Annotation {} has invalid bbox length: {}",
                idx,
                annotation.bbox.len()
            )));
        }

        if annotation.bbox[2] < 0.0 || annotation.bbox[3] < 0.0 {
            return Err(EvalError::InvalidBoundingBox(format!(
                "Annotation {idx} has negative dimensions"
            )));
        }
    }

    Ok(())
}

/// Parse the predictions of one page.
///
/// Returns the predictions in file order and the number of entries dropped
/// because their box does not have four coordinates.
pub fn parse_predictions(json_str: &str, image: &str) -> Result<(Vec<Prediction>, usize)> {
    let records: Vec<PredictionRecord> = serde_json::from_str(json_str)?;
    let mut skipped = 0;
    let mut predictions = Vec::with_capacity(records.len());

    for record in records {
        match BoundingBox::from_corners(&record.bbox) {
            Ok(bbox) => predictions.push(Prediction {
                image: image.to_string(),
                source: record.source,
                label: record.label_name,
                bbox,
            }),
            Err(err) => {
                warn!("Skipping prediction on {image}: {err}");
                skipped += 1;
            }
        }
    }

    Ok((predictions, skipped))
}

/// Page image name for a prediction file: `<stem>.json` → `<stem>.png`.
pub fn page_image_name(prediction_file: &Path) -> Option<String> {
    let stem = prediction_file.file_stem()?.to_str()?;
    Some(format!("{stem}.{PAGE_IMAGE_EXTENSION}"))
}

/// Load every `*.json` prediction file in `dir`.
///
/// Other files are ignored. A file that cannot be parsed is logged and
/// skipped; the folder itself must be readable.
pub fn load_predictions<P: AsRef<Path>>(dir: P) -> Result<PredictionSet> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(EvalError::Configuration(format!(
            "Prediction folder {} does not exist",
            dir.display()
        )));
    }

    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut set = PredictionSet::default();
    for path in files {
        let Some(image) = page_image_name(&path) else {
            warn!("Skipping prediction file with non UTF-8 name: {}", path.display());
            set.skipped_files += 1;
            continue;
        };

        let parsed = fs::read_to_string(&path)
            .map_err(EvalError::from)
            .and_then(|content| parse_predictions(&content, &image));

        match parsed {
            Ok((predictions, skipped)) => {
                debug!("{} predictions for {}", predictions.len(), image);
                set.skipped_predictions += skipped;
                set.pages.push(PagePredictions { image, predictions });
            }
            Err(err) => {
                warn!("Skipping prediction file {}: {}", path.display(), err);
                set.skipped_files += 1;
            }
        }
    }

    set.pages.sort_by(|a, b| a.image.cmp(&b.image));
    Ok(set)
}
