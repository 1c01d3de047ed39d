//! Core data types for ground truth, predictions and evaluation filters.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Label used in tables and file names for the "ignore this dimension" passes.
pub const ALL_LABEL: &str = "ALL";

/// Axis-aligned bounding box in corner form (x1, y1, x2, y2).
///
/// Coordinates are image pixels with the origin at the top-left corner.
/// Boxes are never mutated after construction; zero-area boxes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl BoundingBox {
    /// Create a bounding box from its corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a bounding box from COCO `[x, y, width, height]`.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Build a corner-form box from a 4-element slice.
    pub fn from_corners(values: &[f64]) -> Result<Self> {
        match values {
            [x1, y1, x2, y2] => Ok(Self::new(*x1, *y1, *x2, *y2)),
            _ => Err(EvalError::InvalidBoundingBox(format!(
                "Expected 4 values, got {}",
                values.len()
            ))),
        }
    }

    pub fn x1(&self) -> f64 {
        self.x1
    }

    pub fn y1(&self) -> f64 {
        self.y1
    }

    pub fn x2(&self) -> f64 {
        self.x2
    }

    pub fn y2(&self) -> f64 {
        self.y2
    }

    /// Width of the box, clamped at zero for inverted corners.
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    /// Height of the box, clamped at zero for inverted corners.
    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Get the area of the bounding box.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if the bounding box has a positive area.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }
}

/// The eleven DocLayNet layout classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Caption,
    Footnote,
    Formula,
    ListItem,
    PageFooter,
    PageHeader,
    Picture,
    SectionHeader,
    Table,
    Text,
    Title,
}

impl Category {
    /// All classes in DocLayNet id order (1..=11).
    pub const ALL: [Category; 11] = [
        Category::Caption,
        Category::Footnote,
        Category::Formula,
        Category::ListItem,
        Category::PageFooter,
        Category::PageHeader,
        Category::Picture,
        Category::SectionHeader,
        Category::Table,
        Category::Text,
        Category::Title,
    ];

    /// The label as it appears in DocLayNet annotations and model outputs.
    pub fn name(&self) -> &'static str {
        match self {
            Category::Caption => "Caption",
            Category::Footnote => "Footnote",
            Category::Formula => "Formula",
            Category::ListItem => "List-item",
            Category::PageFooter => "Page-footer",
            Category::PageHeader => "Page-header",
            Category::Picture => "Picture",
            Category::SectionHeader => "Section-header",
            Category::Table => "Table",
            Category::Text => "Text",
            Category::Title => "Title",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| EvalError::InvalidAnnotation(format!("Unknown category: {s}")))
    }
}

/// Restricts a matching pass to one class, or to none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryFilter {
    Only(Category),
    All,
}

impl CategoryFilter {
    /// Every filter in sweep order: each class, then the unfiltered pass.
    pub fn sweep() -> Vec<CategoryFilter> {
        Category::ALL
            .into_iter()
            .map(CategoryFilter::Only)
            .chain(std::iter::once(CategoryFilter::All))
            .collect()
    }

    /// Whether an instance carrying `label` takes part in this pass.
    ///
    /// Unknown or missing labels are only visible to [`CategoryFilter::All`].
    pub fn matches(&self, label: Option<&str>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => label == Some(category.name()),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::Only(category) => category.fmt(f),
            CategoryFilter::All => f.write_str(ALL_LABEL),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        if s == ALL_LABEL {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

/// Prediction source: one named model, or every model pooled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Named(String),
    All,
}

impl Source {
    /// Named sources evaluated when none are configured.
    pub const DEFAULT_NAMES: [&'static str; 2] = ["DETR", "FRCNN"];

    /// Default sweep: the named sources followed by the pooled pass.
    pub fn defaults() -> Vec<Source> {
        Self::with_pooled(Self::DEFAULT_NAMES.iter().map(|s| s.to_string()))
    }

    /// Turn a list of model names into a source sweep ending with [`Source::All`].
    ///
    /// A literal `"ALL"` in the input is folded into the pooled pass, with a
    /// warning, since its tables would collide with the pooled ones.
    pub fn with_pooled<I, S>(names: I) -> Vec<Source>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sources: Vec<Source> = Vec::new();
        for name in names {
            let name = name.into();
            if name == ALL_LABEL {
                warn!("Model name '{ALL_LABEL}' is reserved for the pooled pass; its predictions are only evaluated there");
                continue;
            }
            let source = Source::Named(name);
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources.push(Source::All);
        sources
    }

    /// Whether a prediction attributed to `source` takes part in this pass.
    pub fn matches(&self, source: Option<&str>) -> bool {
        match self {
            Source::All => true,
            Source::Named(name) => source == Some(name.as_str()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Named(name) => f.write_str(name),
            Source::All => f.write_str(ALL_LABEL),
        }
    }
}

impl FromStr for Source {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s == ALL_LABEL {
            Source::All
        } else {
            Source::Named(s.to_string())
        })
    }
}

/// A ground-truth instance on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub image: String,
    pub label: String,
    pub bbox: BoundingBox,
}

/// A model output instance on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub image: String,
    pub source: Option<String>,
    pub label: Option<String>,
    pub bbox: BoundingBox,
}

/// Category entry of the ground-truth document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: u64,
    pub name: String,
}

/// Image entry of the ground-truth document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: u64,
    pub file_name: String,
}

/// Annotation entry of the ground-truth document, bbox in `[x, y, w, h]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub image_id: u64,
    pub category_id: u64,
    pub bbox: Vec<f64>,
}

impl AnnotationEntry {
    /// Convert the `[x, y, w, h]` array to a corner-form box.
    pub fn to_bbox(&self) -> Result<BoundingBox> {
        match self.bbox.as_slice() {
            [x, y, w, h] => Ok(BoundingBox::from_xywh(*x, *y, *w, *h)),
            other => Err(EvalError::InvalidBoundingBox(format!(
                "Expected 4 values, got {}",
                other.len()
            ))),
        }
    }
}

/// The COCO-style ground-truth document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthDocument {
    pub categories: Vec<CategoryEntry>,
    pub images: Vec<ImageEntry>,
    pub annotations: Vec<AnnotationEntry>,
}

/// One entry of a per-page prediction file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "box")]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub label_name: Option<String>,
}
