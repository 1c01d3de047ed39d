//! Intersection over Union (IoU) calculation.

use crate::types::BoundingBox;

/// Calculate the Intersection over Union (IoU) between two bounding boxes.
///
/// IoU is defined as the area of intersection divided by the area of union.
/// A zero union (two degenerate boxes, identical or not) yields 0.0.
///
/// # Example
///
/// ```
/// use doclaynet_eval::metrics::iou::calculate_iou;
/// use doclaynet_eval::types::BoundingBox;
///
/// let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
/// let bbox2 = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
/// let iou = calculate_iou(&bbox1, &bbox2);
/// assert!(iou > 0.0 && iou < 1.0);
/// ```
pub fn calculate_iou(bbox1: &BoundingBox, bbox2: &BoundingBox) -> f64 {
    let intersection_area = intersection_area(bbox1, bbox2);
    let union_area = bbox1.area() + bbox2.area() - intersection_area;

    if union_area <= 0.0 {
        return 0.0;
    }

    (intersection_area / union_area).clamp(0.0, 1.0)
}

/// Area shared by two boxes, zero when they do not overlap.
pub fn intersection_area(bbox1: &BoundingBox, bbox2: &BoundingBox) -> f64 {
    let x_left = bbox1.x1().max(bbox2.x1());
    let y_top = bbox1.y1().max(bbox2.y1());
    let x_right = bbox1.x2().min(bbox2.x2());
    let y_bottom = bbox1.y2().min(bbox2.y2());

    if x_right <= x_left || y_bottom <= y_top {
        return 0.0;
    }

    (x_right - x_left) * (y_bottom - y_top)
}
