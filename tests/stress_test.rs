//! Stress tests with large page sets and crowded pages.

use std::fs;

use doclaynet_eval::config::EvalConfig;
use doclaynet_eval::evaluator::{evaluate_threshold, run};
use doclaynet_eval::loader::{GroundTruth, PagePredictions, PredictionSet};
use doclaynet_eval::matching::match_detections;
use doclaynet_eval::types::{
    AnnotationEntry, BoundingBox, Category, CategoryEntry, CategoryFilter, GroundTruthDocument,
    ImageEntry, Prediction, Source,
};
use tempfile::TempDir;

/// Ground truth with `pages` pages, each holding one box per class.
fn synthetic_ground_truth(pages: u64) -> GroundTruthDocument {
    let categories = Category::ALL
        .iter()
        .zip(1u64..)
        .map(|(category, id)| CategoryEntry {
            id,
            name: category.name().to_string(),
        })
        .collect();

    let images = (1..=pages)
        .map(|id| ImageEntry {
            id,
            file_name: format!("page_{id:04}.png"),
        })
        .collect();

    let annotations = (1..=pages)
        .flat_map(|image_id| {
            (1..=11u64).map(move |category_id| AnnotationEntry {
                image_id,
                category_id,
                bbox: vec![category_id as f64 * 40.0, 10.0, 30.0, 30.0],
            })
        })
        .collect();

    GroundTruthDocument {
        categories,
        images,
        annotations,
    }
}

/// DETR reproduces every box, FRCNN shifts every box off target.
fn synthetic_predictions(pages: u64) -> PredictionSet {
    let pages = (1..=pages)
        .map(|id| {
            let image = format!("page_{id:04}.png");
            let predictions = Category::ALL
                .iter()
                .zip(1u64..)
                .flat_map(|(category, category_id)| {
                    let x = category_id as f64 * 40.0;
                    [
                        Prediction {
                            image: image.clone(),
                            source: Some("DETR".to_string()),
                            label: Some(category.name().to_string()),
                            bbox: BoundingBox::new(x, 10.0, x + 30.0, 40.0),
                        },
                        Prediction {
                            image: image.clone(),
                            source: Some("FRCNN".to_string()),
                            label: Some(category.name().to_string()),
                            bbox: BoundingBox::new(x + 20.0, 30.0, x + 50.0, 60.0),
                        },
                    ]
                })
                .collect();
            PagePredictions { image, predictions }
        })
        .collect();

    PredictionSet {
        pages,
        ..PredictionSet::default()
    }
}

#[test]
fn test_1000_boxes_single_page() {
    let boxes: Vec<BoundingBox> = (0..1000)
        .map(|i| {
            let x = (i % 100) as f64 * 10.0;
            let y = (i / 100) as f64 * 10.0;
            BoundingBox::new(x, y, x + 8.0, y + 8.0)
        })
        .collect();

    let result = match_detections(&boxes, &boxes, 0.5);
    assert_eq!(result.true_positives, 1000);
    assert_eq!(result.false_positives, 0);
    assert_eq!(result.false_negatives, 0);

    let mut reversed = boxes.clone();
    reversed.reverse();
    let result = match_detections(&reversed, &boxes, 0.5);
    assert_eq!(result.true_positives, 1000, "order does not matter for disjoint boxes");
}

#[test]
fn test_500_pages_every_filter() {
    let document = synthetic_ground_truth(500);
    let gt = GroundTruth::from_document(&document).unwrap();
    let predictions = synthetic_predictions(500);

    let tables = evaluate_threshold(
        &gt,
        &predictions,
        &Source::defaults(),
        &CategoryFilter::sweep(),
        0.5,
    )
    .unwrap();

    assert_eq!(tables.len(), 36);
    for table in &tables {
        assert_eq!(table.rows.len(), 500);
        assert!(table.rows.windows(2).all(|w| w[0].image <= w[1].image), "rows are sorted");

        let average = table.average().unwrap();
        match &table.source {
            Source::Named(name) if name == "DETR" => assert_eq!(average.f1, 1.0),
            Source::Named(_) => assert_eq!(average.f1, 0.0),
            // Pooled: one hit and one false alarm per class on every page.
            Source::All => assert_eq!(average.precision, 0.5),
        }
    }
}

#[test]
fn test_full_run_on_200_pages() {
    let dir = TempDir::new().unwrap();
    let gt_path = dir.path().join("gt.json");
    fs::write(&gt_path, serde_json::to_string(&synthetic_ground_truth(200)).unwrap()).unwrap();

    let pred_dir = dir.path().join("predictions");
    fs::create_dir_all(&pred_dir).unwrap();
    for page in synthetic_predictions(200).pages {
        let records: Vec<serde_json::Value> = page
            .predictions
            .iter()
            .map(|p| {
                serde_json::json!({
                    "box": [p.bbox.x1(), p.bbox.y1(), p.bbox.x2(), p.bbox.y2()],
                    "source": p.source,
                    "label_name": p.label,
                })
            })
            .collect();
        let stem = page.image.trim_end_matches(".png");
        fs::write(
            pred_dir.join(format!("{stem}.json")),
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();
    }

    let config = EvalConfig::new(gt_path, pred_dir, dir.path().join("out"));
    let report = run(&config).unwrap();

    assert_eq!(report.stats.pages, 200);
    assert_eq!(report.stats.predictions, 200 * 22);
    assert_eq!(report.thresholds.len(), 3);
    assert_eq!(report.cross_threshold.len(), 9);

    let detr: Vec<_> = report
        .cross_threshold
        .iter()
        .filter(|row| row.model == "DETR")
        .collect();
    assert_eq!(detr.len(), 3);
    assert!(detr.iter().all(|row| row.map == 1.0 && row.mar == 1.0 && row.f1 == 1.0));
}
