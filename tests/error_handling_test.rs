//! Error handling tests: fatal configuration errors and recoverable
//! per-table failures.

use std::fs;
use std::path::PathBuf;

use doclaynet_eval::aggregate::{extract_averages, load_tables, ModelSummaryRow};
use doclaynet_eval::config::{EvalConfig, OutputLayout};
use doclaynet_eval::error::EvalError;
use doclaynet_eval::evaluator::{run, summarize_threshold};
use doclaynet_eval::loader::{load_ground_truth, load_ground_truth_from_str, load_predictions};
use doclaynet_eval::merge::{read_model_summary, CrossThresholdStore};
use doclaynet_eval::report::{ImageMetricRow, ImageTable};
use doclaynet_eval::stats::EvalStats;
use doclaynet_eval::threshold::{normalize_thresholds, validate_threshold};
use doclaynet_eval::types::{BoundingBox, Category, CategoryFilter, Source};
use tempfile::TempDir;

fn detr() -> Source {
    Source::Named("DETR".to_string())
}

fn summary_row(model: &str, iou: u32, map: f64) -> ModelSummaryRow {
    ModelSummaryRow {
        model: model.to_string(),
        iou,
        map,
        mar: map,
        f1: map,
    }
}

/// Write one small table per (source, filter) into the IOU_50 directory.
fn write_tables(layout: &OutputLayout, sources: &[Source], filters: &[CategoryFilter]) {
    fs::create_dir_all(layout.threshold_dir(50)).unwrap();
    for source in sources {
        for &filter in filters {
            let mut table = ImageTable::new(source.clone(), filter);
            table.push(ImageMetricRow::from_counts("a.png", 1, 0, 0));
            table.write_csv(layout.table_path(50, source, filter)).unwrap();
        }
    }
}

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

#[test]
fn test_missing_locations_are_configuration_errors() {
    let missing_gt = EvalConfig::from_parts(None, Some("preds".into()), "out".into(), &[], &[]);
    assert!(matches!(missing_gt, Err(EvalError::Configuration(_))));

    let missing_preds = EvalConfig::from_parts(Some("gt.json".into()), None, "out".into(), &[], &[]);
    assert!(matches!(missing_preds, Err(EvalError::Configuration(_))));
}

#[test]
fn test_run_fails_before_writing_when_inputs_missing() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let config = EvalConfig::new(dir.path().join("gt.json"), dir.path().join("preds"), &out);

    let err = run(&config).unwrap_err();
    assert!(matches!(err, EvalError::Configuration(_)), "got {err:?}");
    assert!(!err.is_recoverable());
    assert!(!out.exists(), "nothing may be written on a configuration error");
}

#[test]
fn test_missing_prediction_folder() {
    let result = load_predictions("/nonexistent/predictions");
    assert!(matches!(result, Err(EvalError::Configuration(_))));
}

#[test]
fn test_invalid_thresholds() {
    for threshold in [0.0, -0.5, 1.5, f64::NAN] {
        assert!(
            matches!(validate_threshold(threshold), Err(EvalError::InvalidThreshold(_))),
            "{threshold} must be rejected"
        );
    }
    assert!(normalize_thresholds(&[]).is_err());
    assert!(normalize_thresholds(&[0.5, 2.0]).is_err());

    let config = EvalConfig::new("gt.json", "preds", "out");
    assert!(config.with_thresholds(&[0.0]).is_err());
}

// ============================================================================
// INPUT ERRORS
// ============================================================================

#[test]
fn test_nonexistent_ground_truth_file() {
    let result = load_ground_truth("/nonexistent/path/to/file.json");
    assert!(matches!(result, Err(EvalError::IoError(_))));
}

#[test]
fn test_malformed_ground_truth_json() {
    let result = load_ground_truth_from_str("{ this is not valid json }");
    assert!(matches!(result, Err(EvalError::JsonError(_))));
}

#[test]
fn test_ground_truth_missing_fields() {
    let result = load_ground_truth_from_str(r#"{"categories": [{"id": 1, "name": "Text"}]}"#);
    assert!(result.is_err(), "images and annotations are required");
}

#[test]
fn test_ground_truth_negative_dimensions() {
    let json = r#"{
        "categories": [{"id": 1, "name": "Text"}],
        "images": [{"id": 1, "file_name": "a.png"}],
        "annotations": [{"image_id": 1, "category_id": 1, "bbox": [10, 10, -5, 20]}]
    }"#;
    assert!(matches!(
        load_ground_truth_from_str(json),
        Err(EvalError::InvalidBoundingBox(_))
    ));
}

#[test]
fn test_unparseable_prediction_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("good.json"), r#"[{"box": [0, 0, 1, 1], "source": "DETR"}]"#).unwrap();
    fs::write(dir.path().join("bad.json"), "not json").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let set = load_predictions(dir.path()).unwrap();

    assert_eq!(set.skipped_files, 1);
    assert_eq!(set.pages.len(), 1);
    assert_eq!(set.pages[0].image, "good.png");
}

// ============================================================================
// RECOVERABLE TABLE ERRORS
// ============================================================================

#[test]
fn test_missing_table_is_skipped() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let filters = [CategoryFilter::Only(Category::Text), CategoryFilter::All];
    write_tables(&layout, &[detr()], &filters);

    let loaded = load_tables(&layout.threshold_dir(50), &[detr(), Source::All], &filters).unwrap();

    assert_eq!(loaded.tables.len(), 2);
    assert_eq!(loaded.skipped.len(), 2, "both ALL tables are absent");
    assert!(loaded
        .skipped
        .iter()
        .all(|(_, err)| matches!(err, EvalError::MissingInput(_)) && err.is_recoverable()));
}

#[test]
fn test_table_missing_column_is_skipped() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let filters = [CategoryFilter::Only(Category::Text), CategoryFilter::All];
    write_tables(&layout, &[detr()], &filters);

    let broken = layout.table_path(50, &detr(), CategoryFilter::All);
    fs::write(&broken, "Image,TP,FP,FN,Precision,Recall\na.png,1,0,0,1.0,1.0\n").unwrap();

    let loaded = load_tables(&layout.threshold_dir(50), &[detr()], &filters).unwrap();

    assert_eq!(loaded.tables.len(), 1, "the sibling table is still loaded");
    assert_eq!(loaded.skipped.len(), 1);
    match &loaded.skipped[0].1 {
        EvalError::MissingColumn { column, .. } => assert_eq!(column, "F1-Score"),
        other => panic!("expected a missing column, got {other:?}"),
    }
}

#[test]
fn test_table_with_unparseable_rate_is_skipped() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let filters = [CategoryFilter::Only(Category::Text), CategoryFilter::All];
    write_tables(&layout, &[detr()], &filters);

    let broken = layout.table_path(50, &detr(), CategoryFilter::Only(Category::Text));
    fs::write(&broken, "Image,TP,FP,FN,Precision,Recall,F1-Score\na.png,1,0,0,high,1.0,1.0\n").unwrap();

    let loaded = load_tables(&layout.threshold_dir(50), &[detr()], &filters).unwrap();

    assert_eq!(loaded.tables.len(), 1);
    assert_eq!(loaded.tables[0].filter, CategoryFilter::All);
    assert!(matches!(loaded.skipped[0].1, EvalError::CsvError(_)));
}

#[test]
fn test_summarize_threshold_counts_skipped_tables() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let filters = CategoryFilter::sweep();
    write_tables(&layout, &[detr()], &filters);

    let mut stats = EvalStats::new();
    let (summary, merged) =
        summarize_threshold(&layout, &[detr(), Source::All], &filters, 50, &mut stats).unwrap();

    assert_eq!(stats.skipped_tables, filters.len());
    assert_eq!(summary.models.len(), 1, "the absent source is omitted, not zeroed");
    assert_eq!(summary.models[0].model, "DETR");
    assert_eq!(summary.models[0].map, 1.0);
    assert_eq!(merged, summary.models);
    assert_eq!(read_model_summary(layout.model_summary_path(50)).unwrap(), summary.models);
}

#[test]
fn test_summarize_threshold_without_directory() {
    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let mut stats = EvalStats::new();

    let result = summarize_threshold(&layout, &Source::defaults(), &CategoryFilter::sweep(), 75, &mut stats);
    assert!(matches!(result, Err(EvalError::MissingInput(_))));
}

#[test]
fn test_extract_averages_skips_bad_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path();

    let mut table = ImageTable::new(detr(), CategoryFilter::All);
    table.push(ImageMetricRow::from_counts("a.png", 1, 1, 0));
    table.write_csv(path.join("DOCLAYNET_evaluation_DETR_ALL.csv")).unwrap();
    // Header only, no AVERAGE row.
    ImageTable::new(detr(), CategoryFilter::Only(Category::Text))
        .write_csv(path.join("DOCLAYNET_evaluation_DETR_Text.csv"))
        .unwrap();
    fs::write(path.join("DOCLAYNET_evaluation_broken.csv"), "Image,Foo\nAVERAGE,1\n").unwrap();
    fs::write(path.join("__comparison_IOU50.csv"), "Model,IOU,mAP,mAR,F1\n").unwrap();

    let averages = extract_averages(path).unwrap();

    assert_eq!(averages.len(), 1);
    assert_eq!(averages[0].file_name, "DOCLAYNET_evaluation_DETR_ALL.csv");
    assert_eq!(averages[0].precision, 0.5);
    assert_eq!(averages[0].recall, 1.0);
}

// ============================================================================
// CROSS-THRESHOLD TABLE ERRORS
// ============================================================================

#[test]
fn test_cross_threshold_without_key_column_is_recreated() {
    let dir = TempDir::new().unwrap();
    let store = CrossThresholdStore::in_dir(dir.path());
    fs::write(store.path(), "Model,mAP,mAR,F1\nDETR,0.1,0.1,0.1\n").unwrap();

    assert_eq!(store.load().unwrap(), None);

    let merged = store.upsert(vec![summary_row("FRCNN", 75, 0.4)]).unwrap();
    assert_eq!(merged, vec![summary_row("FRCNN", 75, 0.4)]);
    assert_eq!(store.load().unwrap(), Some(merged));
}

#[test]
fn test_cross_threshold_store_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("nested").join("summary_across_IOUs.csv");
    let store = CrossThresholdStore::new(&path);

    store.store(&[summary_row("DETR", 50, 0.5)]).unwrap();
    assert!(path.is_file());
}

#[test]
fn test_error_display() {
    let err = EvalError::MissingColumn {
        table: "t.csv".to_string(),
        column: "IOU".to_string(),
    };
    assert_eq!(err.to_string(), "Missing column 'IOU' in t.csv");
    assert!(err.is_recoverable());

    let err = EvalError::InvalidBoundingBox("bad".to_string());
    assert!(!err.is_recoverable());
    assert!(err.to_string().contains("bad"));
}

#[test]
fn test_bounding_box_from_short_slice() {
    assert!(BoundingBox::from_corners(&[1.0, 2.0, 3.0]).is_err());
}
