//! Basic evaluation example: matching, per-image tables, summaries and the
//! cross-threshold merge, all on in-memory data.

use doclaynet_eval::{
    match_detections, merge, metrics::iou::calculate_iou, summarize, BoundingBox, Category,
    CategoryFilter, ImageMetricRow, ImageTable, Source,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== DocLayNet Evaluation Example ===\n");

    // Example 1: IoU Calculation
    println!("1. IoU Calculation");
    let text_block = BoundingBox::new(72.0, 100.0, 520.0, 180.0);
    let shifted = BoundingBox::new(80.0, 104.0, 526.0, 186.0);
    println!("   IoU between a text block and a shifted copy: {:.4}", calculate_iou(&text_block, &shifted));
    println!();

    // Example 2: Greedy first-match on one page
    println!("2. Matching One Page");
    let ground_truth = vec![
        BoundingBox::new(72.0, 100.0, 520.0, 180.0),
        BoundingBox::new(72.0, 200.0, 520.0, 400.0),
        BoundingBox::new(72.0, 420.0, 300.0, 440.0),
    ];
    let predictions = vec![
        BoundingBox::new(75.0, 102.0, 518.0, 182.0),
        BoundingBox::new(70.0, 205.0, 522.0, 395.0),
        BoundingBox::new(400.0, 600.0, 500.0, 650.0),
    ];
    let result = match_detections(&predictions, &ground_truth, 0.5);
    println!(
        "   TP={} FP={} FN={}",
        result.true_positives, result.false_positives, result.false_negatives
    );
    println!();

    // Example 3: Per-image tables for two models
    println!("3. Per-Image Tables (IOU=0.75)");
    let text = CategoryFilter::Only(Category::Text);
    let pages = [
        ("page_001.png", (3, 0, 0), (2, 1, 1)),
        ("page_002.png", (1, 1, 0), (0, 2, 1)),
        ("page_003.png", (4, 0, 1), (4, 1, 1)),
    ];

    let mut detr = ImageTable::new(Source::Named("DETR".into()), text);
    let mut frcnn = ImageTable::new(Source::Named("FRCNN".into()), text);
    for (image, (d_tp, d_fp, d_fn), (f_tp, f_fp, f_fn)) in pages {
        detr.push(ImageMetricRow::from_counts(image, d_tp, d_fp, d_fn));
        frcnn.push(ImageMetricRow::from_counts(image, f_tp, f_fp, f_fn));
    }

    let mut buffer = Vec::new();
    detr.write_to(&mut buffer)?;
    println!("   {}:", detr.file_name());
    for line in String::from_utf8(buffer)?.lines() {
        println!("   │ {line}");
    }
    println!();

    // Example 4: Model and category summaries
    println!("4. Summaries");
    let summary = summarize(&[detr, frcnn], 75);
    println!("   Model    | mAP    | mAR    | F1");
    println!("   ---------|--------|--------|-------");
    for row in &summary.models {
        println!("   {:<8} | {:.4} | {:.4} | {:.4}", row.model, row.map, row.mar, row.f1);
    }
    for row in &summary.categories {
        println!("   ├─ {} / {}: F1 {:.4}", row.category, row.source, row.f1);
    }
    println!();

    // Example 5: Merging into the cross-threshold table
    println!("5. Cross-Threshold Merge");
    let previous: Vec<_> = summary
        .models
        .iter()
        .map(|row| doclaynet_eval::ModelSummaryRow {
            iou: 50,
            map: 0.9,
            ..row.clone()
        })
        .collect();
    let merged = merge(Some(previous), summary.models.clone());
    let again = merge(Some(merged.clone()), summary.models);
    for row in &merged {
        println!("   {:<8} IOU={:>3}  mAP={:.4}", row.model, row.iou, row.map);
    }
    println!("   Re-applying the same rows changes nothing: {}", merged == again);
    println!();

    println!("=== Example Complete ===");

    Ok(())
}
