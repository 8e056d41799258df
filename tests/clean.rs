mod common;

use nl_analytics::{
    Value,
    clean::{CleanOptions, ColumnKind, clean_dataset, detect_column_type, normalize_text},
};
use proptest::prelude::*;

use common::review_rows;

#[test]
fn review_export_is_typed_and_nulls_counted() {
    let cleaned = clean_dataset(&review_rows(), &CleanOptions::default());
    assert_eq!(cleaned.report.total_rows, 8);
    assert_eq!(cleaned.report.total_columns, 6);
    assert_eq!(cleaned.report.nulls_found, 2);
    assert_eq!(cleaned.report.type_conversions, 23);

    assert_eq!(cleaned.column_type("id").map(|t| t.kind), Some(ColumnKind::Integer));
    assert_eq!(cleaned.column_type("rating").map(|t| t.kind), Some(ColumnKind::Integer));
    assert_eq!(cleaned.column_type("created_at").map(|t| t.kind), Some(ColumnKind::Date));
    assert_eq!(cleaned.column_type("product").map(|t| t.kind), Some(ColumnKind::Text));

    assert_eq!(cleaned.rows[0].value("rating"), &Value::Integer(5));
    assert_eq!(cleaned.rows[7].value("rating"), &Value::Null);
    assert_eq!(cleaned.rows[7].value("comment"), &Value::Null);
    assert!(matches!(cleaned.rows[0].value("created_at"), Value::Date(_)));
}

#[test]
fn cleaning_twice_changes_nothing() {
    let options = CleanOptions::default();
    let once = clean_dataset(&review_rows(), &options);
    let twice = clean_dataset(&once.rows, &options);
    assert_eq!(twice.rows, once.rows);
    assert_eq!(twice.report.type_conversions, 0);
    assert_eq!(twice.report.text_normalized, 0);
}

#[test]
fn disabled_inference_leaves_text_alone() {
    let options = CleanOptions {
        infer_types: false,
        normalize_text: false,
        ..CleanOptions::default()
    };
    let cleaned = clean_dataset(&review_rows(), &options);
    assert_eq!(cleaned.rows[0].value("rating"), &Value::from("5"));
    assert_eq!(cleaned.report.type_conversions, 0);
}

#[test]
fn normalization_strips_markup_and_whitespace() {
    assert_eq!(normalize_text("  <b>Great</b>   value &amp; fast  "), "Great value & fast");
}

fn cell_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|v| v.to_string()),
        (-1.0e4f64..1.0e4).prop_map(|v| format!("{v:.2}")),
        (2000i32..2030, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}")),
        "[a-z]{1,8}",
        prop_oneof![Just("true".to_string()), Just("false".to_string())],
    ]
}

proptest! {
    #[test]
    fn detection_ignores_sample_order(
        cells in proptest::collection::vec(cell_strategy(), 0..40),
    ) {
        let sample = cells.iter().map(|c| Value::from(c.as_str())).collect::<Vec<_>>();
        let first = detect_column_type(&sample);
        prop_assert_eq!(first, detect_column_type(&sample));

        let mut reversed = sample.clone();
        reversed.reverse();
        prop_assert_eq!(first, detect_column_type(&reversed));
        prop_assert!((0.0..=1.0).contains(&first.confidence));
    }
}
