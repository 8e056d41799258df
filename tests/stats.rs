mod common;

use nl_analytics::{
    Value,
    stats::{self, PercentileSide},
};
use proptest::prelude::*;

use common::numeric_rows;

#[test]
fn odd_sample_median_equals_fiftieth_percentile() {
    let values = [1.0, 3.0, 5.0];
    assert_eq!(stats::median(&values), Some(3.0));
    assert_eq!(stats::percentile(&values, 50.0), Some(3.0));
    assert_eq!(stats::mean(&values), Some(3.0));
}

#[test]
fn iqr_flags_the_single_spike() {
    let report = stats::detect_outliers(&[1.0, 2.0, 9.0, 2.0, 1.0], 1.5).expect("report");
    assert_eq!(report.indices, vec![2]);
    assert_eq!(report.values, vec![9.0]);
    assert!(report.upper_bound < 9.0);
}

#[test]
fn empty_input_yields_sentinels_not_panics() {
    assert_eq!(stats::mean(&[]), None);
    assert_eq!(stats::percentile(&[], 50.0), None);
    assert_eq!(stats::variance(&[], false), 0.0);
    assert!(stats::detect_outliers(&[], 1.5).is_none());
    assert!(stats::value_counts(&[], true).is_empty());
}

#[test]
fn perfectly_correlated_series() {
    let x = [1.0, 2.0, 3.0, 4.0];
    let y = [2.0, 4.0, 6.0, 8.0];
    let r = stats::correlation(&x, &y).expect("correlation");
    assert!((r - 1.0).abs() < 1e-12);
    assert_eq!(stats::correlation(&x, &[1.0]), None);
}

#[test]
fn value_counts_rank_by_frequency() {
    let values = ["books", "games", "books", "toys", "books", "games"]
        .iter()
        .map(|v| Value::from(*v))
        .collect::<Vec<_>>();
    let counts = stats::value_counts(&values, true);
    assert_eq!(counts[0].value, Value::from("books"));
    assert_eq!(counts[0].count, 3);
    assert_eq!(counts[0].percentage, Some(50.0));
    assert_eq!(counts[2].value, Value::from("toys"));
}

#[test]
fn top_quarter_keeps_highest_rows() {
    let rows = numeric_rows("v", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    let kept = stats::filter_by_percentile(&rows, "v", 25.0, PercentileSide::Top);
    let values = kept
        .iter()
        .filter_map(|row| row.value("v").as_f64())
        .collect::<Vec<_>>();
    assert_eq!(values, vec![7.0, 8.0]);
    assert!(stats::filter_by_percentile(&rows, "missing", 25.0, PercentileSide::Top).is_empty());
}

proptest! {
    #[test]
    fn percentile_is_monotonic_in_p(
        values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..60),
        a in 0.0f64..=100.0,
        b in 0.0f64..=100.0,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let p_low = stats::percentile(&values, low).expect("low percentile");
        let p_high = stats::percentile(&values, high).expect("high percentile");
        prop_assert!(p_low <= p_high + 1e-6);
        let min = stats::min(&values).expect("min");
        let max = stats::max(&values).expect("max");
        prop_assert!(p_low >= min - 1e-6 && p_high <= max + 1e-6);
    }

    #[test]
    fn outliers_lie_outside_their_bounds(
        values in proptest::collection::vec(-1.0e3f64..1.0e3, 1..40),
    ) {
        let report = stats::detect_outliers(&values, 1.5).expect("report");
        for value in &report.values {
            prop_assert!(*value < report.lower_bound || *value > report.upper_bound);
        }
        prop_assert_eq!(report.indices.len(), report.values.len());
    }
}
