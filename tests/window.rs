mod common;

use nl_analytics::{
    Value,
    data::Row,
    grouping::{self, Grouping, Statistic, TimeInterval},
    window::{self, SortDirection, WindowOrder},
};

fn scores(values: &[i64]) -> Vec<Row> {
    values
        .iter()
        .enumerate()
        .map(|(idx, v)| Row::from_pairs([("id", Value::Integer(idx as i64)), ("v", Value::Integer(*v))]))
        .collect()
}

fn column(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter().map(|row| row.value(name).clone()).collect()
}

#[test]
fn rank_skips_after_ties_dense_rank_does_not() {
    let data = scores(&[10, 10, 5]);
    let ranked = window::rank(&data, "v", SortDirection::Desc);
    let dense = window::dense_rank(&data, "v", SortDirection::Desc);
    assert_eq!(
        column(&ranked, window::RANK_COLUMN),
        vec![Value::Integer(1), Value::Integer(1), Value::Integer(3)]
    );
    assert_eq!(
        column(&dense, window::DENSE_RANK_COLUMN),
        vec![Value::Integer(1), Value::Integer(1), Value::Integer(2)]
    );
}

#[test]
fn percent_rank_shares_the_tied_position() {
    let descending = window::percent_rank(&scores(&[10, 10, 5]), "v", SortDirection::Desc);
    assert_eq!(
        column(&descending, window::PERCENT_RANK_COLUMN),
        vec![Value::Float(0.0), Value::Float(0.0), Value::Float(1.0)]
    );

    let ascending = window::percent_rank(&scores(&[5, 10, 10]), "v", SortDirection::Asc);
    assert_eq!(
        column(&ascending, window::PERCENT_RANK_COLUMN),
        vec![Value::Float(0.0), Value::Float(0.5), Value::Float(0.5)]
    );
}

#[test]
fn row_number_breaks_ties_by_input_order() {
    let ranked = window::row_number(&scores(&[3, 7, 3]), "v", SortDirection::Asc);
    assert_eq!(column(&ranked, "id"), vec![Value::Integer(0), Value::Integer(2), Value::Integer(1)]);
    assert_eq!(
        column(&ranked, window::ROW_NUMBER_COLUMN),
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
}

#[test]
fn running_total_follows_requested_order() {
    let data = scores(&[3, 1, 2]);
    let totals = window::running_total(&data, "v", Some(WindowOrder::new("v", SortDirection::Asc)));
    assert_eq!(
        column(&totals, window::RUNNING_TOTAL_COLUMN),
        vec![Value::Float(1.0), Value::Float(3.0), Value::Float(6.0)]
    );
}

#[test]
fn lag_and_lead_pad_with_default() {
    let data = scores(&[1, 2, 3]);
    let lagged = window::lag(&data, "v", 1, &Value::Null, None);
    assert_eq!(
        column(&lagged, window::LAG_COLUMN),
        vec![Value::Null, Value::Integer(1), Value::Integer(2)]
    );
    let led = window::lead(&data, "v", 2, &Value::Integer(0), None);
    assert_eq!(
        column(&led, window::LEAD_COLUMN),
        vec![Value::Integer(3), Value::Integer(0), Value::Integer(0)]
    );
}

#[test]
fn rolling_window_shrinks_at_the_start() {
    let averaged = window::rolling_average(&scores(&[2, 4, 6, 8]), "v", 3);
    assert_eq!(
        column(&averaged, window::ROLLING_AVERAGE_COLUMN),
        vec![Value::Float(2.0), Value::Float(3.0), Value::Float(4.0), Value::Float(6.0)]
    );
}

#[test]
fn ntile_splits_into_even_buckets() {
    let tiled = window::ntile(&scores(&[1, 2, 3, 4, 5]), 2);
    assert_eq!(
        column(&tiled, window::NTILE_COLUMN),
        vec![
            Value::Integer(1),
            Value::Integer(1),
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(2)
        ]
    );
}

#[test]
fn month_buckets_sort_chronologically_across_years() {
    let data = ["2024-01-15", "2023-12-01", "2023-02-10", "2024-01-02", "not a date"]
        .iter()
        .map(|date| Row::from_pairs([("created_at", *date)]))
        .collect::<Vec<_>>();
    let buckets = grouping::group_by_time_interval(&data, "created_at", TimeInterval::Month);
    let keys = buckets.iter().map(|b| b.key.as_str()).collect::<Vec<_>>();
    assert_eq!(keys, vec!["2023-02", "2023-12", "2024-01", grouping::UNKNOWN_BUCKET]);
    assert_eq!(buckets[2].rows.len(), 2);
}

#[test]
fn quarter_and_year_keys() {
    let value = Value::from("2024-08-19");
    assert_eq!(grouping::bucket_key_for(&value, TimeInterval::Quarter), "2024-Q3");
    assert_eq!(grouping::bucket_key_for(&value, TimeInterval::Year), "2024");
    assert_eq!(grouping::bucket_key_for(&Value::Null, TimeInterval::Day), "unknown");
}

#[test]
fn grouped_statistics_per_category() {
    let data = [("books", 5), ("games", 3), ("books", 1)]
        .iter()
        .map(|(category, rating)| {
            Row::from_pairs([("category", Value::from(*category)), ("rating", Value::Integer(*rating))])
        })
        .collect::<Vec<_>>();
    let rows = grouping::grouped_statistics(
        &data,
        "rating",
        Grouping::Column("category"),
        &[Statistic::Count, Statistic::Mean],
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].value(grouping::GROUP_COLUMN), &Value::from("books"));
    assert_eq!(rows[0].value("count"), &Value::Integer(2));
    assert_eq!(rows[0].value("mean"), &Value::Float(3.0));
}
