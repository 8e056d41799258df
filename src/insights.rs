//! Short human-readable observations about a result set.

use itertools::Itertools;

use crate::{
    data::{Row, format_number},
    intent::Intent,
    stats,
};

const MIN_TREND_ROWS: usize = 3;

pub fn generate_insights(rows: &[Row], intent: &Intent, outlier_multiplier: f64) -> Vec<String> {
    let mut insights = vec![format!("Returned {} row(s)", rows.len())];

    if let Some(column) = first_numeric_column(rows) {
        let values = stats::column_numbers(rows, &column);
        if let (Some(mean), Some(min), Some(max)) =
            (stats::mean(&values), stats::min(&values), stats::max(&values))
        {
            insights.push(format!(
                "{column}: mean {}, min {}, max {}",
                format_number(mean),
                format_number(min),
                format_number(max)
            ));
        }
        if let Some(report) = stats::detect_outliers(&values, outlier_multiplier)
            && report.count() > 0
        {
            insights.push(format!(
                "{} potential outlier(s) in {column} outside [{}, {}]",
                report.count(),
                format_number(report.lower_bound),
                format_number(report.upper_bound)
            ));
        }
    }

    if intent.time_analysis.is_some()
        && rows.len() >= MIN_TREND_ROWS
        && let (Some(first), Some(last)) = (
            rows.first().and_then(first_number),
            rows.last().and_then(first_number),
        )
        && first != 0.0
    {
        let change = (last - first) / first.abs() * 100.0;
        let direction = if change > 0.0 {
            "increased"
        } else if change < 0.0 {
            "decreased"
        } else {
            "stayed flat"
        };
        insights.push(format!(
            "Trend: {direction} by {:.1}% from the first to the last period",
            change.abs()
        ));
    }

    insights
}

/// Columns are visited in first-seen order across all rows, so a column that
/// is absent or null in the first row still counts.
fn first_numeric_column(rows: &[Row]) -> Option<String> {
    rows.iter()
        .flat_map(|row| row.columns())
        .unique()
        .find(|column| rows.iter().any(|row| row.value(column).is_numeric()))
        .map(str::to_string)
}

fn first_number(row: &Row) -> Option<f64> {
    row.iter().find_map(|(_, value)| value.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        grouping::TimeInterval,
        intent::TimeAnalysis,
    };

    #[test]
    fn summarises_first_numeric_column_and_outliers() {
        let rows = [1, 2, 9, 2, 1]
            .iter()
            .map(|v| Row::from_pairs([("name", Value::from("x")), ("v", Value::Integer(*v))]))
            .collect::<Vec<_>>();
        let insights = generate_insights(&rows, &Intent::default(), 1.5);
        assert_eq!(insights[0], "Returned 5 row(s)");
        assert_eq!(insights[1], "v: mean 3, min 1, max 9");
        assert!(insights[2].starts_with("1 potential outlier(s) in v"));
    }

    #[test]
    fn numeric_column_found_past_a_sparse_first_row() {
        let rows = vec![
            Row::from_pairs([("product", Value::from("Kettle"))]),
            Row::from_pairs([("product", Value::from("Lamp")), ("rating", Value::Integer(4))]),
            Row::from_pairs([("product", Value::from("Rug")), ("rating", Value::Integer(2))]),
        ];
        let insights = generate_insights(&rows, &Intent::default(), 1.5);
        assert_eq!(insights[1], "rating: mean 3, min 2, max 4");
    }

    #[test]
    fn trend_needs_time_analysis_and_three_rows() {
        let rows = [("2024-01", 10.0), ("2024-02", 12.0), ("2024-03", 15.0)]
            .iter()
            .map(|(period, avg)| {
                Row::from_pairs([("period", Value::from(*period)), ("avg", Value::Float(*avg))])
            })
            .collect::<Vec<_>>();
        let mut intent = Intent::default();
        assert!(
            !generate_insights(&rows, &intent, 1.5)
                .iter()
                .any(|line| line.starts_with("Trend"))
        );

        intent.time_analysis = Some(TimeAnalysis {
            interval: TimeInterval::Month,
            column: None,
        });
        let insights = generate_insights(&rows, &intent, 1.5);
        assert_eq!(
            insights.last().map(String::as_str),
            Some("Trend: increased by 50.0% from the first to the last period")
        );
    }

    #[test]
    fn trend_skipped_when_first_value_is_zero() {
        let rows = [0.0, 1.0, 2.0]
            .iter()
            .map(|v| Row::from_pairs([("v", Value::Float(*v))]))
            .collect::<Vec<_>>();
        let intent = Intent {
            time_analysis: Some(TimeAnalysis {
                interval: TimeInterval::Day,
                column: None,
            }),
            ..Intent::default()
        };
        assert!(
            !generate_insights(&rows, &intent, 1.5)
                .iter()
                .any(|line| line.starts_with("Trend"))
        );
    }
}
