//! Time-bucketed and categorical grouping with per-group statistics.
//!
//! Bucket keys are zero-padded and most-significant-first (`2024-03`,
//! `2024-Q1`, `2024-W07`), so sorting keys lexicographically also sorts them
//! chronologically. Rows whose date cannot be read land in `"unknown"`.

use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Row, Value},
    stats,
};

pub const UNKNOWN_BUCKET: &str = "unknown";
pub const GROUP_COLUMN: &str = "group";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInterval {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInterval::Day => "day",
            TimeInterval::Week => "week",
            TimeInterval::Month => "month",
            TimeInterval::Quarter => "quarter",
            TimeInterval::Year => "year",
        }
    }

    pub fn bucket_key(&self, timestamp: &NaiveDateTime) -> String {
        let date = timestamp.date();
        match self {
            TimeInterval::Year => format!("{:04}", date.year()),
            TimeInterval::Quarter => format!("{:04}-Q{}", date.year(), date.month0() / 3 + 1),
            TimeInterval::Month => format!("{:04}-{:02}", date.year(), date.month()),
            TimeInterval::Week => format!("{:04}-W{:02}", date.year(), week_of_year(&date)),
            TimeInterval::Day => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Monday-based week number where week 1 holds January 1st.
fn week_of_year(date: &NaiveDate) -> u32 {
    let jan_first_offset = date
        .with_ordinal0(0)
        .map(|jan_first| jan_first.weekday().num_days_from_monday())
        .unwrap_or(0);
    (date.ordinal0() + jan_first_offset) / 7 + 1
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeInterval {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(TimeInterval::Day),
            "week" | "weekly" => Ok(TimeInterval::Week),
            "month" | "monthly" => Ok(TimeInterval::Month),
            "quarter" | "quarterly" => Ok(TimeInterval::Quarter),
            "year" | "yearly" | "annual" => Ok(TimeInterval::Year),
            other => Err(anyhow!("Unknown time interval '{other}'")),
        }
    }
}

pub fn bucket_key_for(value: &Value, interval: TimeInterval) -> String {
    value
        .as_date()
        .map(|timestamp| interval.bucket_key(&timestamp))
        .unwrap_or_else(|| UNKNOWN_BUCKET.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub key: String,
    pub rows: Vec<Row>,
}

pub fn group_by_time_interval(
    data: &[Row],
    date_column: &str,
    interval: TimeInterval,
) -> Vec<TimeBucket> {
    let mut buckets: BTreeMap<String, Vec<Row>> = BTreeMap::new();
    for row in data {
        let key = bucket_key_for(row.value(date_column), interval);
        buckets.entry(key).or_default().push(row.clone());
    }
    buckets
        .into_iter()
        .map(|(key, rows)| TimeBucket { key, rows })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub enum Grouping<'a> {
    None,
    Column(&'a str),
    Time {
        column: &'a str,
        interval: TimeInterval,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Count,
    Sum,
    Mean,
    Median,
    StdDev,
    Variance,
    Min,
    Max,
    Percentile(f64),
}

impl Statistic {
    pub const DEFAULT_SET: &'static [Statistic] = &[
        Statistic::Count,
        Statistic::Sum,
        Statistic::Mean,
        Statistic::Min,
        Statistic::Max,
    ];

    pub fn column_name(&self) -> String {
        match self {
            Statistic::Count => "count".to_string(),
            Statistic::Sum => "sum".to_string(),
            Statistic::Mean => "mean".to_string(),
            Statistic::Median => "median".to_string(),
            Statistic::StdDev => "std_dev".to_string(),
            Statistic::Variance => "variance".to_string(),
            Statistic::Min => "min".to_string(),
            Statistic::Max => "max".to_string(),
            Statistic::Percentile(p) => format!("p{}", crate::data::format_number(*p)),
        }
    }

    pub fn compute(&self, values: &[f64]) -> Value {
        match self {
            Statistic::Count => Value::Integer(values.len() as i64),
            Statistic::Sum => Value::Float(stats::sum(values)),
            Statistic::Mean => stats::mean(values).into(),
            Statistic::Median => stats::median(values).into(),
            Statistic::StdDev => Value::Float(stats::standard_deviation(values, false)),
            Statistic::Variance => Value::Float(stats::variance(values, false)),
            Statistic::Min => stats::min(values).into(),
            Statistic::Max => stats::max(values).into(),
            Statistic::Percentile(p) => stats::percentile(values, *p).into(),
        }
    }
}

/// One output row per group: the group key under [`GROUP_COLUMN`] followed by
/// each requested statistic, all computed from the raw numeric values of
/// `value_column` inside the group. Groups are sorted by key.
pub fn grouped_statistics(
    data: &[Row],
    value_column: &str,
    grouping: Grouping<'_>,
    statistics: &[Statistic],
) -> Vec<Row> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in data {
        let key = match grouping {
            Grouping::None => "all".to_string(),
            Grouping::Column(column) => row.value(column).as_display(),
            Grouping::Time { column, interval } => bucket_key_for(row.value(column), interval),
        };
        let values = groups.entry(key).or_default();
        if let Some(number) = row.value(value_column).as_f64() {
            values.push(number);
        }
    }

    groups
        .into_iter()
        .map(|(key, values)| {
            let mut output = Row::with_capacity(statistics.len() + 1);
            output.insert(GROUP_COLUMN, Value::Text(key));
            for statistic in statistics {
                output.insert(statistic.column_name(), statistic.compute(&values));
            }
            output
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(date: &str, value: i64) -> Row {
        Row::from_pairs([
            ("created_at", Value::from(date)),
            ("rating", Value::Integer(value)),
        ])
    }

    #[test]
    fn bucket_keys_per_interval() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(TimeInterval::Year.bucket_key(&ts), "2024");
        assert_eq!(TimeInterval::Quarter.bucket_key(&ts), "2024-Q2");
        assert_eq!(TimeInterval::Month.bucket_key(&ts), "2024-05");
        assert_eq!(TimeInterval::Day.bucket_key(&ts), "2024-05-06");
        assert_eq!(TimeInterval::Week.bucket_key(&ts), "2024-W19");
    }

    #[test]
    fn unparseable_dates_bucket_to_unknown() {
        let buckets = group_by_time_interval(
            &[dated("not a date", 1), dated("2024-01-02", 2)],
            "created_at",
            TimeInterval::Month,
        );
        let keys = buckets.iter().map(|b| b.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["2024-01", "unknown"]);
    }

    #[test]
    fn grouped_statistics_by_column() {
        let rows = vec![
            Row::from_pairs([("city", Value::from("b")), ("v", Value::Integer(4))]),
            Row::from_pairs([("city", Value::from("a")), ("v", Value::Integer(1))]),
            Row::from_pairs([("city", Value::from("b")), ("v", Value::Integer(6))]),
        ];
        let grouped = grouped_statistics(
            &rows,
            "v",
            Grouping::Column("city"),
            &[Statistic::Count, Statistic::Mean, Statistic::Percentile(50.0)],
        );
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].value(GROUP_COLUMN), &Value::from("a"));
        assert_eq!(grouped[1].value("count"), &Value::Integer(2));
        assert_eq!(grouped[1].value("mean"), &Value::Float(5.0));
        assert_eq!(grouped[1].value("p50"), &Value::Float(5.0));
    }

    #[test]
    fn grouped_statistics_without_grouping_is_single_bucket() {
        let rows = vec![dated("2024-01-01", 2), dated("2024-02-01", 4)];
        let grouped = grouped_statistics(&rows, "rating", Grouping::None, Statistic::DEFAULT_SET);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].value("sum"), &Value::Float(6.0));
    }
}
