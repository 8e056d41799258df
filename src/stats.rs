//! Descriptive statistics over numeric sequences.
//!
//! Everything here is pure and total: empty input, zero variance and
//! out-of-range arguments yield `None` or `0.0` instead of errors. Callers
//! holding [`Value`]s go through [`numeric_values()`], which drops anything
//! that is not a number.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::{Row, Value};

pub const DEFAULT_OUTLIER_MULTIPLIER: f64 = 1.5;

pub fn numeric_values(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}

/// Numeric cells of `column` in row order; missing and non-numeric cells are skipped.
pub fn column_numbers(rows: &[Row], column: &str) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| row.value(column).as_f64())
        .collect()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(sum(values) / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent value; ties go to the value seen first.
pub fn mode(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.to_bits()).or_insert(0) += 1;
    }
    let mut best: Option<(f64, usize)> = None;
    for value in values {
        let count = counts[&value.to_bits()];
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((*value, count));
        }
    }
    best.map(|(value, _)| value)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Sample variance (n-1) unless `population` is set. Fewer than two values
/// (one for population variance) yield 0.
pub fn variance(values: &[f64], population: bool) -> f64 {
    let n = values.len();
    let required = if population { 1 } else { 2 };
    if n < required {
        return 0.0;
    }
    let Some(mean) = mean(values) else {
        return 0.0;
    };
    let squared = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let divisor = if population { n as f64 } else { (n - 1) as f64 };
    squared / divisor
}

pub fn standard_deviation(values: &[f64], population: bool) -> f64 {
    variance(values, population).sqrt()
}

/// Linear interpolation between order statistics at rank `p/100 * (n-1)`.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let sorted = sorted(values);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub iqr: f64,
}

pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    let q1 = percentile(values, 25.0)?;
    let q2 = percentile(values, 50.0)?;
    let q3 = percentile(values, 75.0)?;
    Some(Quartiles {
        q1,
        q2,
        q3,
        iqr: q3 - q1,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Positions in the input slice, ascending.
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl OutlierReport {
    pub fn count(&self) -> usize {
        self.indices.len()
    }
}

/// Flags values outside `[Q1 - m*IQR, Q3 + m*IQR]`.
pub fn detect_outliers(values: &[f64], multiplier: f64) -> Option<OutlierReport> {
    let quartiles = quartiles(values)?;
    let lower_bound = quartiles.q1 - multiplier * quartiles.iqr;
    let upper_bound = quartiles.q3 + multiplier * quartiles.iqr;
    let (indices, outliers): (Vec<usize>, Vec<f64>) = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lower_bound || **v > upper_bound)
        .map(|(idx, v)| (idx, *v))
        .unzip();
    Some(OutlierReport {
        lower_bound,
        upper_bound,
        indices,
        values: outliers,
    })
}

/// Pearson coefficient. `None` when the series differ in length or have fewer
/// than two points, `0.0` when either series is constant.
pub fn correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mean_x = mean(x)?;
    let mean_y = mean(y)?;
    let mut numerator = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        numerator += dx * dy;
        sum_x += dx * dx;
        sum_y += dy * dy;
    }
    if sum_x == 0.0 || sum_y == 0.0 {
        return Some(0.0);
    }
    Some(numerator / (sum_x * sum_y).sqrt())
}

pub fn covariance(x: &[f64], y: &[f64], population: bool) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mean_x = mean(x)?;
    let mean_y = mean(y)?;
    let products = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum::<f64>();
    let divisor = if population {
        x.len() as f64
    } else {
        (x.len() - 1) as f64
    };
    Some(products / divisor)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub quartiles: Option<Quartiles>,
}

pub fn describe(values: &[f64]) -> Summary {
    Summary {
        count: values.len(),
        mean: mean(values),
        median: median(values),
        std_dev: standard_deviation(values, false),
        min: min(values),
        max: max(values),
        quartiles: quartiles(values),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Value,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// Frequency table, most frequent first; equal counts keep first-appearance order.
pub fn value_counts(values: &[Value], with_percentage: bool) -> Vec<ValueCount> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();
    for value in values {
        let key = value.as_display();
        match positions.get(&key) {
            Some(&idx) => counts[idx].count += 1,
            None => {
                positions.insert(key, counts.len());
                counts.push(ValueCount {
                    value: value.clone(),
                    count: 1,
                    percentage: None,
                });
            }
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    if with_percentage && !values.is_empty() {
        let total = values.len() as f64;
        for entry in &mut counts {
            entry.percentage = Some(entry.count as f64 / total * 100.0);
        }
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PercentileSide {
    Top,
    Bottom,
}

/// Keeps rows at or beyond the percentile threshold of `column`: the
/// `(100 - pct)`-th percentile for the top slice, the `pct`-th for the bottom.
/// An unusable threshold (no numeric values, `pct` out of range) keeps nothing.
pub fn filter_by_percentile(rows: &[Row], column: &str, pct: f64, side: PercentileSide) -> Vec<Row> {
    let values = column_numbers(rows, column);
    let threshold = match side {
        PercentileSide::Top => percentile(&values, 100.0 - pct),
        PercentileSide::Bottom => percentile(&values, pct),
    };
    let Some(threshold) = threshold else {
        return Vec::new();
    };
    rows.iter()
        .filter(|row| match (row.value(column).as_f64(), side) {
            (Some(v), PercentileSide::Top) => v >= threshold,
            (Some(v), PercentileSide::Bottom) => v <= threshold,
            (None, _) => false,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_and_percentile_agree_on_odd_input() {
        let values = [1.0, 3.0, 5.0];
        assert_eq!(median(&values), Some(3.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&values, 0.0), Some(10.0));
        assert_eq!(percentile(&values, 100.0), Some(40.0));
        let p = percentile(&values, 25.0).unwrap();
        assert!((p - 17.5).abs() < 1e-9);
    }

    #[test]
    fn percentile_rejects_out_of_range_and_empty() {
        assert_eq!(percentile(&[1.0], -0.1), None);
        assert_eq!(percentile(&[1.0], 100.5), None);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn standard_deviation_uses_sample_divisor() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((standard_deviation(&values, true) - 2.0).abs() < 1e-9);
        assert!((standard_deviation(&values, false) - 2.138_089_935).abs() < 1e-6);
        assert_eq!(standard_deviation(&[3.0], false), 0.0);
    }

    #[test]
    fn mode_breaks_ties_by_first_appearance() {
        assert_eq!(mode(&[3.0, 1.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn correlation_sentinels() {
        assert_eq!(correlation(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(correlation(&[1.0], &[1.0]), None);
        assert_eq!(correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), Some(0.0));
        let r = correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn filter_by_percentile_keeps_top_slice() {
        let rows = (1..=10)
            .map(|v| Row::from_pairs([("score", v)]))
            .collect::<Vec<_>>();
        let top = filter_by_percentile(&rows, "score", 20.0, PercentileSide::Top);
        let kept = top
            .iter()
            .map(|row| row.value("score").as_f64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(kept, vec![9.0, 10.0]);
        let bottom = filter_by_percentile(&rows, "score", 10.0, PercentileSide::Bottom);
        assert_eq!(bottom.len(), 1);
    }

    #[test]
    fn numeric_values_skips_non_numbers() {
        let values = vec![
            Value::Integer(1),
            Value::from("2"),
            Value::Null,
            Value::Float(2.5),
        ];
        assert_eq!(numeric_values(&values), vec![1.0, 2.5]);
    }
}
