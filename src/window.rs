//! Window functions over row sequences.
//!
//! Functions that take an ordering first apply a stable sort on the order
//! column, so rows with equal keys keep their input order. Each function
//! returns the (possibly reordered) rows with one computed column appended.

use std::{cmp::Ordering, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::data::{Row, Value};

pub const ROW_NUMBER_COLUMN: &str = "row_number";
pub const RANK_COLUMN: &str = "rank";
pub const DENSE_RANK_COLUMN: &str = "dense_rank";
pub const PERCENT_RANK_COLUMN: &str = "percent_rank";
pub const LAG_COLUMN: &str = "lag";
pub const LEAD_COLUMN: &str = "lead";
pub const RUNNING_TOTAL_COLUMN: &str = "running_total";
pub const RUNNING_AVERAGE_COLUMN: &str = "running_average";
pub const ROLLING_AVERAGE_COLUMN: &str = "rolling_average";
pub const NTILE_COLUMN: &str = "ntile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ascending"),
            SortDirection::Desc => f.write_str("descending"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(anyhow!("Unknown sort direction '{other}'")),
        }
    }
}

/// Ordering applied before a window computation.
#[derive(Debug, Clone, Copy)]
pub struct WindowOrder<'a> {
    pub column: &'a str,
    pub direction: SortDirection,
}

impl<'a> WindowOrder<'a> {
    pub fn new(column: &'a str, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}

pub fn sort_rows(data: &[Row], column: &str, direction: SortDirection) -> Vec<Row> {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| direction.apply(a.value(column).compare(b.value(column))));
    sorted
}

fn ordered(data: &[Row], order: Option<WindowOrder<'_>>) -> Vec<Row> {
    match order {
        Some(order) => sort_rows(data, order.column, order.direction),
        None => data.to_vec(),
    }
}

fn numeric_or_zero(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

pub fn row_number(data: &[Row], order_by: &str, direction: SortDirection) -> Vec<Row> {
    let mut rows = sort_rows(data, order_by, direction);
    for (idx, row) in rows.iter_mut().enumerate() {
        row.insert(ROW_NUMBER_COLUMN, Value::Integer(idx as i64 + 1));
    }
    rows
}

fn rank_positions(rows: &[Row], order_by: &str, dense: bool) -> Vec<i64> {
    let mut ranks = Vec::with_capacity(rows.len());
    let mut current = 0_i64;
    for (idx, row) in rows.iter().enumerate() {
        let tied = idx > 0
            && rows[idx - 1]
                .value(order_by)
                .compare(row.value(order_by))
                .is_eq();
        if !tied {
            current = if dense { current + 1 } else { idx as i64 + 1 };
        }
        ranks.push(current);
    }
    ranks
}

/// SQL `RANK()`: ties share a rank and the next distinct value skips ahead.
pub fn rank(data: &[Row], order_by: &str, direction: SortDirection) -> Vec<Row> {
    let mut rows = sort_rows(data, order_by, direction);
    let ranks = rank_positions(&rows, order_by, false);
    for (row, rank) in rows.iter_mut().zip(ranks) {
        row.insert(RANK_COLUMN, Value::Integer(rank));
    }
    rows
}

/// SQL `DENSE_RANK()`: ties share a rank, no gaps.
pub fn dense_rank(data: &[Row], order_by: &str, direction: SortDirection) -> Vec<Row> {
    let mut rows = sort_rows(data, order_by, direction);
    let ranks = rank_positions(&rows, order_by, true);
    for (row, rank) in rows.iter_mut().zip(ranks) {
        row.insert(DENSE_RANK_COLUMN, Value::Integer(rank));
    }
    rows
}

pub fn percent_rank(data: &[Row], order_by: &str, direction: SortDirection) -> Vec<Row> {
    let mut rows = sort_rows(data, order_by, direction);
    let ranks = rank_positions(&rows, order_by, false);
    let n = rows.len();
    for (row, rank) in rows.iter_mut().zip(ranks) {
        let pct = if n <= 1 {
            0.0
        } else {
            (rank - 1) as f64 / (n - 1) as f64
        };
        row.insert(PERCENT_RANK_COLUMN, Value::Float(pct));
    }
    rows
}

/// Value of `column` from `offset` rows earlier, or `default` before the start.
pub fn lag(
    data: &[Row],
    column: &str,
    offset: usize,
    default: &Value,
    order: Option<WindowOrder<'_>>,
) -> Vec<Row> {
    let mut rows = ordered(data, order);
    let source = rows
        .iter()
        .map(|row| row.value(column).clone())
        .collect::<Vec<_>>();
    for (idx, row) in rows.iter_mut().enumerate() {
        let value = idx
            .checked_sub(offset)
            .and_then(|pos| source.get(pos))
            .cloned()
            .unwrap_or_else(|| default.clone());
        row.insert(LAG_COLUMN, value);
    }
    rows
}

/// Value of `column` from `offset` rows later, or `default` past the end.
pub fn lead(
    data: &[Row],
    column: &str,
    offset: usize,
    default: &Value,
    order: Option<WindowOrder<'_>>,
) -> Vec<Row> {
    let mut rows = ordered(data, order);
    let source = rows
        .iter()
        .map(|row| row.value(column).clone())
        .collect::<Vec<_>>();
    for (idx, row) in rows.iter_mut().enumerate() {
        let value = idx
            .checked_add(offset)
            .and_then(|pos| source.get(pos))
            .cloned()
            .unwrap_or_else(|| default.clone());
        row.insert(LEAD_COLUMN, value);
    }
    rows
}

pub fn running_total(data: &[Row], column: &str, order: Option<WindowOrder<'_>>) -> Vec<Row> {
    let mut rows = ordered(data, order);
    let mut total = 0.0;
    for row in rows.iter_mut() {
        total += numeric_or_zero(row.value(column));
        row.insert(RUNNING_TOTAL_COLUMN, Value::Float(total));
    }
    rows
}

pub fn running_average(data: &[Row], column: &str, order: Option<WindowOrder<'_>>) -> Vec<Row> {
    let mut rows = ordered(data, order);
    let mut total = 0.0;
    for (idx, row) in rows.iter_mut().enumerate() {
        total += numeric_or_zero(row.value(column));
        row.insert(RUNNING_AVERAGE_COLUMN, Value::Float(total / (idx + 1) as f64));
    }
    rows
}

/// Trailing average over `[idx - window + 1, idx]`; the window shrinks at the
/// start instead of padding.
pub fn rolling_average(data: &[Row], column: &str, window_size: usize) -> Vec<Row> {
    let window = window_size.max(1);
    let values = data
        .iter()
        .map(|row| numeric_or_zero(row.value(column)))
        .collect::<Vec<_>>();
    let mut rows = data.to_vec();
    for (idx, row) in rows.iter_mut().enumerate() {
        let start = (idx + 1).saturating_sub(window);
        let slice = &values[start..=idx];
        let average = slice.iter().sum::<f64>() / slice.len() as f64;
        row.insert(ROLLING_AVERAGE_COLUMN, Value::Float(average));
    }
    rows
}

/// Bucket `floor(idx / ceil(count / n)) + 1` in input order.
pub fn ntile(data: &[Row], buckets: usize) -> Vec<Row> {
    let buckets = buckets.max(1);
    let bucket_size = data.len().div_ceil(buckets).max(1);
    let mut rows = data.to_vec();
    for (idx, row) in rows.iter_mut().enumerate() {
        row.insert(NTILE_COLUMN, Value::Integer((idx / bucket_size) as i64 + 1));
    }
    rows
}
