//! The structured reading of one natural-language question.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::matcher::{ColumnReference, MatchKind};
use crate::{
    filter::{ComparisonOperator, FilterCondition},
    grouping::TimeInterval,
    matcher::Sentiment,
    stats::PercentileSide,
    window::SortDirection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFunction {
    Avg,
    Sum,
    Count,
    Max,
    Min,
    Median,
    Mode,
    Stdev,
    Variance,
    Correlation,
    Covariance,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Median => "MEDIAN",
            AggregateFunction::Mode => "MODE",
            AggregateFunction::Stdev => "STDEV",
            AggregateFunction::Variance => "VARIANCE",
            AggregateFunction::Correlation => "CORRELATION",
            AggregateFunction::Covariance => "COVARIANCE",
        }
    }

    /// Prefix used for metric column names, e.g. `avg_rating`.
    pub fn label(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    pub fn is_pairwise(&self) -> bool {
        matches!(
            self,
            AggregateFunction::Correlation | AggregateFunction::Covariance
        )
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub column: Option<String>,
    /// Second series for CORRELATION and COVARIANCE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_with: Option<String>,
}

impl Aggregation {
    pub fn new(function: AggregateFunction) -> Self {
        Self {
            function,
            column: None,
            paired_with: None,
        }
    }

    pub fn describe(&self) -> String {
        match (&self.column, &self.paired_with) {
            (Some(column), Some(other)) => format!("{}({column}, {other})", self.function),
            (Some(column), None) => format!("{}({column})", self.function),
            (None, _) if self.function == AggregateFunction::Count => {
                format!("{}(*)", self.function)
            }
            (None, _) => format!("{}(<numeric column>)", self.function),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowFunction {
    Rank,
    DenseRank,
    RowNumber,
    RunningTotal,
    RunningAvg,
    RollingAvg,
    Lag,
    Lead,
    Percentile,
    PercentRank,
    Ntile,
}

impl WindowFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowFunction::Rank => "RANK",
            WindowFunction::DenseRank => "DENSE_RANK",
            WindowFunction::RowNumber => "ROW_NUMBER",
            WindowFunction::RunningTotal => "RUNNING_TOTAL",
            WindowFunction::RunningAvg => "RUNNING_AVG",
            WindowFunction::RollingAvg => "ROLLING_AVG",
            WindowFunction::Lag => "LAG",
            WindowFunction::Lead => "LEAD",
            WindowFunction::Percentile => "PERCENTILE",
            WindowFunction::PercentRank => "PERCENT_RANK",
            WindowFunction::Ntile => "NTILE",
        }
    }

    /// Ranking-style functions order by their own column, highest first.
    pub fn ranks_values(&self) -> bool {
        matches!(
            self,
            WindowFunction::Rank
                | WindowFunction::DenseRank
                | WindowFunction::RowNumber
                | WindowFunction::Percentile
                | WindowFunction::PercentRank
                | WindowFunction::Ntile
        )
    }
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    pub function: WindowFunction,
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    pub interval: TimeInterval,
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileFilter {
    pub percent: f64,
    pub side: PercentileSide,
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticFilter {
    pub term: String,
    pub sentiment: Sentiment,
    /// Schema column the sentiment term resolved to, if any.
    pub column: Option<String>,
    pub operator: ComparisonOperator,
    pub threshold: f64,
}

impl SemanticFilter {
    pub fn describe(&self) -> String {
        format!(
            "{} {} {} ('{}')",
            self.column.as_deref().unwrap_or("rating"),
            self.operator.symbol(),
            crate::data::format_number(self.threshold),
            self.term
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub question: String,
    pub columns: Vec<ColumnReference>,
    pub aggregations: Vec<Aggregation>,
    pub filters: Vec<FilterCondition>,
    pub group_by: Vec<String>,
    pub window_function: Option<WindowRequest>,
    pub time_analysis: Option<TimeAnalysis>,
    pub order: Option<SortDirection>,
    /// Explicit `sort by <column>` target.
    pub order_column: Option<String>,
    pub limit: Option<usize>,
    pub percentile_filter: Option<PercentileFilter>,
    pub semantic_filter: Option<SemanticFilter>,
    pub clarification_needed: bool,
    pub clarification_question: Option<String>,
    pub inherited_context: bool,
}

impl Intent {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            ..Self::default()
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }

    pub fn time_column(&self) -> Option<&str> {
        self.time_analysis
            .as_ref()
            .and_then(|time| time.column.as_deref())
    }

    pub fn has_grouping(&self) -> bool {
        !self.group_by.is_empty() || self.time_analysis.is_some()
    }
}
