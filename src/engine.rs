//! Plan execution.
//!
//! Responsibilities:
//! - Clean the incoming dataset (always the first log entry).
//! - Thread a working set through the plan's steps: plain rows, or groups
//!   once a Group step has run.
//! - Resolve column roles at execution time with [`ColumnHeuristics`],
//!   preferring whatever column the planner already named.
//! - Convert step faults into the failure shape of [`ExecutionResult`],
//!   keeping the data and log produced so far.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    clean::clean_dataset,
    config::EngineOptions,
    data::{Row, Value},
    error::AnalyticsError,
    filter::{FilterCondition, evaluate_conditions},
    grouping::bucket_key_for,
    insights::generate_insights,
    intent::{
        AggregateFunction, Aggregation, Intent, PercentileFilter, SemanticFilter, TimeAnalysis,
        WindowFunction, WindowRequest,
    },
    plan::{Complexity, ExecutionPlan, StepConfig},
    planner::{
        CLARIFICATION_PROMPT, create_execution_plan, merge_conversation_context,
        parse_query_intent_with_threshold,
    },
    schema::Schema,
    session::{ConversationTurn, SessionState},
    stats::{self, PercentileSide},
    window::{self, SortDirection, WindowOrder},
};

/// Key column holding the time bucket after a time-based Group step.
pub const PERIOD_COLUMN: &str = "period";
/// Row count of each group when no aggregation follows a Group step.
pub const COUNT_COLUMN: &str = "count";
pub const PERCENTILE_COLUMN: &str = "percentile";

/// Execution-time column resolution. Independent of the semantic matcher:
/// these rules look at the data, not the question, and always pick the first
/// qualifying column.
pub struct ColumnHeuristics;

impl ColumnHeuristics {
    pub const RATING_KEYWORDS: &'static [&'static str] =
        &["rating", "score", "stars", "rate", "value"];
    pub const DATE_KEYWORDS: &'static [&'static str] = &["date", "created", "timestamp", "time"];
    pub const SAMPLE_ROWS: usize = 10;

    fn columns(rows: &[Row]) -> Vec<String> {
        rows.iter()
            .take(Self::SAMPLE_ROWS)
            .flat_map(|row| row.columns())
            .unique()
            .map(str::to_string)
            .collect()
    }

    fn keyword_column(rows: &[Row], keywords: &[&str]) -> Option<String> {
        Self::columns(rows).into_iter().find(|column| {
            let lowered = column.to_lowercase();
            keywords.iter().any(|keyword| lowered.contains(keyword))
        })
    }

    fn sampled_all(rows: &[Row], column: &str, predicate: impl Fn(&Value) -> bool) -> bool {
        let mut seen = false;
        for row in rows.iter().take(Self::SAMPLE_ROWS) {
            let value = row.value(column);
            if value.is_null() {
                continue;
            }
            if !predicate(value) {
                return false;
            }
            seen = true;
        }
        seen
    }

    pub fn rating_column(rows: &[Row]) -> Option<String> {
        Self::keyword_column(rows, Self::RATING_KEYWORDS)
    }

    /// Name keywords first, then the first column whose sampled values are
    /// all dates.
    pub fn date_column(rows: &[Row]) -> Option<String> {
        Self::keyword_column(rows, Self::DATE_KEYWORDS).or_else(|| {
            Self::columns(rows)
                .into_iter()
                .find(|column| Self::sampled_all(rows, column, |v| matches!(v, Value::Date(_))))
        })
    }

    pub fn numeric_columns(rows: &[Row]) -> Vec<String> {
        Self::columns(rows)
            .into_iter()
            .filter(|column| Self::sampled_all(rows, column, Value::is_numeric))
            .collect()
    }

    pub fn numeric_column(rows: &[Row]) -> Option<String> {
        Self::numeric_columns(rows).into_iter().next()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub description: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Vec<Row>,
    pub row_count: usize,
    pub execution_log: Vec<ExecutionLogEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    fn succeeded(
        data: Vec<Row>,
        execution_log: Vec<ExecutionLogEntry>,
        insights: Vec<String>,
        complexity: Complexity,
    ) -> Self {
        Self {
            success: true,
            row_count: data.len(),
            data,
            execution_log,
            insights,
            complexity: Some(complexity),
            error: None,
        }
    }

    fn failed(
        error: &AnalyticsError,
        data: Vec<Row>,
        execution_log: Vec<ExecutionLogEntry>,
    ) -> Self {
        Self {
            success: false,
            row_count: data.len(),
            data,
            execution_log,
            insights: Vec::new(),
            complexity: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Clarification { intent: Intent, question: String },
    Executed { plan: ExecutionPlan, result: ExecutionResult },
}

#[derive(Debug, Clone)]
struct RowGroup {
    key: Row,
    rows: Vec<Row>,
}

#[derive(Debug, Clone)]
enum WorkingSet {
    Rows(Vec<Row>),
    Groups(Vec<RowGroup>),
}

impl WorkingSet {
    /// Rows as a caller would see them; un-aggregated groups collapse to
    /// their key plus a row count.
    fn output_rows(&self) -> Vec<Row> {
        match self {
            WorkingSet::Rows(rows) => rows.clone(),
            WorkingSet::Groups(groups) => groups
                .iter()
                .map(|group| {
                    let mut row = group.key.clone();
                    row.insert(COUNT_COLUMN, Value::Integer(group.rows.len() as i64));
                    row
                })
                .collect(),
        }
    }

    /// Runs `apply` over each partition: the whole row set, or every group's
    /// own rows with the group key written onto each output row.
    fn map_partitions(&self, mut apply: impl FnMut(&[Row]) -> Vec<Row>) -> Vec<Row> {
        match self {
            WorkingSet::Rows(rows) => apply(rows),
            WorkingSet::Groups(groups) => groups
                .iter()
                .flat_map(|group| {
                    let mut rows = apply(&group.rows);
                    for row in rows.iter_mut() {
                        for (column, value) in group.key.iter() {
                            row.insert(column, value.clone());
                        }
                    }
                    rows
                })
                .collect(),
        }
    }

    fn sample_rows(&self) -> Vec<Row> {
        match self {
            WorkingSet::Rows(rows) => rows
                .iter()
                .take(ColumnHeuristics::SAMPLE_ROWS)
                .cloned()
                .collect(),
            WorkingSet::Groups(groups) => groups
                .iter()
                .flat_map(|group| group.rows.iter())
                .take(ColumnHeuristics::SAMPLE_ROWS)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct ExecutionState {
    working: WorkingSet,
    metric_columns: Vec<String>,
    window_column: Option<String>,
}

impl ExecutionState {
    fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self {
            working: WorkingSet::Rows(rows),
            metric_columns: self.metric_columns.clone(),
            window_column: self.window_column.clone(),
        }
    }

    /// `column` itself when present, else an aggregate metric computed from
    /// it (`avg_rating` for `rating`).
    fn locate(&self, rows: &[Row], column: &str) -> Option<String> {
        let first = rows.first()?;
        if first.contains(column) {
            return Some(column.to_string());
        }
        let suffix = format!("_{column}");
        self.metric_columns
            .iter()
            .find(|metric| metric.ends_with(&suffix) && first.contains(metric))
            .cloned()
    }

    /// The planner's column when given (it must exist), otherwise the
    /// heuristic's pick. `Ok(None)` only for an empty row set.
    fn resolve(
        &self,
        rows: &[Row],
        explicit: Option<&str>,
        step: &'static str,
        heuristic: impl Fn(&[Row]) -> Option<String>,
        missing: AnalyticsError,
    ) -> Result<Option<String>, AnalyticsError> {
        if rows.is_empty() {
            return Ok(explicit.map(str::to_string));
        }
        match explicit {
            Some(column) => self
                .locate(rows, column)
                .map(Some)
                .ok_or_else(|| AnalyticsError::MissingColumn {
                    column: column.to_string(),
                    step,
                }),
            None => heuristic(rows).map(Some).ok_or(missing),
        }
    }
}

fn require_columns<'a>(
    rows: &[Row],
    columns: impl IntoIterator<Item = &'a String>,
    step: &'static str,
) -> Result<(), AnalyticsError> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    for column in columns {
        if !first.contains(column) {
            return Err(AnalyticsError::MissingColumn {
                column: column.clone(),
                step,
            });
        }
    }
    Ok(())
}

struct ResolvedAggregation {
    function: AggregateFunction,
    column: Option<String>,
    paired_with: Option<String>,
    name: String,
}

impl ResolvedAggregation {
    fn compute(&self, rows: &[Row]) -> Value {
        let values = self
            .column
            .as_deref()
            .map(|column| stats::column_numbers(rows, column))
            .unwrap_or_default();
        match self.function {
            AggregateFunction::Count => Value::Integer(rows.len() as i64),
            AggregateFunction::Sum => Value::Float(stats::sum(&values)),
            AggregateFunction::Avg => stats::mean(&values).into(),
            AggregateFunction::Max => stats::max(&values).into(),
            AggregateFunction::Min => stats::min(&values).into(),
            AggregateFunction::Median => stats::median(&values).into(),
            AggregateFunction::Mode => stats::mode(&values).into(),
            AggregateFunction::Stdev => (!values.is_empty())
                .then(|| stats::standard_deviation(&values, false))
                .into(),
            AggregateFunction::Variance => (!values.is_empty())
                .then(|| stats::variance(&values, false))
                .into(),
            AggregateFunction::Correlation | AggregateFunction::Covariance => {
                let (Some(x_column), Some(y_column)) = (&self.column, &self.paired_with) else {
                    return Value::Null;
                };
                let (x, y): (Vec<f64>, Vec<f64>) = rows
                    .iter()
                    .filter_map(|row| {
                        Some((row.value(x_column).as_f64()?, row.value(y_column).as_f64()?))
                    })
                    .unzip();
                if self.function == AggregateFunction::Correlation {
                    stats::correlation(&x, &y).into()
                } else {
                    stats::covariance(&x, &y, false).into()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    options: EngineOptions,
}

impl AnalyticsEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn parse_intent(&self, question: &str, schema: &Schema) -> Intent {
        parse_query_intent_with_threshold(question, schema, self.options.match_threshold)
    }

    /// Parses, merges the session's context, then either asks for
    /// clarification or plans and executes. The turn is recorded either way.
    pub fn analyze_query(
        &self,
        session: &mut SessionState,
        question: &str,
        schema: &Schema,
        dataset: &[Row],
        db_type: &str,
    ) -> AnalysisOutcome {
        let parsed = self.parse_intent(question, schema);
        let intent = merge_conversation_context(parsed, session.previous_intent());

        if intent.clarification_needed {
            info!("Question needs clarification: {question}");
            let prompt = intent
                .clarification_question
                .clone()
                .unwrap_or_else(|| CLARIFICATION_PROMPT.to_string());
            session.record(
                ConversationTurn {
                    question: question.to_string(),
                    intent: intent.clone(),
                    success: false,
                    row_count: 0,
                },
                self.options.history_limit,
            );
            return AnalysisOutcome::Clarification {
                intent,
                question: prompt,
            };
        }

        let plan = create_execution_plan(&intent, db_type);
        let result = self.execute_analytics(dataset, &plan);
        session.record(
            ConversationTurn {
                question: question.to_string(),
                intent,
                success: result.success,
                row_count: result.row_count,
            },
            self.options.history_limit,
        );
        AnalysisOutcome::Executed { plan, result }
    }

    pub fn execute_analytics(&self, dataset: &[Row], plan: &ExecutionPlan) -> ExecutionResult {
        if dataset.is_empty() {
            let error = AnalyticsError::EmptyDataset;
            warn!("{error}");
            return ExecutionResult::failed(&error, Vec::new(), Vec::new());
        }
        info!(
            "Executing {} step(s) over {} row(s) ({} plan for {})",
            plan.steps.len(),
            dataset.len(),
            plan.complexity,
            plan.db_type
        );

        let cleaned = clean_dataset(dataset, &self.options.clean);
        let mut log = vec![ExecutionLogEntry {
            description: cleaned.report.describe(),
            row_count: cleaned.rows.len(),
        }];
        let mut state = ExecutionState {
            working: WorkingSet::Rows(cleaned.rows),
            metric_columns: Vec::new(),
            window_column: None,
        };

        for step in &plan.steps {
            debug!("Running step: {}", step.description);
            match self.run_step(&step.config, &state) {
                Ok(next) => {
                    state = next;
                    let row_count = match &state.working {
                        WorkingSet::Rows(rows) => rows.len(),
                        WorkingSet::Groups(groups) => groups.len(),
                    };
                    debug!("Step produced {row_count} row(s)");
                    log.push(ExecutionLogEntry {
                        description: step.description.clone(),
                        row_count,
                    });
                }
                Err(error) => {
                    warn!("Step '{}' failed: {error}", step.description);
                    return ExecutionResult::failed(&error, state.working.output_rows(), log);
                }
            }
        }

        let rows = state.working.output_rows();
        let insights = generate_insights(&rows, &plan.intent, self.options.outlier_multiplier);
        info!("Execution finished with {} row(s)", rows.len());
        ExecutionResult::succeeded(rows, log, insights, plan.complexity)
    }

    fn run_step(
        &self,
        config: &StepConfig,
        state: &ExecutionState,
    ) -> Result<ExecutionState, AnalyticsError> {
        match config {
            StepConfig::Select { columns } => {
                let rows = state.working.output_rows();
                require_columns(&rows, columns, "select")?;
                Ok(state.with_rows(rows.iter().map(|row| row.project(columns)).collect()))
            }
            StepConfig::Filter {
                conditions,
                semantic,
            } => self.filter(state, conditions, semantic.as_ref()),
            StepConfig::Group { columns, time } => self.group(state, columns, time.as_ref()),
            StepConfig::Aggregate { aggregations } => self.aggregate(state, aggregations),
            StepConfig::Window {
                request,
                order_by,
                direction,
            } => self.window(state, request, order_by.as_deref(), *direction),
            StepConfig::Statistical { filter } => self.percentile_slice(state, filter),
            StepConfig::Order { column, direction } => {
                self.order(state, column.as_deref(), *direction)
            }
            StepConfig::Limit { count } => {
                let mut rows = state.working.output_rows();
                rows.truncate(*count);
                Ok(state.with_rows(rows))
            }
        }
    }

    fn filter(
        &self,
        state: &ExecutionState,
        conditions: &[FilterCondition],
        semantic: Option<&SemanticFilter>,
    ) -> Result<ExecutionState, AnalyticsError> {
        let rows = state.working.output_rows();
        require_columns(&rows, conditions.iter().map(|c| &c.column), "filter")?;
        let mut conditions = conditions.to_vec();
        if let Some(semantic) = semantic
            && let Some(column) = state.resolve(
                &rows,
                semantic.column.as_deref(),
                "filter",
                ColumnHeuristics::rating_column,
                AnalyticsError::NoRatingColumn,
            )?
        {
            conditions.push(FilterCondition::new(
                column,
                semantic.operator,
                Value::Float(semantic.threshold),
            ));
        }
        let kept = rows
            .into_iter()
            .filter(|row| evaluate_conditions(&conditions, row))
            .collect();
        Ok(state.with_rows(kept))
    }

    fn group(
        &self,
        state: &ExecutionState,
        columns: &[String],
        time: Option<&TimeAnalysis>,
    ) -> Result<ExecutionState, AnalyticsError> {
        let rows = state.working.output_rows();
        require_columns(&rows, columns, "group")?;
        let time_column = match time {
            Some(time) => state
                .resolve(
                    &rows,
                    time.column.as_deref(),
                    "time grouping",
                    ColumnHeuristics::date_column,
                    AnalyticsError::NoDateColumn,
                )?
                .map(|column| (column, time.interval)),
            None => None,
        };

        let mut buckets: BTreeMap<Vec<String>, RowGroup> = BTreeMap::new();
        for row in rows {
            let mut key = Vec::with_capacity(columns.len() + 1);
            let mut key_row = Row::with_capacity(columns.len() + 1);
            if let Some((column, interval)) = &time_column {
                let bucket = bucket_key_for(row.value(column), *interval);
                key.push(bucket.clone());
                key_row.insert(PERIOD_COLUMN, Value::Text(bucket));
            }
            for column in columns {
                let value = row.value(column);
                key.push(value.as_display());
                key_row.insert(column.as_str(), value.clone());
            }
            buckets
                .entry(key)
                .or_insert_with(|| RowGroup {
                    key: key_row,
                    rows: Vec::new(),
                })
                .rows
                .push(row);
        }

        Ok(ExecutionState {
            working: WorkingSet::Groups(buckets.into_values().collect()),
            metric_columns: state.metric_columns.clone(),
            window_column: state.window_column.clone(),
        })
    }

    fn resolve_aggregation(
        &self,
        state: &ExecutionState,
        sample: &[Row],
        aggregation: &Aggregation,
    ) -> Result<ResolvedAggregation, AnalyticsError> {
        let function = aggregation.function;
        if function == AggregateFunction::Count {
            return Ok(ResolvedAggregation {
                function,
                column: None,
                paired_with: None,
                name: COUNT_COLUMN.to_string(),
            });
        }

        if function.is_pairwise() {
            let numeric = ColumnHeuristics::numeric_columns(sample);
            let explicit = |column: &str| {
                state.resolve(
                    sample,
                    Some(column),
                    "aggregate",
                    |_| None,
                    AnalyticsError::NoNumericColumn("aggregation"),
                )
            };
            let column = match aggregation.column.as_deref() {
                Some(column) => explicit(column)?,
                None => numeric.first().cloned(),
            };
            let paired_with = match aggregation.paired_with.as_deref() {
                Some(other) => explicit(other)?,
                None => numeric
                    .iter()
                    .find(|candidate| Some(*candidate) != column.as_ref())
                    .cloned(),
            };
            let (Some(column), Some(paired_with)) = (column, paired_with) else {
                if sample.is_empty() {
                    return Ok(ResolvedAggregation {
                        function,
                        column: None,
                        paired_with: None,
                        name: function.label(),
                    });
                }
                return Err(AnalyticsError::MissingPair {
                    function: function.to_string(),
                });
            };
            return Ok(ResolvedAggregation {
                function,
                name: format!("{}_{column}_{paired_with}", function.label()),
                column: Some(column),
                paired_with: Some(paired_with),
            });
        }

        let column = state.resolve(
            sample,
            aggregation.column.as_deref(),
            "aggregate",
            ColumnHeuristics::numeric_column,
            AnalyticsError::NoNumericColumn("aggregation"),
        )?;
        let name = match &column {
            Some(column) => format!("{}_{column}", function.label()),
            None => function.label(),
        };
        Ok(ResolvedAggregation {
            function,
            column,
            paired_with: None,
            name,
        })
    }

    fn aggregate(
        &self,
        state: &ExecutionState,
        aggregations: &[Aggregation],
    ) -> Result<ExecutionState, AnalyticsError> {
        let sample = state.working.sample_rows();
        let resolved = aggregations
            .iter()
            .map(|aggregation| self.resolve_aggregation(state, &sample, aggregation))
            .collect::<Result<Vec<_>, _>>()?;

        let summarise = |key: Row, rows: &[Row]| {
            let mut output = key;
            for aggregation in &resolved {
                output.insert(aggregation.name.as_str(), aggregation.compute(rows));
            }
            output
        };
        let rows = match &state.working {
            WorkingSet::Rows(rows) => vec![summarise(Row::new(), rows.as_slice())],
            WorkingSet::Groups(groups) => groups
                .iter()
                .map(|group| summarise(group.key.clone(), group.rows.as_slice()))
                .collect(),
        };

        Ok(ExecutionState {
            working: WorkingSet::Rows(rows),
            metric_columns: resolved.iter().map(|r| r.name.clone()).collect(),
            window_column: state.window_column.clone(),
        })
    }

    fn window(
        &self,
        state: &ExecutionState,
        request: &WindowRequest,
        order_by: Option<&str>,
        direction: SortDirection,
    ) -> Result<ExecutionState, AnalyticsError> {
        // Un-aggregated groups are window partitions.
        let rows = match &state.working {
            WorkingSet::Rows(rows) => rows.clone(),
            WorkingSet::Groups(_) => state.working.sample_rows(),
        };
        let Some(column) = state.resolve(
            &rows,
            request.column.as_deref(),
            "window",
            ColumnHeuristics::numeric_column,
            AnalyticsError::NoNumericColumn("window function"),
        )?
        else {
            return Ok(state.with_rows(rows));
        };
        let order_column = match order_by {
            Some(order_by) => state.resolve(
                &rows,
                Some(order_by),
                "window",
                |_| None,
                AnalyticsError::NoDateColumn,
            )?,
            None => None,
        };
        let order = order_column
            .as_deref()
            .map(|order_by| WindowOrder::new(order_by, direction));

        let output = state.working.map_partitions(|rows| {
            self.apply_window(rows, request.function, &column, order, direction)
        });

        Ok(ExecutionState {
            working: WorkingSet::Rows(output),
            metric_columns: state.metric_columns.clone(),
            window_column: Some(column),
        })
    }

    fn apply_window(
        &self,
        rows: &[Row],
        function: WindowFunction,
        column: &str,
        order: Option<WindowOrder<'_>>,
        direction: SortDirection,
    ) -> Vec<Row> {
        match function {
            WindowFunction::Rank => window::rank(rows, column, direction),
            WindowFunction::DenseRank => window::dense_rank(rows, column, direction),
            WindowFunction::RowNumber => window::row_number(rows, column, direction),
            WindowFunction::PercentRank => window::percent_rank(rows, column, direction),
            WindowFunction::Percentile => {
                let mut ranked = window::percent_rank(rows, column, SortDirection::Asc);
                for row in ranked.iter_mut() {
                    let percentile = row
                        .value(window::PERCENT_RANK_COLUMN)
                        .as_f64()
                        .map(|rank| rank * 100.0);
                    row.insert(PERCENTILE_COLUMN, percentile.into());
                }
                ranked
            }
            WindowFunction::RunningTotal => window::running_total(rows, column, order),
            WindowFunction::RunningAvg => window::running_average(rows, column, order),
            WindowFunction::RollingAvg => {
                let base = match order {
                    Some(order) => window::sort_rows(rows, order.column, order.direction),
                    None => rows.to_vec(),
                };
                window::rolling_average(&base, column, self.options.rolling_window)
            }
            WindowFunction::Lag => {
                window::lag(rows, column, self.options.lag_offset, &Value::Null, order)
            }
            WindowFunction::Lead => {
                window::lead(rows, column, self.options.lag_offset, &Value::Null, order)
            }
            WindowFunction::Ntile => {
                let sorted = window::sort_rows(rows, column, direction);
                window::ntile(&sorted, self.options.ntile_buckets)
            }
        }
    }

    fn percentile_slice(
        &self,
        state: &ExecutionState,
        filter: &PercentileFilter,
    ) -> Result<ExecutionState, AnalyticsError> {
        let rows = match &state.working {
            WorkingSet::Rows(rows) => rows.clone(),
            WorkingSet::Groups(_) => state.working.sample_rows(),
        };
        let Some(column) = state.resolve(
            &rows,
            filter.column.as_deref(),
            "percentile filter",
            ColumnHeuristics::numeric_column,
            AnalyticsError::NoNumericColumn("percentile filter"),
        )?
        else {
            return Ok(state.with_rows(rows));
        };
        let sliced = state.working.map_partitions(|rows| {
            stats::filter_by_percentile(rows, &column, filter.percent, filter.side)
        });
        debug!(
            "Kept {} row(s) in the {} {}% of {column}",
            sliced.len(),
            match filter.side {
                PercentileSide::Top => "top",
                PercentileSide::Bottom => "bottom",
            },
            filter.percent
        );
        Ok(state.with_rows(sliced))
    }

    fn order(
        &self,
        state: &ExecutionState,
        column: Option<&str>,
        direction: SortDirection,
    ) -> Result<ExecutionState, AnalyticsError> {
        let rows = state.working.output_rows();
        let fallback = |rows: &[Row]| {
            state
                .metric_columns
                .iter()
                .chain(state.window_column.iter())
                .find(|candidate| rows.first().is_some_and(|row| row.contains(candidate)))
                .cloned()
                .or_else(|| ColumnHeuristics::numeric_column(rows))
        };
        let Some(column) = state.resolve(
            &rows,
            column,
            "order",
            fallback,
            AnalyticsError::NoNumericColumn("ordering"),
        )?
        else {
            return Ok(state.with_rows(rows));
        };
        Ok(state.with_rows(window::sort_rows(&rows, &column, direction)))
    }
}
