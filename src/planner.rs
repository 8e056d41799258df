//! Question → [`Intent`] → [`ExecutionPlan`].
//!
//! Responsibilities:
//! - Scan the question against ordered keyword tables (window functions,
//!   aggregations, time phrases, sentiment terms); the first entry that
//!   matches wins, so table order is significant.
//! - Resolve every column mention through the semantic matcher.
//! - Assign column roles (aggregation target, time column, window column).
//! - Emit one described step per requested operation, sorted by priority.

use std::sync::LazyLock;

use itertools::Itertools;
use log::debug;
use regex::Regex;

use crate::{
    clean::ColumnKind,
    data::{Value, format_number},
    filter::{ComparisonOperator, FilterCondition},
    grouping::TimeInterval,
    intent::{
        AggregateFunction, Aggregation, Intent, PercentileFilter, SemanticFilter, TimeAnalysis,
        WindowFunction, WindowRequest,
    },
    engine::PERIOD_COLUMN,
    matcher::{
        self, ColumnReference, DEFAULT_MATCH_THRESHOLD, MatchKind, contains_phrase,
        extract_column_references_with_threshold, find_best_column_match, infer_sentiment_filter,
        is_stop_word, phrase_text,
    },
    plan::{Complexity, ExecutionPlan, Step, StepConfig},
    schema::Schema,
    stats::PercentileSide,
    window::SortDirection,
};

pub const CLARIFICATION_PROMPT: &str = "Which columns or metrics would you like to analyze? \
     Mention a column name or a calculation such as average, total or count.";

const WINDOW_KEYWORDS: &[(&str, WindowFunction)] = &[
    ("dense rank", WindowFunction::DenseRank),
    ("dense_rank", WindowFunction::DenseRank),
    ("row number", WindowFunction::RowNumber),
    ("row_number", WindowFunction::RowNumber),
    ("running total", WindowFunction::RunningTotal),
    ("running sum", WindowFunction::RunningTotal),
    ("cumulative total", WindowFunction::RunningTotal),
    ("cumulative sum", WindowFunction::RunningTotal),
    ("running average", WindowFunction::RunningAvg),
    ("running avg", WindowFunction::RunningAvg),
    ("cumulative average", WindowFunction::RunningAvg),
    ("rolling average", WindowFunction::RollingAvg),
    ("rolling avg", WindowFunction::RollingAvg),
    ("moving average", WindowFunction::RollingAvg),
    ("moving avg", WindowFunction::RollingAvg),
    ("percent rank", WindowFunction::PercentRank),
    ("percent_rank", WindowFunction::PercentRank),
    ("percentile rank", WindowFunction::PercentRank),
    ("previous", WindowFunction::Lag),
    ("lag", WindowFunction::Lag),
    ("lead", WindowFunction::Lead),
    ("ntile", WindowFunction::Ntile),
    ("quartiles", WindowFunction::Ntile),
    ("deciles", WindowFunction::Ntile),
    ("buckets", WindowFunction::Ntile),
    ("percentile", WindowFunction::Percentile),
    ("ranking", WindowFunction::Rank),
    ("ranked", WindowFunction::Rank),
    ("rank", WindowFunction::Rank),
];

const AGGREGATION_KEYWORDS: &[(AggregateFunction, &[&str])] = &[
    (AggregateFunction::Avg, &["average", "avg", "mean"]),
    (AggregateFunction::Sum, &["sum", "total"]),
    (AggregateFunction::Count, &["count", "how many", "number of"]),
    (
        AggregateFunction::Max,
        &["maximum", "max", "highest", "largest"],
    ),
    (
        AggregateFunction::Min,
        &["minimum", "min", "lowest", "smallest"],
    ),
    (AggregateFunction::Median, &["median"]),
    (
        AggregateFunction::Mode,
        &["mode", "most common", "most frequent"],
    ),
    (
        AggregateFunction::Stdev,
        &["standard deviation", "std dev", "stdev", "stddev", "std"],
    ),
    (AggregateFunction::Variance, &["variance"]),
    (
        AggregateFunction::Correlation,
        &["correlation", "correlate", "correlated"],
    ),
    (AggregateFunction::Covariance, &["covariance"]),
];

const TIME_PHRASES: &[(&str, TimeInterval)] = &[
    ("daily", TimeInterval::Day),
    ("per day", TimeInterval::Day),
    ("by day", TimeInterval::Day),
    ("each day", TimeInterval::Day),
    ("every day", TimeInterval::Day),
    ("by date", TimeInterval::Day),
    ("per date", TimeInterval::Day),
    ("day over day", TimeInterval::Day),
    ("weekly", TimeInterval::Week),
    ("per week", TimeInterval::Week),
    ("by week", TimeInterval::Week),
    ("each week", TimeInterval::Week),
    ("week over week", TimeInterval::Week),
    ("monthly", TimeInterval::Month),
    ("per month", TimeInterval::Month),
    ("by month", TimeInterval::Month),
    ("each month", TimeInterval::Month),
    ("month over month", TimeInterval::Month),
    ("quarterly", TimeInterval::Quarter),
    ("per quarter", TimeInterval::Quarter),
    ("by quarter", TimeInterval::Quarter),
    ("each quarter", TimeInterval::Quarter),
    ("yearly", TimeInterval::Year),
    ("annually", TimeInterval::Year),
    ("annual", TimeInterval::Year),
    ("per year", TimeInterval::Year),
    ("by year", TimeInterval::Year),
    ("each year", TimeInterval::Year),
    ("year over year", TimeInterval::Year),
    ("over time", TimeInterval::Month),
];

const TIME_UNITS: &[&str] = &[
    "day", "days", "daily", "week", "weeks", "weekly", "month", "months", "monthly", "quarter",
    "quarters", "quarterly", "year", "years", "yearly", "annual", "date", "time",
];

const SORT_VERBS: &[&str] = &["sort", "sorted", "order", "ordered", "rank", "ranked", "ranking"];

const ASCENDING_PHRASES: &[&str] = &[
    "ascending", "asc", "lowest first", "smallest first", "increasing order", "oldest first",
];
const DESCENDING_PHRASES: &[&str] = &[
    "descending", "desc", "highest first", "largest first", "decreasing order", "newest first",
    "most recent first",
];

const DATE_NAME_HINTS: &[&str] = &["date", "time", "created", "updated", "timestamp"];

/// Words allowed between an aggregation keyword and the column it names.
const TARGET_FILLERS: &[&str] = &["of", "the", "a", "an", "all"];

static PERCENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(top|bottom|highest|lowest|upper|lower)\s+(\d+(?:\.\d+)?)\s*(?:%|percent\b|pct\b)")
        .expect("valid percent regex")
});
static LIMIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(top|bottom|first|last|best|worst|highest|lowest)\s+(\d+)\b")
        .expect("valid limit regex")
});
static LIMIT_KEYWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\blimit\s+(?:to\s+)?(\d+)\b").expect("valid limit keyword regex")
});
static SORT_BY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:sort|sorted|order|ordered)\s+by\s+(?:the\s+)?([a-z0-9_]+)")
        .expect("valid sort regex")
});
static GROUP_BY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(group(?:ed)?\s+by|for\s+each|per|by)\s+(?:the\s+)?([a-z0-9_]+)")
        .expect("valid group regex")
});
static COMPARISON_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([a-z_][a-z0-9_]*)(?:\s+is)?\s*(>=|<=|!=|=|>|<|greater\s+than|more\s+than|higher\s+than|less\s+than|fewer\s+than|lower\s+than|above|over|below|under|at\s+least|at\s+most|equals|equal\s+to)\s*(-?\d+(?:\.\d+)?)\b",
    )
    .expect("valid comparison regex")
});

pub fn parse_query_intent(question: &str, schema: &Schema) -> Intent {
    parse_query_intent_with_threshold(question, schema, DEFAULT_MATCH_THRESHOLD)
}

pub fn parse_query_intent_with_threshold(
    question: &str,
    schema: &Schema,
    threshold: f64,
) -> Intent {
    let columns = schema.flat_columns();
    let lowered = question.to_lowercase();
    let mut intent = Intent::new(question);
    intent.columns = extract_column_references_with_threshold(question, &columns, threshold);

    // Percent slices first so "top 10%" is not also read as "top 10".
    let mut scan = lowered.clone();
    if let Some(caps) = PERCENT_PATTERN.captures(&lowered)
        && let Ok(percent) = caps[2].parse::<f64>()
    {
        let side = match &caps[1] {
            "bottom" | "lowest" | "lower" => PercentileSide::Bottom,
            _ => PercentileSide::Top,
        };
        intent.percentile_filter = Some(PercentileFilter {
            percent,
            side,
            column: None,
        });
        scan = PERCENT_PATTERN.replace_all(&lowered, " ").into_owned();
    }

    detect_limit(&scan, &mut intent);

    let mut padded = phrase_text(&scan);
    if let Some((phrase, function)) = WINDOW_KEYWORDS
        .iter()
        .find(|(phrase, _)| contains_phrase(&padded, phrase))
    {
        intent.window_function = Some(WindowRequest {
            function: *function,
            column: None,
        });
        padded = padded.replacen(&format!(" {phrase} "), " ", 1);
    }

    let ranking = intent.limit.is_some()
        || intent
            .window_function
            .as_ref()
            .is_some_and(|window| window.function.ranks_values());
    intent.aggregations = AGGREGATION_KEYWORDS
        .iter()
        .filter(|(function, _)| {
            // Superlatives next to "top N" describe ordering, not MAX/MIN.
            !(ranking && matches!(function, AggregateFunction::Max | AggregateFunction::Min))
        })
        .filter(|(_, phrases)| phrases.iter().any(|p| contains_phrase(&padded, p)))
        .map(|(function, phrases)| {
            let mut aggregation = Aggregation::new(*function);
            if *function != AggregateFunction::Count {
                aggregation.column = column_after_phrase(&padded, phrases, &intent.columns);
            }
            aggregation
        })
        .collect();

    if let Some((_, interval)) = TIME_PHRASES
        .iter()
        .find(|(phrase, _)| contains_phrase(&padded, phrase))
    {
        intent.time_analysis = Some(TimeAnalysis {
            interval: *interval,
            column: resolve_time_column(&intent, schema),
        });
    }

    detect_direction(&padded, &mut intent);
    detect_sort_column(&scan, &columns, threshold, &mut intent);
    detect_group_by(&scan, &columns, threshold, &mut intent);
    intent.filters = detect_comparisons(&scan, &columns, threshold);

    if let Some(cue) = infer_sentiment_filter(question) {
        let matched = find_best_column_match(&cue.term, &columns, threshold);
        intent.semantic_filter = Some(SemanticFilter {
            operator: cue.sentiment.operator(),
            threshold: cue.sentiment.threshold(),
            term: cue.term,
            sentiment: cue.sentiment,
            column: matched.column,
        });
    }

    group_ranked_aggregates(&mut intent, schema);
    assign_column_roles(&mut intent);
    refresh_clarification(&mut intent);
    debug!(
        "Parsed intent: {} column(s), {} aggregation(s), window {:?}, clarification {}",
        intent.columns.len(),
        intent.aggregations.len(),
        intent.window_function.as_ref().map(|w| w.function),
        intent.clarification_needed
    );
    intent
}

fn detect_limit(scan: &str, intent: &mut Intent) {
    if let Some(caps) = LIMIT_PATTERN.captures(scan)
        && let Ok(count) = caps[2].parse::<usize>()
    {
        intent.limit = Some(count);
        intent.order = match &caps[1] {
            "top" | "best" | "highest" => Some(SortDirection::Desc),
            "bottom" | "worst" | "lowest" => Some(SortDirection::Asc),
            _ => None,
        };
    }
    if intent.limit.is_none()
        && let Some(caps) = LIMIT_KEYWORD_PATTERN.captures(scan)
    {
        intent.limit = caps[1].parse::<usize>().ok();
    }
}

fn detect_direction(padded: &str, intent: &mut Intent) {
    if ASCENDING_PHRASES.iter().any(|p| contains_phrase(padded, p)) {
        intent.order = Some(SortDirection::Asc);
    } else if DESCENDING_PHRASES.iter().any(|p| contains_phrase(padded, p)) {
        intent.order = Some(SortDirection::Desc);
    }
}

fn detect_sort_column(scan: &str, columns: &[String], threshold: f64, intent: &mut Intent) {
    for caps in SORT_BY_PATTERN.captures_iter(scan) {
        let matched = find_best_column_match(&caps[1], columns, threshold);
        if let Some(column) = matched.column {
            intent.order_column = Some(column);
            intent.order.get_or_insert(SortDirection::Asc);
            return;
        }
    }
}

/// Whether the question orders its answer: a row limit, a percent slice or a
/// ranking window.
fn is_ranking(intent: &Intent) -> bool {
    intent.limit.is_some()
        || intent.percentile_filter.is_some()
        || intent
            .window_function
            .as_ref()
            .is_some_and(|window| window.function.ranks_values())
}

/// Column named right after one of `phrases`, as in "average rating" or
/// "mean of the score".
fn column_after_phrase(
    padded: &str,
    phrases: &[&str],
    references: &[ColumnReference],
) -> Option<String> {
    let words = padded.split_whitespace().collect::<Vec<_>>();
    for phrase in phrases {
        let phrase_words = phrase.split_whitespace().collect::<Vec<_>>();
        for start in 0..words.len() {
            if !words[start..].starts_with(&phrase_words) {
                continue;
            }
            let next = words[start + phrase_words.len()..]
                .iter()
                .find(|word| !TARGET_FILLERS.contains(*word));
            if let Some(next) = next
                && let Some(reference) = references.iter().find(|r| r.term == *next)
            {
                return Some(reference.column.clone());
            }
        }
    }
    None
}

/// "bottom 2 categories by average rating" ranks one aggregate per category:
/// a ranked aggregate groups by the other columns the question names
/// outright, unless they are numeric, dates or already have a role.
fn group_ranked_aggregates(intent: &mut Intent, schema: &Schema) {
    if !is_ranking(intent) || !intent.group_by.is_empty() {
        return;
    }
    let targets = intent
        .aggregations
        .iter()
        .flat_map(|aggregation| aggregation.column.iter().chain(aggregation.paired_with.iter()))
        .cloned()
        .collect::<Vec<_>>();
    if targets.is_empty() {
        return;
    }
    let subjects = intent
        .columns
        .iter()
        .filter(|reference| reference.kind == MatchKind::Exact)
        .map(|reference| reference.column.clone())
        .filter(|column| {
            !targets.contains(column)
                && intent.order_column.as_ref() != Some(column)
                && intent.time_column() != Some(column.as_str())
                && !intent.filters.iter().any(|condition| &condition.column == column)
                && !looks_like_date(column, schema)
                && !schema
                    .column(column)
                    .and_then(|descriptor| descriptor.declared_kind())
                    .is_some_and(|kind| kind.is_numeric())
        })
        .collect::<Vec<_>>();
    if !subjects.is_empty() {
        debug!("Grouping ranked aggregate by [{}]", subjects.join(", "));
        intent.group_by = subjects;
    }
}

fn detect_group_by(scan: &str, columns: &[String], threshold: f64, intent: &mut Intent) {
    let ranking = is_ranking(intent);
    for caps in GROUP_BY_PATTERN.captures_iter(scan) {
        let keyword = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let word = &caps[2];
        if TIME_UNITS.contains(&word) || is_stop_word(word) {
            continue;
        }
        let plain_by = keyword == "by";
        if plain_by {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let previous = scan[..start].split_whitespace().last().unwrap_or_default();
            if SORT_VERBS.contains(&previous) {
                continue;
            }
        }
        let Some(column) = find_best_column_match(word, columns, threshold).column else {
            continue;
        };
        if plain_by && ranking {
            // "top 5 products by rating" orders by rating rather than grouping.
            if intent.order_column.is_none() {
                intent.order_column = Some(column);
            }
            continue;
        }
        if !intent.group_by.contains(&column) {
            intent.group_by.push(column);
        }
    }
}

fn detect_comparisons(scan: &str, columns: &[String], threshold: f64) -> Vec<FilterCondition> {
    let mut conditions = Vec::new();
    for caps in COMPARISON_PATTERN.captures_iter(scan) {
        let Some(operator) = ComparisonOperator::from_phrase(&caps[2]) else {
            continue;
        };
        let Some(column) = find_best_column_match(&caps[1], columns, threshold).column else {
            continue;
        };
        let Ok(number) = caps[3].parse::<f64>() else {
            continue;
        };
        let value = if number.fract() == 0.0 && !caps[3].contains('.') {
            Value::Integer(number as i64)
        } else {
            Value::Float(number)
        };
        conditions.push(FilterCondition::new(column, operator, value));
    }
    conditions
}

fn looks_like_date(name: &str, schema: &Schema) -> bool {
    if schema
        .column(name)
        .and_then(|column| column.declared_kind())
        .is_some_and(|kind| kind == ColumnKind::Date)
    {
        return true;
    }
    let lowered = name.to_lowercase();
    DATE_NAME_HINTS.iter().any(|hint| lowered.contains(hint))
        || lowered.ends_with("_at")
        || lowered.ends_with("_on")
}

fn resolve_time_column(intent: &Intent, schema: &Schema) -> Option<String> {
    intent
        .columns
        .iter()
        .map(|reference| reference.column.clone())
        .chain(schema.flat_columns())
        .find(|column| looks_like_date(column, schema))
}

/// Fills unset column roles from the referenced columns, skipping those
/// already used for grouping, time bucketing or filtering.
fn assign_column_roles(intent: &mut Intent) {
    let mut reserved = intent.group_by.clone();
    if let Some(column) = intent.time_column() {
        reserved.push(column.to_string());
    }
    let unreserved = intent
        .column_names()
        .into_iter()
        .filter(|column| !reserved.contains(column))
        .collect::<Vec<_>>();
    let filter_columns = intent
        .filters
        .iter()
        .map(|condition| condition.column.clone())
        .chain(
            intent
                .semantic_filter
                .as_ref()
                .and_then(|semantic| semantic.column.clone()),
        )
        .collect::<Vec<_>>();
    let preferred = unreserved
        .iter()
        .filter(|column| !filter_columns.contains(column))
        .cloned()
        .collect::<Vec<_>>();
    let candidates = if preferred.is_empty() {
        unreserved
    } else {
        preferred
    };

    for aggregation in intent.aggregations.iter_mut() {
        if aggregation.function == AggregateFunction::Count {
            continue;
        }
        if aggregation.column.is_none() {
            aggregation.column = candidates.first().cloned();
        }
        if aggregation.function.is_pairwise() && aggregation.paired_with.is_none() {
            aggregation.paired_with = candidates
                .iter()
                .find(|candidate| aggregation.column.as_ref() != Some(*candidate))
                .cloned();
        }
    }

    // Windows and percent slices work on the aggregated metric when there is
    // one; ranking windows follow the "by <column>" ordering first.
    let metric = intent
        .aggregations
        .iter()
        .find_map(|aggregation| aggregation.column.clone());
    if let Some(window) = intent.window_function.as_mut()
        && window.column.is_none()
    {
        let ordered = window
            .function
            .ranks_values()
            .then(|| intent.order_column.clone())
            .flatten();
        window.column = ordered
            .or_else(|| metric.clone())
            .or_else(|| candidates.first().cloned());
    }
    if let Some(filter) = intent.percentile_filter.as_mut()
        && filter.column.is_none()
    {
        filter.column = intent
            .order_column
            .clone()
            .or(metric)
            .or_else(|| candidates.first().cloned());
    }
}

fn refresh_clarification(intent: &mut Intent) {
    intent.clarification_needed = intent.columns.is_empty() && intent.aggregations.is_empty();
    intent.clarification_question = intent
        .clarification_needed
        .then(|| CLARIFICATION_PROMPT.to_string());
}

/// Carries the previous turn's referenced columns over when this turn names
/// none, and independently its group-by columns when this turn groups by
/// nothing. Nothing else is inherited.
pub fn merge_conversation_context(current: Intent, previous: Option<&Intent>) -> Intent {
    let Some(previous) = previous else {
        return current;
    };
    let mut merged = current;
    if merged.columns.is_empty() && !previous.columns.is_empty() {
        merged.columns = previous.columns.clone();
        merged.inherited_context = true;
    }
    if merged.group_by.is_empty() && !previous.group_by.is_empty() {
        merged.group_by = previous.group_by.clone();
        merged.inherited_context = true;
    }
    if merged.inherited_context {
        assign_column_roles(&mut merged);
        refresh_clarification(&mut merged);
        debug!(
            "Inherited context from previous turn: columns [{}], group by [{}]",
            merged.column_names().join(", "),
            merged.group_by.join(", ")
        );
    }
    merged
}

/// Every column the plan names explicitly, or `None` when some role is left
/// to the execution-time heuristics (projection would hide the columns they
/// need).
fn projected_columns(intent: &Intent) -> Option<Vec<String>> {
    if intent.columns.is_empty() {
        return None;
    }
    let unresolved_aggregation = intent.aggregations.iter().any(|aggregation| {
        (aggregation.function != AggregateFunction::Count && aggregation.column.is_none())
            || (aggregation.function.is_pairwise() && aggregation.paired_with.is_none())
    });
    let unresolved_time = intent
        .time_analysis
        .as_ref()
        .is_some_and(|time| time.column.is_none());
    let unresolved_window = intent
        .window_function
        .as_ref()
        .is_some_and(|window| window.column.is_none());
    let unresolved_percentile = intent
        .percentile_filter
        .as_ref()
        .is_some_and(|filter| filter.column.is_none());
    let unresolved_semantic = intent
        .semantic_filter
        .as_ref()
        .is_some_and(|semantic| semantic.column.is_none());
    if unresolved_aggregation
        || unresolved_time
        || unresolved_window
        || unresolved_percentile
        || unresolved_semantic
    {
        return None;
    }

    let mut columns = intent.column_names();
    columns.extend(intent.group_by.iter().cloned());
    columns.extend(intent.time_column().map(str::to_string));
    columns.extend(intent.filters.iter().map(|c| c.column.clone()));
    columns.extend(
        intent
            .semantic_filter
            .as_ref()
            .and_then(|semantic| semantic.column.clone()),
    );
    for aggregation in &intent.aggregations {
        columns.extend(aggregation.column.iter().cloned());
        columns.extend(aggregation.paired_with.iter().cloned());
    }
    columns.extend(
        intent
            .window_function
            .as_ref()
            .and_then(|window| window.column.clone()),
    );
    columns.extend(
        intent
            .percentile_filter
            .as_ref()
            .and_then(|filter| filter.column.clone()),
    );
    columns.extend(intent.order_column.iter().cloned());
    Some(columns.into_iter().unique().collect())
}

/// A running total, rolling average or lag over time periods needs one value
/// per period: SUM for running totals, AVG otherwise.
fn series_aggregation(intent: &Intent) -> Option<Aggregation> {
    let request = intent.window_function.as_ref()?;
    if request.function.ranks_values() || intent.time_analysis.is_none() {
        return None;
    }
    let function = match request.function {
        WindowFunction::RunningTotal => AggregateFunction::Sum,
        _ => AggregateFunction::Avg,
    };
    Some(Aggregation {
        function,
        column: request.column.clone(),
        paired_with: None,
    })
}

pub fn build_operations_list(intent: &Intent) -> Vec<StepConfig> {
    let mut configs = Vec::new();

    if let Some(columns) = projected_columns(intent) {
        configs.push(StepConfig::Select { columns });
    }
    if !intent.filters.is_empty() || intent.semantic_filter.is_some() {
        configs.push(StepConfig::Filter {
            conditions: intent.filters.clone(),
            semantic: intent.semantic_filter.clone(),
        });
    }
    if intent.has_grouping() {
        configs.push(StepConfig::Group {
            columns: intent.group_by.clone(),
            time: intent.time_analysis.clone(),
        });
    }
    if !intent.aggregations.is_empty() {
        configs.push(StepConfig::Aggregate {
            aggregations: intent.aggregations.clone(),
        });
    } else if let Some(aggregation) = series_aggregation(intent) {
        configs.push(StepConfig::Aggregate {
            aggregations: vec![aggregation],
        });
    }
    if let Some(request) = &intent.window_function {
        let default_direction = if request.function.ranks_values() {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        // Time-grouped series run over the aggregated periods.
        let order_by = (!request.function.ranks_values() && intent.time_analysis.is_some())
            .then(|| PERIOD_COLUMN.to_string());
        configs.push(StepConfig::Window {
            request: request.clone(),
            order_by,
            direction: intent.order.unwrap_or(default_direction),
        });
    }
    if let Some(filter) = &intent.percentile_filter {
        configs.push(StepConfig::Statistical {
            filter: filter.clone(),
        });
    }
    if intent.order.is_some() || intent.order_column.is_some() {
        configs.push(StepConfig::Order {
            column: intent.order_column.clone(),
            direction: intent.order.unwrap_or(SortDirection::Desc),
        });
    }
    if let Some(count) = intent.limit {
        configs.push(StepConfig::Limit { count });
    }

    configs.sort_by_key(|config| config.operation().priority());
    configs
}

pub fn complexity_score(intent: &Intent) -> u32 {
    let mut score = 0;
    if !intent.aggregations.is_empty() {
        score += 1;
    }
    if !intent.group_by.is_empty() {
        score += 1;
    }
    if intent.window_function.is_some() {
        score += 2;
    }
    if intent.time_analysis.is_some() {
        score += 1;
    }
    if intent.percentile_filter.is_some() {
        score += 1;
    }
    if intent.semantic_filter.is_some() {
        score += 1;
    }
    score
}

pub fn describe_step(config: &StepConfig) -> String {
    match config {
        StepConfig::Select { columns } => {
            format!("Select columns: {}", matcher::column_list(columns))
        }
        StepConfig::Filter {
            conditions,
            semantic,
        } => {
            let parts = conditions
                .iter()
                .map(FilterCondition::describe)
                .chain(semantic.iter().map(SemanticFilter::describe))
                .join(" and ");
            format!("Filter rows where {parts}")
        }
        StepConfig::Group { columns, time } => {
            let mut parts = Vec::new();
            if let Some(time) = time {
                parts.push(format!(
                    "{} of {}",
                    time.interval,
                    time.column.as_deref().unwrap_or("<date column>")
                ));
            }
            parts.extend(columns.iter().cloned());
            format!("Group by {}", parts.join(", "))
        }
        StepConfig::Aggregate { aggregations } => format!(
            "Compute {}",
            aggregations.iter().map(Aggregation::describe).join(", ")
        ),
        StepConfig::Window {
            request,
            direction,
            ..
        } => format!(
            "Apply {} over {} ({direction})",
            request.function,
            request.column.as_deref().unwrap_or("<numeric column>")
        ),
        StepConfig::Statistical { filter } => format!(
            "Keep {} {}% by {}",
            match filter.side {
                PercentileSide::Top => "top",
                PercentileSide::Bottom => "bottom",
            },
            format_number(filter.percent),
            filter.column.as_deref().unwrap_or("<numeric column>")
        ),
        StepConfig::Order { column, direction } => format!(
            "Order by {} {direction}",
            column.as_deref().unwrap_or("<primary metric>")
        ),
        StepConfig::Limit { count } => format!("Limit to {count} row(s)"),
    }
}

pub fn create_execution_plan(intent: &Intent, db_type: &str) -> ExecutionPlan {
    let steps = build_operations_list(intent)
        .into_iter()
        .map(|config| Step {
            description: describe_step(&config),
            config,
        })
        .collect::<Vec<_>>();
    let score = complexity_score(intent);
    let plan = ExecutionPlan {
        steps,
        intent: intent.clone(),
        complexity: Complexity::from_score(score),
        complexity_score: score,
        db_type: db_type.to_string(),
    };
    debug!(
        "Planned {} step(s) for {} ({}, score {})",
        plan.steps.len(),
        plan.db_type,
        plan.complexity,
        plan.complexity_score
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plan::Operation, schema::ColumnDescriptor};

    fn reviews() -> Schema {
        Schema::single_table("reviews", ["rating", "created_at", "category", "comment"])
    }

    #[test]
    fn window_table_is_first_match_only() {
        let intent = parse_query_intent("dense rank of rating", &reviews());
        let window = intent.window_function.expect("window");
        assert_eq!(window.function, WindowFunction::DenseRank);
        assert_eq!(window.column.as_deref(), Some("rating"));
    }

    #[test]
    fn running_total_phrase_does_not_trigger_sum() {
        let intent = parse_query_intent("running total of rating", &reviews());
        assert_eq!(
            intent.window_function.map(|w| w.function),
            Some(WindowFunction::RunningTotal)
        );
        assert!(intent.aggregations.is_empty());
    }

    #[test]
    fn top_percent_becomes_percentile_filter_not_limit() {
        let intent = parse_query_intent("top 10% of reviews by rating", &reviews());
        let filter = intent.percentile_filter.expect("percentile filter");
        assert_eq!(filter.percent, 10.0);
        assert_eq!(filter.side, PercentileSide::Top);
        assert_eq!(filter.column.as_deref(), Some("rating"));
        assert_eq!(intent.limit, None);
    }

    #[test]
    fn top_n_sets_limit_direction_and_order_column() {
        let intent = parse_query_intent("top 5 categories by rating", &reviews());
        assert_eq!(intent.limit, Some(5));
        assert_eq!(intent.order, Some(SortDirection::Desc));
        assert_eq!(intent.order_column.as_deref(), Some("rating"));
        assert!(intent.group_by.is_empty());
    }

    #[test]
    fn group_by_skips_time_units() {
        let intent = parse_query_intent("count of reviews per category by month", &reviews());
        assert_eq!(intent.group_by, vec!["category"]);
        let time = intent.time_analysis.expect("time analysis");
        assert_eq!(time.interval, TimeInterval::Month);
        assert_eq!(time.column.as_deref(), Some("created_at"));
    }

    #[test]
    fn comparison_phrases_become_filters() {
        let intent = parse_query_intent("average rating where rating is at least 3", &reviews());
        assert_eq!(intent.filters.len(), 1);
        assert_eq!(intent.filters[0].operator, ComparisonOperator::Ge);
        assert_eq!(intent.filters[0].value, Value::Integer(3));
    }

    #[test]
    fn harsh_reviews_attach_sentiment_filter() {
        let intent = parse_query_intent("show harsh reviews", &reviews());
        let semantic = intent.semantic_filter.expect("semantic filter");
        assert_eq!(semantic.column.as_deref(), Some("rating"));
        assert_eq!(semantic.operator, ComparisonOperator::Le);
        assert_eq!(semantic.threshold, 2.0);
    }

    #[test]
    fn unrelated_question_needs_clarification() {
        let intent = parse_query_intent("hello there", &reviews());
        assert!(intent.clarification_needed);
        assert_eq!(
            intent.clarification_question.as_deref(),
            Some(CLARIFICATION_PROMPT)
        );
    }

    #[test]
    fn merge_inherits_columns_only_when_missing() {
        let previous = parse_query_intent("average rating by category", &reviews());
        let follow_up = parse_query_intent("now the median", &reviews());
        let merged = merge_conversation_context(follow_up, Some(&previous));
        assert!(merged.inherited_context);
        assert_eq!(merged.column_names(), previous.column_names());
        assert_eq!(merged.group_by, vec!["category"]);
        assert_eq!(merged.aggregations[0].column.as_deref(), Some("rating"));
        assert!(!merged.clarification_needed);

        let explicit = parse_query_intent("average comment length", &reviews());
        let kept = merge_conversation_context(explicit, Some(&previous));
        assert_eq!(kept.column_names(), vec!["comment"]);
    }

    #[test]
    fn merge_inherits_grouping_on_its_own() {
        let previous = parse_query_intent("average rating by category", &reviews());
        let follow_up = parse_query_intent("median rating", &reviews());
        let merged = merge_conversation_context(follow_up, Some(&previous));
        assert_eq!(merged.group_by, vec!["category"]);
        assert_eq!(merged.column_names(), vec!["rating"]);
        assert!(merged.inherited_context);

        let regrouped = parse_query_intent("median rating per comment", &reviews());
        let kept = merge_conversation_context(regrouped, Some(&previous));
        assert_eq!(kept.group_by, vec!["comment"]);
        assert!(!kept.inherited_context);
    }

    #[test]
    fn aggregation_targets_the_column_after_its_keyword() {
        let intent = parse_query_intent("bottom 2 categories by average rating", &reviews());
        assert_eq!(intent.aggregations[0].column.as_deref(), Some("rating"));
        assert_eq!(intent.group_by, vec!["category"]);
        assert_eq!(intent.limit, Some(2));
        assert_eq!(intent.order, Some(SortDirection::Asc));

        let spelled_out = parse_query_intent("the mean of the rating per category", &reviews());
        assert_eq!(spelled_out.aggregations[0].column.as_deref(), Some("rating"));
    }

    #[test]
    fn declared_numeric_columns_are_not_ranked_groups() {
        let schema = Schema::single_table("reviews", ["rating", "category"]);
        let mut typed = schema.clone();
        typed.tables[0].columns[1] = ColumnDescriptor::typed("category", "integer");
        let intent = parse_query_intent("top 3 category by average rating", &typed);
        assert!(intent.group_by.is_empty());
        let intent = parse_query_intent("top 3 category by average rating", &schema);
        assert_eq!(intent.group_by, vec!["category"]);
    }

    #[test]
    fn ranking_window_orders_by_its_by_column() {
        let intent = parse_query_intent("rank reviews by rating", &reviews());
        assert!(intent.group_by.is_empty());
        assert_eq!(intent.order_column.as_deref(), Some("rating"));
        let window = intent.window_function.expect("window");
        assert_eq!(window.column.as_deref(), Some("rating"));
    }

    #[test]
    fn time_series_window_gets_a_period_aggregate() {
        let intent = parse_query_intent("rolling average rating by month", &reviews());
        assert!(intent.aggregations.is_empty());
        let configs = build_operations_list(&intent);
        let aggregate = configs.iter().find_map(|config| match config {
            StepConfig::Aggregate { aggregations } => Some(aggregations.clone()),
            _ => None,
        });
        assert_eq!(
            aggregate,
            Some(vec![Aggregation {
                function: AggregateFunction::Avg,
                column: Some("rating".to_string()),
                paired_with: None,
            }])
        );
        let order_by = configs.iter().find_map(|config| match config {
            StepConfig::Window { order_by, .. } => Some(order_by.clone()),
            _ => None,
        });
        assert_eq!(order_by, Some(Some(PERIOD_COLUMN.to_string())));
    }

    #[test]
    fn plan_scores_complexity() {
        let intent = parse_query_intent("rank categories by average rating per month", &reviews());
        let plan = create_execution_plan(&intent, "postgres");
        // window +2, aggregation +1, time +1
        assert!(plan.complexity_score >= 4);
        assert_eq!(plan.complexity, Complexity::Complex);
        let ops = plan.operations();
        let mut sorted = ops.clone();
        sorted.sort_by_key(Operation::priority);
        assert_eq!(ops, sorted);
    }
}
