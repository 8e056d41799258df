//! Column type inference and value normalization.
//!
//! [`clean_dataset()`] runs in two phases. The first samples up to
//! [`CleanOptions::sample_size`] non-null values per column and scores each
//! candidate type by the fraction of the sample its recognizer accepts. The
//! second rewrites every cell: null-like tokens become [`Value::Null`], text
//! is parsed into the detected type, and free text is normalized.
//!
//! Already-typed values are never rewritten, so cleaning a cleaned dataset
//! performs no further conversions.

use std::{collections::HashSet, fmt, sync::LazyLock};

use itertools::Itertools;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data::{Row, Value, parse_date_value};

pub const DEFAULT_SAMPLE_SIZE: usize = 100;

pub const DEFAULT_NULL_TOKENS: &[&str] = &[
    "", "null", "nil", "none", "n/a", "na", "nan", "-", "--", "#n/a", "undefined", "missing",
];

const DATE_THRESHOLD: f64 = 0.8;
const EMAIL_THRESHOLD: f64 = 0.8;
const URL_THRESHOLD: f64 = 0.8;
const BOOLEAN_THRESHOLD: f64 = 0.8;
const ID_THRESHOLD: f64 = 0.8;
const INTEGER_THRESHOLD: f64 = 0.8;
const NUMBER_THRESHOLD: f64 = 0.7;
const CATEGORY_UNIQUE_RATIO: f64 = 0.3;
const CATEGORY_MIN_SAMPLE: usize = 10;

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$",
        r"^\d{4}-\d{2}-\d{2}$",
        r"^\d{1,2}/\d{1,2}/\d{4}$",
        r"^\d{1,2}-\d{1,2}-\d{4}$",
        r"(?i)^[a-z]{3,9}\.?\s+\d{1,2},\s*\d{4}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid date pattern"))
    .collect()
});
static BOOLEAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(true|false|yes|no|1|0|y|n)$").expect("valid pattern"));
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid pattern"));
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^((https?|ftp)://[^\s/$.?#][^\s]*|www\.[^\s]+\.[^\s]+)$")
        .expect("valid pattern")
});
static OBJECT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-f]{24}$").expect("valid pattern"));
static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid pattern")
});
static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid pattern"));
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid pattern"));

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

const EMOJI_TOKENS: &[(&str, &str)] = &[
    ("😀", "[happy]"),
    ("😊", "[happy]"),
    ("🙂", "[happy]"),
    ("😢", "[sad]"),
    ("😞", "[sad]"),
    ("😡", "[angry]"),
    ("😠", "[angry]"),
    ("👍", "[thumbs_up]"),
    ("👎", "[thumbs_down]"),
    ("❤️", "[heart]"),
    ("❤", "[heart]"),
    ("⭐", "[star]"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Integer,
    Float,
    Date,
    Boolean,
    Id,
    Email,
    Url,
    Text,
    Category,
    Unknown,
    Null,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Number => "number",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Date => "date",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Id => "id",
            ColumnKind::Email => "email",
            ColumnKind::Url => "url",
            ColumnKind::Text => "text",
            ColumnKind::Category => "category",
            ColumnKind::Unknown => "unknown",
            ColumnKind::Null => "null",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnKind::Number | ColumnKind::Integer | ColumnKind::Float
        )
    }

    /// Maps a connector-declared type (`varchar(255)`, `timestamp`, `ObjectId`)
    /// onto the closest kind.
    pub fn from_declared(declared: &str) -> ColumnKind {
        let lowered = declared.trim().to_ascii_lowercase();
        let base = lowered
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();
        match base {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "int32" | "int64"
            | "long" | "serial" => ColumnKind::Integer,
            "float" | "double" | "real" | "float64" => ColumnKind::Float,
            "decimal" | "numeric" | "number" | "money" => ColumnKind::Number,
            "date" | "datetime" | "timestamp" | "timestamptz" | "time" => ColumnKind::Date,
            "bool" | "boolean" | "bit" => ColumnKind::Boolean,
            "uuid" | "objectid" | "guid" | "uniqueidentifier" => ColumnKind::Id,
            "varchar" | "char" | "text" | "string" | "nvarchar" | "character" => {
                ColumnKind::Text
            }
            _ => ColumnKind::Unknown,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypeInfo {
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    pub confidence: f64,
}

impl ColumnTypeInfo {
    fn new(kind: ColumnKind, confidence: f64) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub infer_types: bool,
    pub normalize_text: bool,
    pub sample_size: usize,
    pub null_tokens: Vec<String>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            infer_types: true,
            normalize_text: true,
            sample_size: DEFAULT_SAMPLE_SIZE,
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl CleanOptions {
    pub fn is_null_like(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            Value::Text(raw) => {
                let lowered = raw.trim().to_lowercase();
                self.null_tokens
                    .iter()
                    .any(|token| token.eq_ignore_ascii_case(&lowered))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub nulls_found: usize,
    pub type_conversions: usize,
    pub text_normalized: usize,
}

impl CleaningReport {
    pub fn describe(&self) -> String {
        format!(
            "Cleaned {} row(s) across {} column(s): {} null(s), {} type conversion(s)",
            self.total_rows, self.total_columns, self.nulls_found, self.type_conversions
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    #[serde(flatten)]
    pub info: ColumnTypeInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanedDataset {
    pub rows: Vec<Row>,
    pub column_types: Vec<ColumnProfile>,
    pub report: CleaningReport,
}

impl CleanedDataset {
    pub fn column_type(&self, column: &str) -> Option<&ColumnTypeInfo> {
        self.column_types
            .iter()
            .find(|profile| profile.column == column)
            .map(|profile| &profile.info)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericToken {
    pub value: f64,
    pub integral: bool,
}

/// Parses a human-formatted number: currency symbols, thousands separators,
/// a trailing `%` and accounting-style `(123)` negatives are accepted.
/// Multi-digit integers with a leading zero are treated as codes, not numbers.
pub fn parse_numeric_token(value: &str) -> Option<NumericToken> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut body = trimmed;
    let mut had_parentheses = false;
    if body.starts_with('(') && body.ends_with(')') && body.len() > 2 {
        had_parentheses = true;
        body = &body[1..body.len() - 1];
    }
    let body = body.trim();
    let body = body.strip_suffix('%').unwrap_or(body).trim_end();

    let mut cleaned = String::with_capacity(body.len());
    let mut has_digit = false;
    let mut has_decimal = false;
    let mut in_exponent = false;

    for ch in body.chars() {
        match ch {
            '0'..='9' => {
                has_digit = true;
                cleaned.push(ch);
            }
            '.' => {
                if has_decimal || in_exponent {
                    return None;
                }
                has_decimal = true;
                cleaned.push(ch);
            }
            'e' | 'E' if has_digit && !in_exponent => {
                in_exponent = true;
                cleaned.push('e');
            }
            '+' | '-' => {
                if cleaned.is_empty() || cleaned.ends_with('e') {
                    cleaned.push(ch);
                } else {
                    return None;
                }
            }
            ',' | '_' => continue,
            '$' | '€' | '£' | '¥' | '₹' => continue,
            _ => return None,
        }
    }

    if !has_digit {
        return None;
    }
    let digits = cleaned.trim_start_matches(['+', '-']);
    if !has_decimal && !in_exponent && digits.len() > 1 && digits.starts_with('0') {
        return None;
    }

    let mut parsed = cleaned.parse::<f64>().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if had_parentheses {
        if cleaned.starts_with('-') {
            return None;
        }
        parsed = -parsed;
    }
    Some(NumericToken {
        value: parsed,
        integral: parsed.fract() == 0.0 && parsed.abs() < 9.0e15,
    })
}

pub fn parse_boolean_token(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn looks_like_date(value: &str) -> bool {
    DATE_PATTERNS.iter().any(|pattern| pattern.is_match(value)) || parse_date_value(value).is_some()
}

#[derive(Debug, Default)]
struct TypeTally {
    sampled: usize,
    numeric: usize,
    integer: usize,
    date: usize,
    boolean: usize,
    email: usize,
    url: usize,
    id: usize,
    distinct: HashSet<String>,
}

impl TypeTally {
    fn update(&mut self, value: &Value) {
        self.sampled += 1;
        match value {
            Value::Integer(i) => {
                self.numeric += 1;
                self.integer += 1;
                if *i == 0 || *i == 1 {
                    self.boolean += 1;
                }
            }
            Value::Float(f) => {
                self.numeric += 1;
                if f.fract() == 0.0 {
                    self.integer += 1;
                }
            }
            Value::Boolean(_) => self.boolean += 1,
            Value::Date(_) => self.date += 1,
            Value::Text(raw) => self.update_text(raw.trim()),
            Value::Null => {}
        }
        self.distinct.insert(value.as_display());
    }

    fn update_text(&mut self, trimmed: &str) {
        if let Some(token) = parse_numeric_token(trimmed) {
            self.numeric += 1;
            if token.integral {
                self.integer += 1;
            }
        }
        if BOOLEAN_PATTERN.is_match(trimmed) {
            self.boolean += 1;
        }
        if looks_like_date(trimmed) {
            self.date += 1;
        }
        if EMAIL_PATTERN.is_match(trimmed) {
            self.email += 1;
        }
        if URL_PATTERN.is_match(trimmed) {
            self.url += 1;
        }
        if OBJECT_ID_PATTERN.is_match(trimmed) || UUID_PATTERN.is_match(trimmed) {
            self.id += 1;
        }
    }

    fn ratio(&self, count: usize) -> f64 {
        if self.sampled == 0 {
            0.0
        } else {
            count as f64 / self.sampled as f64
        }
    }

    fn decide(&self) -> ColumnTypeInfo {
        if self.sampled == 0 {
            return ColumnTypeInfo::new(ColumnKind::Null, 1.0);
        }
        let checks = [
            (ColumnKind::Date, self.ratio(self.date), DATE_THRESHOLD),
            (ColumnKind::Email, self.ratio(self.email), EMAIL_THRESHOLD),
            (ColumnKind::Url, self.ratio(self.url), URL_THRESHOLD),
            (ColumnKind::Boolean, self.ratio(self.boolean), BOOLEAN_THRESHOLD),
            (ColumnKind::Id, self.ratio(self.id), ID_THRESHOLD),
            (ColumnKind::Integer, self.ratio(self.integer), INTEGER_THRESHOLD),
            (ColumnKind::Number, self.ratio(self.numeric), NUMBER_THRESHOLD),
        ];
        if let Some((kind, ratio, _)) = checks
            .iter()
            .find(|(_, ratio, threshold)| ratio > threshold)
        {
            return ColumnTypeInfo::new(*kind, *ratio);
        }

        let unique_ratio = self.ratio(self.distinct.len());
        if unique_ratio < CATEGORY_UNIQUE_RATIO && self.sampled >= CATEGORY_MIN_SAMPLE {
            return ColumnTypeInfo::new(ColumnKind::Category, 1.0 - unique_ratio);
        }
        let strongest = checks
            .iter()
            .map(|(_, ratio, _)| *ratio)
            .fold(0.0_f64, f64::max);
        ColumnTypeInfo::new(ColumnKind::Text, 1.0 - strongest)
    }
}

/// Scores a sample of non-null values. Pure: the same sample always yields the
/// same kind and confidence.
pub fn detect_column_type(sample: &[Value]) -> ColumnTypeInfo {
    let mut tally = TypeTally::default();
    for value in sample {
        tally.update(value);
    }
    tally.decide()
}

/// Decodes a handful of HTML entities, strips tags, maps common emoji to
/// bracketed tokens and collapses whitespace.
pub fn normalize_text(value: &str) -> String {
    let mut text = value.to_string();
    for (entity, replacement) in HTML_ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }
    let mut text = TAG_PATTERN.replace_all(&text, " ").into_owned();
    for (emoji, token) in EMOJI_TOKENS {
        if text.contains(emoji) {
            text = text.replace(emoji, &format!(" {token} "));
        }
    }
    WHITESPACE_PATTERN
        .replace_all(&text, " ")
        .trim()
        .to_string()
}

fn dataset_columns(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.columns())
        .unique()
        .map(str::to_string)
        .collect()
}

fn sample_column(rows: &[Row], column: &str, options: &CleanOptions) -> Vec<Value> {
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !options.is_null_like(value))
        .take(options.sample_size.max(1))
        .cloned()
        .collect()
}

enum Converted {
    Unchanged,
    Typed(Value),
    Normalized(Value),
}

fn convert_text(raw: &str, kind: ColumnKind, options: &CleanOptions) -> Converted {
    let trimmed = raw.trim();
    match kind {
        ColumnKind::Integer => match parse_numeric_token(trimmed) {
            Some(token) if token.integral => Converted::Typed(Value::Integer(token.value as i64)),
            Some(token) => Converted::Typed(Value::Float(token.value)),
            None => Converted::Unchanged,
        },
        ColumnKind::Number | ColumnKind::Float => parse_numeric_token(trimmed)
            .map(|token| Converted::Typed(Value::Float(token.value)))
            .unwrap_or(Converted::Unchanged),
        ColumnKind::Date => parse_date_value(trimmed)
            .map(|dt| Converted::Typed(Value::Date(dt)))
            .unwrap_or(Converted::Unchanged),
        ColumnKind::Boolean => parse_boolean_token(trimmed)
            .map(|b| Converted::Typed(Value::Boolean(b)))
            .unwrap_or(Converted::Unchanged),
        ColumnKind::Email | ColumnKind::Url | ColumnKind::Id => {
            if trimmed.len() != raw.len() {
                Converted::Normalized(Value::Text(trimmed.to_string()))
            } else {
                Converted::Unchanged
            }
        }
        ColumnKind::Text | ColumnKind::Category | ColumnKind::Unknown => {
            if !options.normalize_text {
                return Converted::Unchanged;
            }
            let normalized = normalize_text(raw);
            if normalized != raw {
                Converted::Normalized(Value::Text(normalized))
            } else {
                Converted::Unchanged
            }
        }
        ColumnKind::Null => Converted::Unchanged,
    }
}

/// Infers a type per column and rewrites the rows accordingly. Every output
/// row carries every column seen in the input, in first-seen order.
pub fn clean_dataset(rows: &[Row], options: &CleanOptions) -> CleanedDataset {
    let columns = dataset_columns(rows);
    let mut report = CleaningReport {
        total_rows: rows.len(),
        total_columns: columns.len(),
        ..CleaningReport::default()
    };

    let column_types = columns
        .iter()
        .map(|column| {
            let info = if options.infer_types {
                detect_column_type(&sample_column(rows, column, options))
            } else {
                ColumnTypeInfo::new(ColumnKind::Unknown, 0.0)
            };
            debug!(
                "Column '{}' detected as {} ({:.2})",
                column, info.kind, info.confidence
            );
            ColumnProfile {
                column: column.clone(),
                info,
            }
        })
        .collect::<Vec<_>>();

    let mut cleaned = Vec::with_capacity(rows.len());
    for row in rows {
        let mut output = Row::with_capacity(columns.len());
        for profile in &column_types {
            let value = row.value(&profile.column);
            if options.is_null_like(value) {
                report.nulls_found += 1;
                output.insert(profile.column.clone(), Value::Null);
                continue;
            }
            let converted = match value {
                Value::Text(raw) => convert_text(raw, profile.info.kind, options),
                _ => Converted::Unchanged,
            };
            let next = match converted {
                Converted::Unchanged => value.clone(),
                Converted::Typed(typed) => {
                    report.type_conversions += 1;
                    typed
                }
                Converted::Normalized(text) => {
                    report.text_normalized += 1;
                    text
                }
            };
            output.insert(profile.column.clone(), next);
        }
        cleaned.push(output);
    }

    debug!("{}", report.describe());
    CleanedDataset {
        rows: cleaned,
        column_types,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    #[test]
    fn parse_numeric_token_handles_human_formats() {
        assert_eq!(parse_numeric_token("$1,234.50").unwrap().value, 1234.5);
        assert_eq!(parse_numeric_token("(42)").unwrap().value, -42.0);
        assert_eq!(parse_numeric_token("45%").unwrap().value, 45.0);
        assert!(parse_numeric_token("12").unwrap().integral);
        assert!(!parse_numeric_token("1.5").unwrap().integral);
        assert!(parse_numeric_token("007").is_none());
        assert!(parse_numeric_token("2024-01-01").is_none());
        assert!(parse_numeric_token("abc").is_none());
    }

    #[test]
    fn detect_column_type_prefers_dates_over_numbers() {
        let info = detect_column_type(&texts(&["2024-01-01", "2024-02-01", "2024-03-01"]));
        assert_eq!(info.kind, ColumnKind::Date);
        assert_eq!(info.confidence, 1.0);
    }

    #[test]
    fn detect_column_type_recognizes_booleans_before_integers() {
        let info = detect_column_type(&texts(&["1", "0", "yes", "no", "1"]));
        assert_eq!(info.kind, ColumnKind::Boolean);
    }

    #[test]
    fn detect_column_type_falls_back_to_number_at_lower_threshold() {
        let info = detect_column_type(&texts(&["1.5", "2.5", "3.5", "x"]));
        assert_eq!(info.kind, ColumnKind::Number);
        assert_eq!(info.confidence, 0.75);
    }

    #[test]
    fn detect_column_type_finds_categories_in_repetitive_samples() {
        let sample = texts(&[
            "red", "blue", "red", "red", "blue", "red", "blue", "red", "red", "blue",
        ]);
        let info = detect_column_type(&sample);
        assert_eq!(info.kind, ColumnKind::Category);
        assert!((info.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn detect_column_type_recognizes_ids_emails_and_urls() {
        assert_eq!(
            detect_column_type(&texts(&["507f1f77bcf86cd799439011", "507f191e810c19729de860ea"]))
                .kind,
            ColumnKind::Id
        );
        assert_eq!(
            detect_column_type(&texts(&["a@example.com", "b@example.org"])).kind,
            ColumnKind::Email
        );
        assert_eq!(
            detect_column_type(&texts(&["https://a.io/x", "http://b.com"])).kind,
            ColumnKind::Url
        );
    }

    #[test]
    fn normalize_text_decodes_strips_and_collapses() {
        assert_eq!(
            normalize_text("  <b>Great</b>   food &amp; drinks 👍 "),
            "Great food & drinks [thumbs_up]"
        );
    }

    #[test]
    fn from_declared_maps_connector_types() {
        assert_eq!(ColumnKind::from_declared("VARCHAR(255)"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_declared("bigint"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_declared("timestamp with time zone"), ColumnKind::Date);
        assert_eq!(ColumnKind::from_declared("geometry"), ColumnKind::Unknown);
    }
}
