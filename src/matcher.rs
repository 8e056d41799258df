//! Resolves free-text terms to schema columns.
//!
//! Matching runs four tiers against every candidate: exact (after
//! normalisation), synonym table, substring containment and a Levenshtein
//! ratio. The first exact hit short-circuits; otherwise the highest score
//! wins and ties keep the candidate seen first.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::filter::ComparisonOperator;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

const EXACT_SCORE: f64 = 1.0;
const SYNONYM_SCORE: f64 = 0.95;
const CONTAINS_SCORE: f64 = 0.85;
const MIN_TOKEN_CHARS: usize = 2;

const SYNONYMS: &[(&str, &[&str])] = &[
    ("rating", &["score", "stars", "star", "rate", "grade"]),
    ("score", &["rating", "points", "grade", "stars"]),
    ("star", &["rating", "score"]),
    ("user", &["reviewer", "customer", "author", "username", "client"]),
    ("reviewer", &["user", "author", "customer"]),
    ("customer", &["client", "buyer", "user", "account"]),
    ("author", &["user", "reviewer", "writer"]),
    ("review", &["comment", "feedback", "text", "body", "content"]),
    ("comment", &["review", "feedback", "text", "body"]),
    ("feedback", &["review", "comment", "text"]),
    ("date", &["created", "timestamp", "time", "day"]),
    ("time", &["timestamp", "date", "created"]),
    ("when", &["date", "created", "timestamp"]),
    ("price", &["cost", "amount", "value"]),
    ("cost", &["price", "amount", "expense"]),
    ("revenue", &["sales", "income", "amount", "total"]),
    ("sale", &["revenue", "amount", "order"]),
    ("product", &["item", "sku", "article"]),
    ("item", &["product", "sku"]),
    ("category", &["type", "group", "segment", "genre"]),
    ("location", &["city", "region", "country", "address"]),
    ("city", &["location", "town"]),
    ("sentiment", &["rating", "score", "polarity"]),
    ("harsh", &["rating", "score"]),
    ("negative", &["rating", "score"]),
    ("bad", &["rating", "score"]),
    ("worst", &["rating", "score"]),
    ("good", &["rating", "score"]),
    ("positive", &["rating", "score"]),
    ("best", &["rating", "score"]),
];

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "been", "by", "can", "did",
    "do", "does", "each", "for", "from", "get", "give", "had", "has", "have", "how", "i", "in",
    "into", "is", "it", "its", "list", "me", "my", "of", "on", "or", "our", "per", "please",
    "show", "tell", "than", "that", "the", "their", "them", "there", "these", "this", "those",
    "to", "us", "was", "we", "were", "what", "which", "who", "whose", "why", "will", "with",
    "would", "you", "your",
];

// Analytics vocabulary only resolves to a column on an exact hit, so
// "count" never fuzzy-matches "comment".
const QUERY_VOCABULARY: &[&str] = &[
    "average", "avg", "mean", "sum", "total", "count", "max", "maximum", "min", "minimum",
    "median", "mode", "top", "bottom", "rank", "ranking", "ranked", "running", "rolling",
    "moving", "cumulative", "percent", "percentile", "trend", "daily", "weekly", "monthly",
    "quarterly", "yearly", "day", "week", "month", "quarter", "year", "compare", "group",
    "limit", "first", "last", "highest", "lowest", "number", "many", "where", "sort", "order",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Synonym,
    Contains,
    Fuzzy,
    None,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Synonym => "synonym",
            MatchKind::Contains => "contains",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::None => "none",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub column: Option<String>,
    pub score: f64,
    pub kind: MatchKind,
}

impl ColumnMatch {
    pub fn none() -> Self {
        Self {
            column: None,
            score: 0.0,
            kind: MatchKind::None,
        }
    }
}

/// A question token resolved to a schema column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnReference {
    pub column: String,
    pub term: String,
    pub score: f64,
    pub kind: MatchKind,
}

/// Lowercases, drops everything but letters and digits, then strips one
/// trailing plural.
pub fn normalize_term(term: &str) -> String {
    let compact = term
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .collect::<String>();
    singularize(&compact)
}

fn singularize(word: &str) -> String {
    let len = word.len();
    if len > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..len - 3]);
    }
    if len > 3 && word.ends_with('s') && !word.ends_with("ss") {
        return word[..len - 1].to_string();
    }
    word.to_string()
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let left = a.chars().collect::<Vec<_>>();
    let right = b.chars().collect::<Vec<_>>();
    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }
    let mut previous = (0..=right.len()).collect::<Vec<_>>();
    let mut current = vec![0; right.len() + 1];
    for (i, lch) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, rch) in right.iter().enumerate() {
            let substitution = previous[j] + usize::from(lch != rch);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[right.len()]
}

/// `1 - distance / max(len)`, or 1.0 for two empty strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn synonyms_for(normalized: &str) -> &'static [&'static str] {
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == normalized)
        .map(|(_, synonyms)| *synonyms)
        .unwrap_or(&[])
}

fn score_candidate(term: &str, candidate: &str) -> (f64, MatchKind) {
    let synonym_hit = synonyms_for(term).iter().any(|synonym| {
        let synonym = normalize_term(synonym);
        !synonym.is_empty() && (candidate == synonym || candidate.contains(synonym.as_str()))
    });
    if synonym_hit {
        return (SYNONYM_SCORE, MatchKind::Synonym);
    }
    if candidate.contains(term) || term.contains(candidate) {
        return (CONTAINS_SCORE, MatchKind::Contains);
    }
    (similarity(term, candidate), MatchKind::Fuzzy)
}

pub fn find_best_column_match<S: AsRef<str>>(
    term: &str,
    candidates: &[S],
    threshold: f64,
) -> ColumnMatch {
    let normalized = normalize_term(term);
    if normalized.is_empty() {
        return ColumnMatch::none();
    }

    let mut best = ColumnMatch::none();
    for candidate in candidates {
        let original = candidate.as_ref();
        let normalized_candidate = normalize_term(original);
        if normalized_candidate.is_empty() {
            continue;
        }
        if normalized_candidate == normalized {
            return ColumnMatch {
                column: Some(original.to_string()),
                score: EXACT_SCORE,
                kind: MatchKind::Exact,
            };
        }
        let (score, kind) = score_candidate(&normalized, &normalized_candidate);
        if score >= threshold && score > best.score {
            best = ColumnMatch {
                column: Some(original.to_string()),
                score,
                kind,
            };
        }
    }
    best
}

/// Lowercased words with punctuation replaced by spaces. Underscores survive
/// so `created_at` stays one token.
pub fn tokenize(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '_' {
                ch
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Question text as space-separated words padded with a leading and trailing
/// space, so a phrase can be found on word boundaries with
/// [`contains_phrase`].
pub fn phrase_text(question: &str) -> String {
    format!(" {} ", tokenize(question).join(" "))
}

pub fn contains_phrase(padded: &str, phrase: &str) -> bool {
    padded.contains(&format!(" {phrase} "))
}

pub fn extract_column_references<S: AsRef<str>>(
    question: &str,
    columns: &[S],
) -> Vec<ColumnReference> {
    extract_column_references_with_threshold(question, columns, DEFAULT_MATCH_THRESHOLD)
}

pub fn extract_column_references_with_threshold<S: AsRef<str>>(
    question: &str,
    columns: &[S],
    threshold: f64,
) -> Vec<ColumnReference> {
    let mut references: Vec<ColumnReference> = Vec::new();
    for token in tokenize(question) {
        if token.chars().count() < MIN_TOKEN_CHARS || is_stop_word(&token) {
            continue;
        }
        let matched = find_best_column_match(&token, columns, threshold);
        let Some(column) = matched.column else {
            continue;
        };
        if matched.kind != MatchKind::Exact && QUERY_VOCABULARY.contains(&token.as_str()) {
            continue;
        }
        if matched.score < threshold || references.iter().any(|r| r.column == column) {
            continue;
        }
        references.push(ColumnReference {
            column,
            term: token,
            score: matched.score,
            kind: matched.kind,
        });
    }
    references
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsIntent {
    Aggregation,
    Ranking,
    Percentile,
    Trend,
    Comparison,
    Grouping,
    Filtering,
}

const INTENT_KEYWORDS: &[(AnalyticsIntent, &[&str])] = &[
    (
        AnalyticsIntent::Aggregation,
        &[
            "average", "avg", "mean", "sum", "total", "count", "how many", "number of",
            "median", "maximum", "minimum", "max", "min",
        ],
    ),
    (
        AnalyticsIntent::Ranking,
        &[
            "top", "bottom", "rank", "ranking", "ranked", "best", "worst", "highest", "lowest",
        ],
    ),
    (
        AnalyticsIntent::Percentile,
        &["percentile", "percent", "quartile", "quartiles", "decile", "median"],
    ),
    (
        AnalyticsIntent::Trend,
        &[
            "trend", "over time", "daily", "weekly", "monthly", "quarterly", "yearly", "per day",
            "per week", "per month", "per quarter", "per year", "growth", "change",
        ],
    ),
    (
        AnalyticsIntent::Comparison,
        &["compare", "comparison", "versus", "vs", "difference", "between"],
    ),
    (
        AnalyticsIntent::Grouping,
        &["group by", "grouped by", "per", "by", "for each", "each", "breakdown"],
    ),
    (
        AnalyticsIntent::Filtering,
        &[
            "where", "only", "filter", "above", "below", "greater than", "less than", "over",
            "under", "at least", "at most", "with",
        ],
    ),
];

/// Coarse buckets the question falls into, always reported in the order
/// aggregation, ranking, percentile, trend, comparison, grouping, filtering.
pub fn classify_analytics_intents(question: &str) -> Vec<AnalyticsIntent> {
    let padded = phrase_text(question);
    INTENT_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| contains_phrase(&padded, k)))
        .map(|(intent, _)| *intent)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Positive,
}

impl Sentiment {
    pub fn operator(&self) -> ComparisonOperator {
        match self {
            Sentiment::Negative => ComparisonOperator::Le,
            Sentiment::Positive => ComparisonOperator::Ge,
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            Sentiment::Negative => 2.0,
            Sentiment::Positive => 4.0,
        }
    }
}

const SENTIMENT_TERMS: &[(&str, Sentiment)] = &[
    ("harsh", Sentiment::Negative),
    ("negative", Sentiment::Negative),
    ("bad", Sentiment::Negative),
    ("worst", Sentiment::Negative),
    ("terrible", Sentiment::Negative),
    ("awful", Sentiment::Negative),
    ("poor", Sentiment::Negative),
    ("angry", Sentiment::Negative),
    ("unhappy", Sentiment::Negative),
    ("complaint", Sentiment::Negative),
    ("complaints", Sentiment::Negative),
    ("great", Sentiment::Positive),
    ("best", Sentiment::Positive),
    ("positive", Sentiment::Positive),
    ("excellent", Sentiment::Positive),
    ("good", Sentiment::Positive),
    ("happy", Sentiment::Positive),
    ("love", Sentiment::Positive),
    ("amazing", Sentiment::Positive),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCue {
    pub term: String,
    pub sentiment: Sentiment,
}

/// The first term of the fixed list that appears as a word in the question.
pub fn infer_sentiment_filter(question: &str) -> Option<SentimentCue> {
    let padded = phrase_text(question);
    SENTIMENT_TERMS
        .iter()
        .find(|(term, _)| contains_phrase(&padded, term))
        .map(|(term, sentiment)| SentimentCue {
            term: term.to_string(),
            sentiment: *sentiment,
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHint {
    pub term: String,
    pub column: String,
    pub score: f64,
    pub kind: MatchKind,
    pub note: String,
}

pub fn semantic_hints<S: AsRef<str>>(question: &str, columns: &[S]) -> Vec<SemanticHint> {
    extract_column_references(question, columns)
        .into_iter()
        .map(|reference| {
            let note = format!(
                "'{}' refers to column '{}' ({} match, score {:.2})",
                reference.term, reference.column, reference.kind, reference.score
            );
            SemanticHint {
                term: reference.term,
                column: reference.column,
                score: reference.score,
                kind: reference.kind,
                note,
            }
        })
        .collect()
}

/// Comma-joined column list for log lines and step descriptions.
pub fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns.iter().map(|c| c.as_ref()).join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_over_synonym() {
        let matched = find_best_column_match("Rating", &["rating", "score"], 0.5);
        assert_eq!(matched.column.as_deref(), Some("rating"));
        assert_eq!(matched.kind, MatchKind::Exact);
        assert_eq!(matched.score, 1.0);
    }

    #[test]
    fn plural_terms_normalise_to_singular() {
        assert_eq!(normalize_term("Categories"), "category");
        assert_eq!(normalize_term("ratings"), "rating");
        assert_eq!(normalize_term("class"), "class");
        assert_eq!(normalize_term("bus"), "bus");
    }

    #[test]
    fn synonym_and_contains_tiers() {
        let synonym = find_best_column_match("stars", &["rating"], 0.5);
        assert_eq!(synonym.kind, MatchKind::Synonym);
        assert_eq!(synonym.score, 0.95);

        let contains = find_best_column_match("created", &["created_at"], 0.5);
        assert_eq!(contains.kind, MatchKind::Contains);
        assert_eq!(contains.score, 0.85);
    }

    #[test]
    fn fuzzy_requires_threshold() {
        let close = find_best_column_match("ratng", &["rating"], 0.5);
        assert_eq!(close.kind, MatchKind::Fuzzy);
        assert!(close.score >= 0.8);

        let far = find_best_column_match("zebra", &["rating"], 0.5);
        assert_eq!(far.column, None);
        assert_eq!(far.kind, MatchKind::None);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let matched = find_best_column_match("name", &["first_name", "last_name"], 0.5);
        assert_eq!(matched.column.as_deref(), Some("first_name"));
    }

    #[test]
    fn levenshtein_counts_edits() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn extracts_references_without_duplicates() {
        let refs = extract_column_references(
            "What is the average rating and ratings score?",
            &["rating", "created_at"],
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].column, "rating");
        assert_eq!(refs[0].term, "rating");
    }

    #[test]
    fn analytics_words_only_match_columns_exactly() {
        let columns = ["total_sales", "month", "count"];
        let refs = extract_column_references("total by month", &columns);
        assert_eq!(
            refs.iter().map(|r| r.column.as_str()).collect::<Vec<_>>(),
            vec!["month"]
        );

        let refs = extract_column_references("what is the count", &columns);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].column, "count");
    }

    #[test]
    fn classifies_in_fixed_order() {
        let buckets = classify_analytics_intents("Show the top 5 products by average rating");
        assert_eq!(
            buckets,
            vec![
                AnalyticsIntent::Aggregation,
                AnalyticsIntent::Ranking,
                AnalyticsIntent::Grouping
            ]
        );
    }

    #[test]
    fn first_listed_sentiment_term_wins() {
        let cue = infer_sentiment_filter("good products with harsh reviews").expect("cue");
        assert_eq!(cue.term, "harsh");
        assert_eq!(cue.sentiment.operator(), ComparisonOperator::Le);
        assert_eq!(cue.sentiment.threshold(), 2.0);
        assert!(infer_sentiment_filter("average price").is_none());
    }
}
