use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::NotEq => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::StartsWith => "startswith",
            ComparisonOperator::EndsWith => "endswith",
        }
    }

    /// Maps a symbol or an English comparison phrase (`above`, `at most`, ...)
    /// to an operator. Inner whitespace is collapsed before lookup.
    pub fn from_phrase(phrase: &str) -> Option<Self> {
        let collapsed = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let op = match collapsed.to_ascii_lowercase().as_str() {
            "=" | "==" | "is" | "equals" | "equal to" | "is equal to" => ComparisonOperator::Eq,
            "!=" | "<>" | "is not" | "not" => ComparisonOperator::NotEq,
            ">" | "above" | "over" | "greater than" | "is greater than" | "more than"
            | "higher than" => ComparisonOperator::Gt,
            ">=" | "at least" => ComparisonOperator::Ge,
            "<" | "below" | "under" | "less than" | "is less than" | "fewer than"
            | "lower than" => ComparisonOperator::Lt,
            "<=" | "at most" => ComparisonOperator::Le,
            "contains" => ComparisonOperator::Contains,
            "startswith" | "starts with" => ComparisonOperator::StartsWith,
            "endswith" | "ends with" => ComparisonOperator::EndsWith,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: ComparisonOperator, value: Value) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} {}",
            self.column,
            self.operator.symbol(),
            self.value.as_display()
        )
    }

    pub fn matches(&self, row: &Row) -> bool {
        evaluate_condition(self, row.value(&self.column))
    }
}

pub fn evaluate_conditions(conditions: &[FilterCondition], row: &Row) -> bool {
    conditions.iter().all(|condition| condition.matches(row))
}

fn comparable(left: &Value, right: &Value) -> bool {
    (left.is_numeric() && right.is_numeric())
        || std::mem::discriminant(left) == std::mem::discriminant(right)
}

fn evaluate_condition(condition: &FilterCondition, candidate: &Value) -> bool {
    use ComparisonOperator::*;
    match condition.operator {
        Contains | StartsWith | EndsWith => {
            if candidate.is_null() {
                return false;
            }
            let raw = candidate.as_display();
            let needle = condition.value.as_display();
            match condition.operator {
                Contains => raw.contains(&needle),
                StartsWith => raw.starts_with(&needle),
                _ => raw.ends_with(&needle),
            }
        }
        Eq | NotEq | Gt | Ge | Lt | Le => {
            match (candidate.is_null(), condition.value.is_null()) {
                (true, true) => matches!(condition.operator, Eq | Ge | Le),
                (true, false) | (false, true) => matches!(condition.operator, NotEq),
                (false, false) => {
                    if !comparable(candidate, &condition.value) {
                        return matches!(condition.operator, NotEq);
                    }
                    let ordering = candidate.compare(&condition.value);
                    match condition.operator {
                        Eq => ordering.is_eq(),
                        NotEq => ordering.is_ne(),
                        Gt => ordering.is_gt(),
                        Ge => ordering.is_ge(),
                        Lt => ordering.is_lt(),
                        _ => ordering.is_le(),
                    }
                }
            }
        }
    }
}
