//! Execution plans: ordered, self-describing steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    filter::FilterCondition,
    intent::{Aggregation, Intent, PercentileFilter, SemanticFilter, TimeAnalysis, WindowRequest},
    window::SortDirection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Select,
    Filter,
    Group,
    Aggregate,
    Window,
    Statistical,
    Order,
    Limit,
}

impl Operation {
    pub fn priority(&self) -> u8 {
        match self {
            Operation::Select => 1,
            Operation::Filter => 2,
            Operation::Group => 3,
            Operation::Aggregate => 4,
            Operation::Window => 5,
            Operation::Statistical => 6,
            Operation::Order => 7,
            Operation::Limit => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Filter => "filter",
            Operation::Group => "group",
            Operation::Aggregate => "aggregate",
            Operation::Window => "window",
            Operation::Statistical => "statistical",
            Operation::Order => "order",
            Operation::Limit => "limit",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation configuration; each variant carries exactly what its step
/// needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum StepConfig {
    Select {
        columns: Vec<String>,
    },
    Filter {
        conditions: Vec<FilterCondition>,
        semantic: Option<SemanticFilter>,
    },
    Group {
        columns: Vec<String>,
        time: Option<TimeAnalysis>,
    },
    Aggregate {
        aggregations: Vec<Aggregation>,
    },
    Window {
        request: WindowRequest,
        /// Column that orders rows before running/offset functions.
        order_by: Option<String>,
        direction: SortDirection,
    },
    Statistical {
        filter: PercentileFilter,
    },
    Order {
        column: Option<String>,
        direction: SortDirection,
    },
    Limit {
        count: usize,
    },
}

impl StepConfig {
    pub fn operation(&self) -> Operation {
        match self {
            StepConfig::Select { .. } => Operation::Select,
            StepConfig::Filter { .. } => Operation::Filter,
            StepConfig::Group { .. } => Operation::Group,
            StepConfig::Aggregate { .. } => Operation::Aggregate,
            StepConfig::Window { .. } => Operation::Window,
            StepConfig::Statistical { .. } => Operation::Statistical,
            StepConfig::Order { .. } => Operation::Order,
            StepConfig::Limit { .. } => Operation::Limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub config: StepConfig,
    pub description: String,
}

impl Step {
    pub fn operation(&self) -> Operation {
        self.config.operation()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=1 => Complexity::Simple,
            2..=3 => Complexity::Moderate,
            _ => Complexity::Complex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<Step>,
    pub intent: Intent,
    pub complexity: Complexity,
    pub complexity_score: u32,
    pub db_type: String,
}

impl ExecutionPlan {
    pub fn operations(&self) -> Vec<Operation> {
        self.steps.iter().map(Step::operation).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_follow_declaration_order() {
        let ops = [
            Operation::Select,
            Operation::Filter,
            Operation::Group,
            Operation::Aggregate,
            Operation::Window,
            Operation::Statistical,
            Operation::Order,
            Operation::Limit,
        ];
        for pair in ops.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn complexity_tiers() {
        assert_eq!(Complexity::from_score(0), Complexity::Simple);
        assert_eq!(Complexity::from_score(1), Complexity::Simple);
        assert_eq!(Complexity::from_score(2), Complexity::Moderate);
        assert_eq!(Complexity::from_score(3), Complexity::Moderate);
        assert_eq!(Complexity::from_score(4), Complexity::Complex);
    }

    #[test]
    fn step_config_serializes_with_operation_tag() {
        let step = StepConfig::Limit { count: 5 };
        let json = serde_json::to_value(&step).expect("serialize step");
        assert_eq!(json["operation"], "limit");
        assert_eq!(json["count"], 5);
    }
}
