//! Context handed to a prompting collaborator. Building it never executes
//! anything and never touches session state.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    data::format_number,
    engine::AnalyticsEngine,
    intent::{Aggregation, Intent},
    matcher::{AnalyticsIntent, SemanticHint, classify_analytics_intents, semantic_hints},
    schema::Schema,
    stats::PercentileSide,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedPromptData {
    pub question: String,
    pub columns: Vec<String>,
    pub intent: Intent,
    pub semantic_hints: Vec<SemanticHint>,
    pub analytics_intents: Vec<AnalyticsIntent>,
    pub suggested_approach: Vec<String>,
}

impl AnalyticsEngine {
    pub fn get_enhanced_prompt_data(&self, question: &str, schema: &Schema) -> EnhancedPromptData {
        let columns = schema.flat_columns();
        let intent = self.parse_intent(question, schema);
        let analytics_intents = classify_analytics_intents(question);
        EnhancedPromptData {
            question: question.to_string(),
            semantic_hints: semantic_hints(question, &columns),
            suggested_approach: suggest_approach(&intent, &analytics_intents),
            columns,
            intent,
            analytics_intents,
        }
    }
}

pub fn suggest_approach(intent: &Intent, buckets: &[AnalyticsIntent]) -> Vec<String> {
    if intent.clarification_needed {
        return vec!["Ask which columns or metrics should be analyzed".to_string()];
    }

    let mut steps = Vec::new();
    if let Some(semantic) = &intent.semantic_filter {
        steps.push(format!("Filter on sentiment: {}", semantic.describe()));
    }
    if !intent.filters.is_empty() {
        steps.push(format!(
            "Filter rows where {}",
            intent.filters.iter().map(|c| c.describe()).join(" and ")
        ));
    }
    if let Some(time) = &intent.time_analysis {
        steps.push(format!(
            "Bucket {} by {} to show the trend",
            time.column.as_deref().unwrap_or("the date column"),
            time.interval
        ));
    }
    if !intent.group_by.is_empty() {
        steps.push(format!("Group results by {}", intent.group_by.join(", ")));
    }
    if !intent.aggregations.is_empty() {
        steps.push(format!(
            "Aggregate with {}",
            intent.aggregations.iter().map(Aggregation::describe).join(", ")
        ));
    }
    if let Some(window) = &intent.window_function {
        steps.push(format!(
            "Apply the {} window function over {}",
            window.function,
            window.column.as_deref().unwrap_or("the primary numeric column")
        ));
    }
    if let Some(filter) = &intent.percentile_filter {
        steps.push(format!(
            "Keep the {} {}% of {}",
            match filter.side {
                PercentileSide::Top => "top",
                PercentileSide::Bottom => "bottom",
            },
            format_number(filter.percent),
            filter.column.as_deref().unwrap_or("the primary numeric column")
        ));
    }
    if buckets.contains(&AnalyticsIntent::Comparison) {
        steps.push("Compare the resulting groups side by side".to_string());
    }
    if let Some(limit) = intent.limit {
        let direction = intent
            .order
            .map(|direction| format!(" in {direction} order"))
            .unwrap_or_default();
        steps.push(format!("Return the first {limit} row(s){direction}"));
    } else if let Some(direction) = intent.order {
        steps.push(format!("Sort results in {direction} order"));
    }
    if steps.is_empty() {
        steps.push(format!(
            "Return the referenced columns: {}",
            intent.column_names().join(", ")
        ));
    }
    steps
}
