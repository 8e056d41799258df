use thiserror::Error;

/// Faults raised while executing a plan. The engine converts them into the
/// failure shape of an execution result instead of propagating them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("No data provided")]
    EmptyDataset,
    #[error("Column '{column}' not found for {step}")]
    MissingColumn { column: String, step: &'static str },
    #[error("No numeric column available for {0}")]
    NoNumericColumn(&'static str),
    #[error("No date column available for time grouping")]
    NoDateColumn,
    #[error("No rating column available for sentiment filter")]
    NoRatingColumn,
    #[error("{function} requires two numeric columns")]
    MissingPair { function: String },
    #[error("Invalid engine option: {0}")]
    InvalidOption(String),
}
