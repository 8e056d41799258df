use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Ask analytical questions of tabular data in plain language",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a question and print the execution plan without running it
    Plan(PlanArgs),
    /// Parse, plan and execute one or more questions against a dataset
    Analyze(AnalyzeArgs),
    /// Infer column types and clean a dataset
    Clean(CleanArgs),
    /// Resolve a term or a question's vocabulary to schema columns
    Match(MatchArgs),
    /// Print the structured context for a prompting collaborator
    Prompt(PromptArgs),
    /// Produce summary statistics or frequency counts for dataset columns
    Stats(StatsArgs),
}

/// Where the column vocabulary comes from: an explicit schema file, or the
/// headers of a dataset.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Dataset file (CSV, TSV or JSON array of objects; `-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Schema file (JSON or YAML) listing tables/collections and their columns
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Natural-language question
    #[arg(short = 'q', long = "question")]
    pub question: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Engine options file (YAML)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Backend label recorded on the plan
    #[arg(long = "db-type", default_value = "memory")]
    pub db_type: String,
    /// Print the full plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Dataset file (CSV, TSV or JSON array of objects; `-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Questions asked in order within one conversation; follow-ups inherit context
    #[arg(short = 'q', long = "question", required = true, action = clap::ArgAction::Append)]
    pub questions: Vec<String>,
    /// Schema file (JSON or YAML); defaults to the dataset's columns
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Engine options file (YAML)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Backend label recorded on the plan
    #[arg(long = "db-type", default_value = "memory")]
    pub db_type: String,
    /// Skip type inference and text normalization before execution
    #[arg(long)]
    pub raw: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Print each outcome as a JSON document
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Dataset file (CSV, TSV or JSON array of objects; `-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Engine options file (YAML); its `clean` section drives cleaning
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Also print the cleaned rows
    #[arg(long)]
    pub rows: bool,
    /// Print the cleaned dataset, column types and report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Candidate column names
    #[arg(short = 'C', long = "columns", value_delimiter = ',', required = true)]
    pub columns: Vec<String>,
    /// Single term to resolve
    #[arg(short = 't', long = "term", conflicts_with = "question")]
    pub term: Option<String>,
    /// Question whose words are resolved to columns
    #[arg(short = 'q', long = "question")]
    pub question: Option<String>,
    /// Minimum score accepted for non-exact matches
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Print matches as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PromptArgs {
    /// Natural-language question
    #[arg(short = 'q', long = "question")]
    pub question: String,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Engine options file (YAML)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Dataset file (CSV, TSV or JSON array of objects; `-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Columns to include (defaults to numeric columns)
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Print value frequencies for the selected columns instead of summaries
    #[arg(long)]
    pub frequency: bool,
    /// Maximum distinct values shown per column with --frequency (0 means all)
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn analyze_collects_repeated_questions() {
        let cli = Cli::try_parse_from([
            "nl-analytics",
            "analyze",
            "-i",
            "reviews.csv",
            "-q",
            "average rating",
            "-q",
            "by month",
        ])
        .expect("parse args");
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.questions, vec!["average rating", "by month"]);
                assert_eq!(args.db_type, "memory");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn match_rejects_term_and_question_together() {
        let result = Cli::try_parse_from([
            "nl-analytics",
            "match",
            "-C",
            "rating",
            "-t",
            "stars",
            "-q",
            "average stars",
        ]);
        assert!(result.is_err());
    }
}
