pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod grouping;
pub mod insights;
pub mod intent;
pub mod io_utils;
pub mod matcher;
pub mod plan;
pub mod planner;
pub mod prompt;
pub mod schema;
pub mod session;
pub mod stats;
pub mod table;
pub mod window;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    clean::clean_dataset,
    cli::{Cli, Commands},
    data::Row,
    engine::{AnalysisOutcome, AnalyticsEngine, ColumnHeuristics},
    matcher::{extract_column_references_with_threshold, find_best_column_match},
    planner::create_execution_plan,
    schema::Schema,
    session::SessionState,
    table::{print_rows, render_rows},
};

pub use crate::{
    config::EngineOptions,
    data::Value,
    error::AnalyticsError,
    intent::Intent,
    plan::ExecutionPlan,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("nl_analytics", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Plan(args) => handle_plan(&args),
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Clean(args) => handle_clean(&args),
        Commands::Match(args) => handle_match(&args),
        Commands::Prompt(args) => handle_prompt(&args),
        Commands::Stats(args) => handle_stats(&args),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output as JSON")?;
    println!("{rendered}");
    Ok(())
}

fn resolve_schema(source: &cli::SourceArgs) -> Result<Schema> {
    if let Some(path) = &source.schema {
        return io_utils::load_schema(path);
    }
    let input = source
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("Either --schema or --input is required"))?;
    dataset_schema(input, &io_utils::load_dataset(input, source.delimiter)?)
}

fn dataset_schema(path: &Path, rows: &[Row]) -> Result<Schema> {
    let schema = Schema::from_rows(&io_utils::table_name(path), rows);
    if schema.is_empty() {
        bail!("No columns found in {path:?}");
    }
    Ok(schema)
}

fn handle_plan(args: &cli::PlanArgs) -> Result<()> {
    let engine = AnalyticsEngine::new(io_utils::load_options(args.config.as_deref())?);
    let schema = resolve_schema(&args.source)?;
    let intent = engine.parse_intent(&args.question, &schema);
    if intent.clarification_needed && !args.json {
        println!(
            "clarification: {}",
            intent.clarification_question.as_deref().unwrap_or_default()
        );
        return Ok(());
    }
    let plan = create_execution_plan(&intent, &args.db_type);
    info!(
        "Planned {} step(s), complexity {}",
        plan.steps.len(),
        plan.complexity
    );
    if args.json {
        return print_json(&plan);
    }
    let rows = plan
        .steps
        .iter()
        .enumerate()
        .map(|(idx, step)| {
            Row::from_pairs([
                ("#", Value::Integer(idx as i64 + 1)),
                ("operation", Value::from(step.operation().to_string())),
                ("description", Value::from(step.description.as_str())),
            ])
        })
        .collect::<Vec<_>>();
    print_rows(&rows);
    println!(
        "complexity: {} (score {})",
        plan.complexity, plan.complexity_score
    );
    Ok(())
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let mut options = io_utils::load_options(args.config.as_deref())?;
    if args.raw {
        options.clean.infer_types = false;
        options.clean.normalize_text = false;
    }
    let engine = AnalyticsEngine::new(options);
    let dataset = io_utils::load_dataset(&args.input, args.delimiter)?;
    let schema = match &args.schema {
        Some(path) => io_utils::load_schema(path)?,
        None => dataset_schema(&args.input, &dataset)?,
    };
    info!(
        "Analyzing {} question(s) over {} row(s) from {:?}",
        args.questions.len(),
        dataset.len(),
        args.input
    );

    let mut session = SessionState::new();
    for question in &args.questions {
        let outcome = engine.analyze_query(&mut session, question, &schema, &dataset, &args.db_type);
        if args.json {
            print_json(&outcome)?;
        } else {
            print_outcome(question, &outcome);
        }
        if let AnalysisOutcome::Executed { result, .. } = &outcome
            && !result.success
        {
            bail!(
                "Analysis of '{question}' failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    debug!("Session recorded {} turn(s)", session.turns());
    Ok(())
}

fn print_outcome(question: &str, outcome: &AnalysisOutcome) {
    println!("> {question}");
    match outcome {
        AnalysisOutcome::Clarification { question, .. } => {
            println!("clarification: {question}");
        }
        AnalysisOutcome::Executed { plan, result } => {
            println!(
                "plan: {} ({})",
                plan.operations().iter().join(" -> "),
                plan.complexity
            );
            if !result.data.is_empty() {
                print!("{}", render_rows(&result.data));
            }
            for insight in &result.insights {
                println!("* {insight}");
            }
        }
    }
}

fn handle_clean(args: &cli::CleanArgs) -> Result<()> {
    let options = io_utils::load_options(args.config.as_deref())?;
    let dataset = io_utils::load_dataset(&args.input, args.delimiter)?;
    let cleaned = clean_dataset(&dataset, &options.clean);
    info!("{}", cleaned.report.describe());
    if args.json {
        return print_json(&cleaned);
    }
    let rows = cleaned
        .column_types
        .iter()
        .map(|profile| {
            Row::from_pairs([
                ("column", Value::from(profile.column.as_str())),
                ("type", Value::from(profile.info.kind.to_string())),
                ("confidence", Value::from(format!("{:.2}", profile.info.confidence))),
            ])
        })
        .collect::<Vec<_>>();
    print_rows(&rows);
    println!("{}", cleaned.report.describe());
    if args.rows {
        print!("{}", render_rows(&cleaned.rows));
    }
    Ok(())
}

fn handle_match(args: &cli::MatchArgs) -> Result<()> {
    let threshold = args
        .threshold
        .unwrap_or(EngineOptions::default().match_threshold);
    let columns = args
        .columns
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    debug!("Matching against columns: {columns:?}");

    if let Some(term) = &args.term {
        let found = find_best_column_match(term, &columns, threshold);
        if args.json {
            return print_json(&found);
        }
        match &found.column {
            Some(column) => println!(
                "{term} -> {column} ({} match, score {:.2})",
                found.kind, found.score
            ),
            None => println!("{term} -> no match"),
        }
        return Ok(());
    }

    let question = args
        .question
        .as_deref()
        .ok_or_else(|| anyhow!("Either --term or --question is required"))?;
    let references = extract_column_references_with_threshold(question, &columns, threshold);
    if args.json {
        return print_json(&references);
    }
    let rows = references
        .iter()
        .map(|reference| {
            Row::from_pairs([
                ("term", Value::from(reference.term.as_str())),
                ("column", Value::from(reference.column.as_str())),
                ("kind", Value::from(reference.kind.as_str())),
                ("score", Value::from(format!("{:.2}", reference.score))),
            ])
        })
        .collect::<Vec<_>>();
    print_rows(&rows);
    Ok(())
}

fn handle_prompt(args: &cli::PromptArgs) -> Result<()> {
    let engine = AnalyticsEngine::new(io_utils::load_options(args.config.as_deref())?);
    let schema = resolve_schema(&args.source)?;
    print_json(&engine.get_enhanced_prompt_data(&args.question, &schema))
}

fn handle_stats(args: &cli::StatsArgs) -> Result<()> {
    let dataset = io_utils::load_dataset(&args.input, args.delimiter)?;
    let cleaned = clean_dataset(&dataset, &EngineOptions::default().clean);
    let rows = cleaned.rows;
    let columns = if args.columns.is_empty() {
        ColumnHeuristics::numeric_columns(&rows)
    } else {
        args.columns.clone()
    };
    if let Some(missing) = columns
        .iter()
        .find(|column| !rows.iter().any(|row| row.contains(column)))
    {
        bail!("Column '{missing}' not found in {:?}", args.input);
    }
    if columns.is_empty() {
        bail!("No numeric columns found in {:?}", args.input);
    }

    if args.frequency {
        return print_frequencies(&rows, &columns, args);
    }

    let summaries = columns
        .iter()
        .map(|column| (column.clone(), stats::describe(&stats::column_numbers(&rows, column))))
        .collect::<Vec<_>>();
    if args.json {
        return print_json(&summaries);
    }
    let table = summaries
        .iter()
        .map(|(column, summary)| {
            Row::from_pairs([
                ("column", Value::from(column.as_str())),
                ("count", Value::Integer(summary.count as i64)),
                ("mean", summary.mean.into()),
                ("median", summary.median.into()),
                ("std_dev", Value::Float(summary.std_dev)),
                ("min", summary.min.into()),
                ("max", summary.max.into()),
                ("q1", summary.quartiles.map(|q| q.q1).into()),
                ("q3", summary.quartiles.map(|q| q.q3).into()),
            ])
        })
        .collect::<Vec<_>>();
    print_rows(&table);
    Ok(())
}

fn print_frequencies(rows: &[Row], columns: &[String], args: &cli::StatsArgs) -> Result<()> {
    let counts = columns
        .iter()
        .map(|column| {
            let values = rows.iter().map(|row| row.value(column).clone()).collect::<Vec<_>>();
            let mut counts = stats::value_counts(&values, true);
            if args.top > 0 {
                counts.truncate(args.top);
            }
            (column.clone(), counts)
        })
        .collect::<Vec<_>>();
    if args.json {
        return print_json(&counts);
    }
    let table = counts
        .iter()
        .flat_map(|(column, counts)| {
            counts.iter().map(move |entry| {
                Row::from_pairs([
                    ("column", Value::from(column.as_str())),
                    ("value", entry.value.clone()),
                    ("count", Value::Integer(entry.count as i64)),
                    (
                        "percent",
                        entry.percentage.map(|p| format!("{p:.1}%")).into(),
                    ),
                ])
            })
        })
        .collect::<Vec<_>>();
    print_rows(&table);
    Ok(())
}
