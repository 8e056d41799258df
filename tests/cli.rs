mod common;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use serde_json::Value as Json;

use common::{REVIEWS_CSV, TestWorkspace};

fn bin() -> Command {
    Command::cargo_bin("nl-analytics").expect("binary exists")
}

#[test]
fn plan_prints_ordered_steps() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    bin()
        .args([
            "plan",
            "-i",
            input.to_str().unwrap(),
            "-q",
            "average rating per month",
        ])
        .assert()
        .success()
        .stdout(contains("group").and(contains("aggregate")))
        .stdout(contains("complexity: moderate"));
}

#[test]
fn plan_json_uses_tagged_steps() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write(
        "schema.yaml",
        "tables:\n  - name: reviews\n    columns:\n      - rating\n      - name: created_at\n        type: timestamp\n",
    );
    let output = bin()
        .args([
            "plan",
            "-s",
            schema.to_str().unwrap(),
            "-q",
            "average rating per month",
            "--db-type",
            "postgres",
            "--json",
        ])
        .output()
        .expect("run plan");
    assert!(output.status.success());
    let plan: Json = serde_json::from_slice(&output.stdout).expect("plan json");
    assert_eq!(plan["db_type"], "postgres");
    let operations = plan["steps"]
        .as_array()
        .expect("steps")
        .iter()
        .map(|step| step["config"]["operation"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert!(operations.contains(&"group".to_string()));
    assert!(operations.contains(&"aggregate".to_string()));
}

#[test]
fn analyze_runs_follow_up_questions_in_one_session() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    bin()
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "-q",
            "average rating by category",
            "-q",
            "and the median?",
        ])
        .assert()
        .success()
        .stdout(contains("avg_rating"))
        .stdout(contains("median_rating"))
        .stdout(contains("kitchen"));
}

#[test]
fn analyze_reports_clarification() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    bin()
        .args(["analyze", "-i", input.to_str().unwrap(), "-q", "hello there"])
        .assert()
        .success()
        .stdout(contains("clarification:"));
}

#[test]
fn analyze_json_emits_execution_result() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    let output = bin()
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "-q",
            "average rating per month",
            "--json",
        ])
        .output()
        .expect("run analyze");
    assert!(output.status.success());
    let outcome: Json = serde_json::from_slice(&output.stdout).expect("outcome json");
    assert_eq!(outcome["status"], "executed");
    assert_eq!(outcome["result"]["success"], true);
    assert_eq!(outcome["result"]["row_count"], 4);
}

#[test]
fn clean_summarises_types_and_nulls() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    bin()
        .args(["clean", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("created_at").and(contains("date")))
        .stdout(contains("Cleaned 8 row(s) across 6 column(s): 2 null(s)"));
}

#[test]
fn clean_honours_semicolon_delimiter() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", &REVIEWS_CSV.replace(',', ";"));
    bin()
        .args(["clean", "-i", input.to_str().unwrap(), "--delimiter", ";"])
        .assert()
        .success()
        .stdout(contains("across 6 column(s)"));
}

#[test]
fn match_resolves_synonyms() {
    bin()
        .args(["match", "-C", "comment,rating", "-t", "stars"])
        .assert()
        .success()
        .stdout(contains("stars -> rating (synonym match"));
}

#[test]
fn match_question_lists_references() {
    bin()
        .args([
            "match",
            "-C",
            "rating,category,created_at",
            "-q",
            "average rating per category",
        ])
        .assert()
        .success()
        .stdout(contains("rating").and(contains("category")).and(contains("exact")));
}

#[test]
fn prompt_emits_hints_and_approach() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    let output = bin()
        .args([
            "prompt",
            "-i",
            input.to_str().unwrap(),
            "-q",
            "average stars per month",
        ])
        .output()
        .expect("run prompt");
    assert!(output.status.success());
    let data: Json = serde_json::from_slice(&output.stdout).expect("prompt json");
    assert_eq!(data["semantic_hints"][0]["column"], "rating");
    assert!(data["suggested_approach"].as_array().is_some_and(|a| !a.is_empty()));
}

#[test]
fn stats_describes_numeric_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    bin()
        .args(["stats", "-i", input.to_str().unwrap(), "-C", "rating"])
        .assert()
        .success()
        .stdout(contains("rating").and(contains("3.4286")));
}

#[test]
fn stats_frequency_counts_categories() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    bin()
        .args([
            "stats",
            "-i",
            input.to_str().unwrap(),
            "-C",
            "category",
            "--frequency",
        ])
        .assert()
        .success()
        .stdout(contains("kitchen").and(contains("62.5%")));
}

#[test]
fn missing_input_fails_with_context() {
    bin()
        .args(["clean", "-i", "does-not-exist.csv"])
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn invalid_config_is_rejected() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("reviews.csv", REVIEWS_CSV);
    let config = workspace.write("engine.yaml", "match_threshold: 2.5\n");
    bin()
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
            "-q",
            "average rating",
        ])
        .assert()
        .failure()
        .stderr(contains("match_threshold"));
}
