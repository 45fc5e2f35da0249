use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::tempdir;

fn formatbench(args: &[&str], extra: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_formatbench"))
        .args(args)
        .args(extra)
        .env("RUST_LOG", "warn")
        .env_remove("OPENROUTER_API_KEY")
        .output()
        .unwrap()
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn catalog() -> Value {
    json!([
        {
            "id": "pipeline_config",
            "task": "Which stage runs first?",
            "rubric": ["Names the stage"],
            "category": "structured_advantage",
            "data": { "stages": [{ "name": "build" }, { "name": "test" }] }
        },
        {
            "name": "tea_notes",
            "task": "Suggest a tea.",
            "category": "neutral",
            "data": { "preference": "green" }
        },
        {
            "id": "calc",
            "task": "Add the numbers.",
            "data": { "values": [1, 2, 3] }
        }
    ])
}

fn judgment(id: &str, winner: &str, one: f64, two: f64) -> Value {
    json!({
        "scenario_id": id,
        "winner": winner,
        "confidence": 80.0,
        "format_one_score": one,
        "format_two_score": two,
        "reasoning": "Scored for the smoke test.",
        "criteria_scores": {
            "accuracy_completeness": { "format_one": one, "format_two": two }
        }
    })
}

fn report(judgments: Vec<Value>) -> Value {
    json!({
        "metadata": {
            "report_id": "6f1c1bde-3a3e-4f57-9d6b-2c1a8f0f4b11",
            "test_type": "indented_vs_markup",
            "framework_version": "0.1.0",
            "response_model": "test/responder",
            "judge_model": "test/judge",
            "seed": 42,
            "scenario_ids": ["pipeline_config", "tea_notes", "calc", "extra"],
            "timestamp": "2025-03-04T05:06:07Z"
        },
        "responses": [],
        "judgments": judgments,
        "failed_scenarios": [],
        "summary": {},
        "statistics": null
    })
}

#[test]
fn list_cases_prints_ids_and_categories() {
    let dir = tempdir().unwrap();
    let path = write_json(dir.path(), "catalog.json", &catalog());

    let out = formatbench(&["list-cases", "--catalog"], &[&path]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "pipeline_config\tstructured_advantage",
            "tea_notes\tneutral",
            "calc\tuncategorized",
        ]
    );
}

#[test]
fn bundled_catalog_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/catalog.json");
    let out = formatbench(&["list-cases", "--catalog"], &[&path]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.lines().count() >= 20);
    assert!(stdout.contains("\tstructured_advantage"));
}

#[test]
fn duplicate_ids_are_rejected() {
    let dir = tempdir().unwrap();
    let mut scenarios = catalog();
    scenarios[2]["id"] = json!("pipeline_config");
    let path = write_json(dir.path(), "catalog.json", &scenarios);

    let out = formatbench(&["list-cases", "--catalog"], &[&path]);
    assert!(!out.status.success());
}

#[test]
fn run_without_api_key_fails_before_any_call() {
    let dir = tempdir().unwrap();
    let path = write_json(dir.path(), "catalog.json", &catalog());
    let out_path = dir.path().join("report.json");

    let out = formatbench(&["run", "--catalog"], &[&path]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("OPENROUTER_API_KEY"));
    assert!(!out_path.exists());
}

#[test]
fn run_rejects_unknown_judge_template() {
    let dir = tempdir().unwrap();
    let path = write_json(dir.path(), "catalog.json", &catalog());

    let out = formatbench(&["run", "--judge-template", "nope_v9", "--catalog"], &[&path]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("nope_v9"));
    assert!(stderr.contains("format_judge_v1"));
}

#[test]
fn analyze_recomputes_summary_statistics_and_reliability() {
    let dir = tempdir().unwrap();
    let catalog_path = write_json(dir.path(), "catalog.json", &catalog());
    let report_path = write_json(
        dir.path(),
        "report.json",
        &report(vec![
            judgment("pipeline_config", "format_two", 70.0, 85.0),
            judgment("tea_notes", "format_two", 80.0, 88.0),
            judgment("calc", "format_two", 75.0, 80.0),
            judgment("extra", "format_one", 72.0, 70.0),
        ]),
    );
    let reliability_path = write_json(
        dir.path(),
        "matrix.json",
        &json!([[80.0, 82.0], [70.0, 71.0], [90.0, 88.0]]),
    );
    let out_path = dir.path().join("analysis.json");

    let out = Command::new(env!("CARGO_BIN_EXE_formatbench"))
        .arg("analyze")
        .arg("--report")
        .arg(&report_path)
        .arg("--catalog")
        .arg(&catalog_path)
        .arg("--reliability")
        .arg(&reliability_path)
        .arg("--out")
        .arg(&out_path)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );

    let analysis: Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(
        analysis["source_report_id"],
        "6f1c1bde-3a3e-4f57-9d6b-2c1a8f0f4b11"
    );

    let summary = &analysis["summary"];
    assert_eq!(summary["outcomes"]["format_two_wins"], 3);
    assert_eq!(summary["outcomes"]["format_one_wins"], 1);
    assert_eq!(summary["scores"]["advantage"], 6.5);
    assert_eq!(summary["fallback_count"], 0);
    assert_eq!(
        summary["categories"]["neutral"]["scenario_ids"],
        json!(["tea_notes"])
    );
    assert_eq!(
        summary["categories"]["unknown"]["scenario_ids"],
        json!(["extra"])
    );

    let statistics = &analysis["statistics"];
    assert_eq!(statistics["study_design"]["sample_size"], 4);
    assert_eq!(statistics["study_design"]["random_seed_used"], true);
    assert_eq!(statistics["paired_t_test"]["degrees_freedom"], 3);
    assert_eq!(statistics["inter_rater_reliability"]["n_judges"], 2);
    assert_eq!(statistics["inter_rater_reliability"]["n_cases"], 3);
    assert!(analysis.get("inter_rater_reliability").is_none());
}

#[test]
fn analyze_single_judgment_skips_statistics_with_note() {
    let dir = tempdir().unwrap();
    let report_path = write_json(
        dir.path(),
        "report.json",
        &report(vec![judgment("calc", "tie", 80.0, 80.0)]),
    );

    let out = formatbench(&["analyze", "--report"], &[&report_path]);
    assert!(out.status.success());
    let analysis: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(analysis["statistics"].is_null());
    assert!(analysis["statistics_note"].is_string());
    assert_eq!(analysis["summary"]["outcomes"]["ties"], 1);
}
