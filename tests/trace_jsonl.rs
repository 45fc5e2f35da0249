use std::sync::Arc;

use async_trait::async_trait;
use formatbench::gateway::ProviderError;
use formatbench::judge::{JudgePrompt, Winner};
use formatbench::{
    EvaluationConfig, Evaluator, JsonlTraceSink, JudgeOracle, JudgmentTrace, OracleReply,
    OracleUsage, ResponderOracle, Scenario, TraceSink,
};
use serde_json::{json, Value};
use tempfile::tempdir;

fn make_trace(scenario_index: usize, fallback: bool) -> JudgmentTrace {
    JudgmentTrace {
        timestamp_ms: 0,
        scenario_index,
        scenario_id: format!("case_{scenario_index}"),
        judge_model: "anthropic/claude-3.5-sonnet".to_string(),
        template_slug: "format_judge_v1".to_string(),
        prompt_hash: "prompt_hash".to_string(),
        mode: if fallback { "heuristic" } else { "structured" }.to_string(),
        fallback_reason: fallback.then(|| "invalid verdict: parse error".to_string()),
        winner: Winner::FormatTwo,
        format_one_score: 74.0,
        format_two_score: 86.0,
        confidence: 80.0,
        input_tokens: 900,
        output_tokens: 250,
        cost_nanodollars: 4_200,
    }
}

#[test]
fn jsonl_trace_sink_writes_rows_and_flushes_on_join() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    let (sink, worker) = JsonlTraceSink::new(&path).unwrap();
    sink.record(make_trace(0, false)).unwrap();
    sink.record(make_trace(1, true)).unwrap();

    drop(sink);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<JudgmentTrace> = raw
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows, vec![make_trace(0, false), make_trace(1, true)]);

    let first: Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert_eq!(first["winner"], "format_two");
    assert!(first["fallback_reason"].is_null());
}

struct EchoResponder;

#[async_trait]
impl ResponderOracle for EchoResponder {
    fn model(&self) -> &str {
        "test/responder"
    }

    async fn respond(&self, _scenario_id: &str, prompt: &str) -> Result<OracleReply, ProviderError> {
        Ok(OracleReply {
            content: format!("answer covering {} characters of input", prompt.len()),
            usage: OracleUsage::default(),
        })
    }
}

/// Never produces a valid verdict, so every row is heuristic.
struct SilentJudge;

#[async_trait]
impl JudgeOracle for SilentJudge {
    fn model(&self) -> &str {
        "test/judge"
    }

    async fn judge(
        &self,
        _prompt: &JudgePrompt,
        _schema: &Value,
    ) -> Result<OracleReply, ProviderError> {
        Ok(OracleReply {
            content: "no opinion".to_string(),
            usage: OracleUsage {
                input_tokens: 7,
                output_tokens: 2,
                cost_nanodollars: 3,
            },
        })
    }
}

#[tokio::test]
async fn evaluator_writes_one_label_free_row_per_judged_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.jsonl");

    let scenarios: Vec<Scenario> = (0..3)
        .map(|i| Scenario {
            id: format!("case_{i}"),
            description: String::new(),
            task: "Explain the setting.".to_string(),
            rubric: Vec::new(),
            category: "neutral".to_string(),
            data: json!({ "setting": { "level": i } }),
        })
        .collect();

    let (sink, worker) = JsonlTraceSink::new(&path).unwrap();
    let config = EvaluationConfig {
        seed: Some(5),
        ..EvaluationConfig::default()
    };
    let evaluator = Evaluator::new(Arc::new(EchoResponder), Arc::new(SilentJudge), config)
        .with_trace(Arc::new(sink.clone()) as Arc<dyn TraceSink>);

    let report = evaluator.run(&scenarios, None).await.unwrap();
    drop(evaluator);
    drop(sink);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<JudgmentTrace> = raw
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), report.judgments.len());
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.scenario_index, i);
        assert_eq!(row.scenario_id, format!("case_{i}"));
        assert_eq!(row.judge_model, "test/judge");
        assert_eq!(row.mode, "heuristic");
        assert!(row.fallback_reason.is_some());
        assert_eq!(row.input_tokens, 7);
        assert_eq!(row.cost_nanodollars, 3);
    }

    for line in raw.lines() {
        let row: Value = serde_json::from_str(line).unwrap();
        let keys: Vec<&str> = row.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(keys.iter().all(|k| !k.contains("_a") && !k.contains("_b")));
        assert_ne!(row["winner"], "A");
        assert_ne!(row["winner"], "B");
    }
}
