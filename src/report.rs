//! Evaluation report persistence.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{AggregateSummary, StatisticalReport};
use crate::gateway::UsageTotals;
use crate::judge::JudgmentResult;

pub const TEST_TYPE: &str = "indented_vs_markup";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_id: Uuid,
    pub test_type: String,
    pub framework_version: String,
    pub response_model: String,
    pub judge_model: String,
    #[serde(default)]
    pub seed: Option<u64>,
    pub scenario_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageTotals>,
}

impl ReportMetadata {
    pub fn new(
        response_model: impl Into<String>,
        judge_model: impl Into<String>,
        seed: Option<u64>,
        scenario_ids: Vec<String>,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            test_type: TEST_TYPE.to_string(),
            framework_version: env!("CARGO_PKG_VERSION").to_string(),
            response_model: response_model.into(),
            judge_model: judge_model.into(),
            seed,
            scenario_ids,
            timestamp: Utc::now(),
            usage: None,
        }
    }
}

/// Both prompts and both answers for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub scenario_id: String,
    pub format_one_prompt: String,
    pub format_two_prompt: String,
    pub format_one_response: String,
    pub format_two_response: String,
    pub format_one_prompt_chars: usize,
    pub format_two_prompt_chars: usize,
}

impl ResponseRecord {
    pub fn new(
        scenario_id: impl Into<String>,
        format_one_prompt: String,
        format_two_prompt: String,
        format_one_response: String,
        format_two_response: String,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            format_one_prompt_chars: format_one_prompt.chars().count(),
            format_two_prompt_chars: format_two_prompt.chars().count(),
            format_one_prompt,
            format_two_prompt,
            format_one_response,
            format_two_response,
        }
    }
}

/// A scenario dropped because a response could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedScenario {
    pub scenario_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub metadata: ReportMetadata,
    pub responses: Vec<ResponseRecord>,
    pub judgments: Vec<JudgmentResult>,
    pub failed_scenarios: Vec<FailedScenario>,
    pub summary: AggregateSummary,
    pub statistics: Option<StatisticalReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_note: Option<String>,
}

/// The parts of a saved report that `analyze` re-reads.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedJudgments {
    pub metadata: ReportMetadata,
    pub judgments: Vec<JudgmentResult>,
}

/// `formatbench_<response>[_judge_<judge>]_<YYYYmmdd_HHMMSS>.json`.
pub fn default_report_filename(metadata: &ReportMetadata) -> String {
    let response = sanitize_model(&metadata.response_model);
    let judge = sanitize_model(&metadata.judge_model);
    let stamp = metadata.timestamp.format("%Y%m%d_%H%M%S");
    if response == judge {
        format!("formatbench_{response}_{stamp}.json")
    } else {
        format!("formatbench_{response}_judge_{judge}_{stamp}.json")
    }
}

fn sanitize_model(model: &str) -> String {
    model.replace(|c: char| matches!(c, '/' | '-' | ':' | '.'), "_")
}

/// Write the report as pretty JSON. `path` defaults to
/// [`default_report_filename`] in the working directory.
pub fn write_report(
    report: &EvaluationReport,
    path: Option<&Path>,
) -> Result<PathBuf, ReportError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default_report_filename(&report.metadata)),
    };
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

pub fn load_judgments(path: impl AsRef<Path>) -> Result<SavedJudgments, ReportError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&raw)?)
}
