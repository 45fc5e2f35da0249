#![forbid(unsafe_code)]

//! # formatbench
//!
//! Does a model answer better when its structured input is rendered as nested
//! markup tags than as indented `key: value` text?
//!
//! Each scenario is rendered both ways, a responder model answers both, and a
//! judge model compares the two answers blind: the A/B order is drawn from a
//! seeded RNG per comparison and mapped back to the formats only after the
//! verdict is in. Verdicts that fail validation fall back to a deterministic
//! length heuristic so a run always completes. Results are aggregated into win
//! rates and per-criterion deltas, and tested for effect size, significance and
//! power.

pub mod analysis;
pub mod config;
pub mod gateway;
pub mod judge;
pub mod oracle;
pub mod prompts;
pub mod render;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod trace;

pub use analysis::{
    aggregate, inter_rater_reliability, AggregateSummary, AnalysisError, FallbackCriteriaPolicy,
    ReliabilityReport, StatisticalReport,
};
pub use config::{ConfigError, EvaluationConfig};
pub use gateway::{Attribution, ChatGateway, ProviderError, ProviderGateway, UsageSink};
pub use judge::{
    judge_pair, Assignment, AssignmentBuilder, CandidatePair, JudgmentResult, Winner,
};
pub use oracle::{ChatOracle, JudgeOracle, OracleReply, OracleUsage, ResponderOracle};
pub use render::Format;
pub use report::{EvaluationReport, ReportError};
pub use runner::{Evaluator, RunError};
pub use scenario::{Scenario, ScenarioCatalog, ScenarioError, ScenarioFilter};
pub use trace::{JsonlTraceSink, JudgmentTrace, TraceError, TraceSink, TraceWorker};
