//! Bias-controlled pairwise judging.
//!
//! Flow per scenario: [`AssignmentBuilder`] flips the A/B coin and renders the
//! prompt, [`acquire_verdict`] obtains a [`RawVerdict`] (structured or
//! heuristic), and [`derandomize`] maps it back to a canonical
//! [`JudgmentResult`].

pub mod acquisition;
pub mod assignment;
pub mod mapping;
pub mod verdict;

pub use acquisition::{acquire_verdict, fallback_verdict, heuristic_score, Acquisition};
pub use assignment::{build_judge_prompt, Assignment, AssignmentBuilder, CandidatePair, JudgePrompt};
pub use mapping::{derandomize, CriterionPair, FallbackNote, JudgmentResult, Winner};
pub use verdict::{
    parse_verdict, verdict_schema, Criterion, CriterionScoreSet, RawVerdict, RawWinner,
    VerdictCriteria, VerdictError, FALLBACK_CRITERION, VERDICT_SCHEMA_NAME,
};

use crate::oracle::{JudgeOracle, OracleUsage};

/// Label-free facts about how a judgment was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JudgeCall {
    /// "structured" or "heuristic".
    pub mode: &'static str,
    pub usage: OracleUsage,
}

/// Run acquisition and mapping for one prepared prompt.
pub async fn judge_pair(
    oracle: &dyn JudgeOracle,
    prompt: &JudgePrompt,
    assignment: Assignment,
) -> (JudgmentResult, JudgeCall) {
    let acquisition = acquire_verdict(oracle, prompt).await;
    let call = JudgeCall {
        mode: acquisition.mode(),
        usage: acquisition.usage(),
    };
    let (verdict, reason) = acquisition.into_parts();
    let result = derandomize(
        prompt.scenario_id.clone(),
        verdict,
        assignment,
        reason.map(|reason| FallbackNote { reason }),
    );
    (result, call)
}
