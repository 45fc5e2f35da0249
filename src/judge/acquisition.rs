//! Judgment acquisition: structured attempt with a deterministic fallback.
//!
//! `acquire_verdict` never fails. Oracle errors, unparseable replies and
//! out-of-range fields all end in [`Acquisition::Heuristic`] with the reason
//! attached, so a run always completes.

use tracing::{debug, warn};

use crate::oracle::{JudgeOracle, OracleUsage};

use super::assignment::JudgePrompt;
use super::verdict::{parse_verdict, verdict_schema, RawVerdict, RawWinner, VerdictCriteria};

/// Reasoning attached to every heuristic verdict.
pub const FALLBACK_REASONING: &str = "Fallback judgment due to parsing error";
/// Confidence attached to every heuristic verdict.
pub const FALLBACK_CONFIDENCE: f64 = 50.0;
/// Heuristic scores closer than this are a tie.
pub const FALLBACK_TIE_MARGIN: f64 = 5.0;

/// Result of one acquisition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    /// The judge's reply parsed and validated.
    Structured {
        verdict: RawVerdict,
        usage: OracleUsage,
    },
    /// The judge could not be used; the verdict came from the length heuristic.
    Heuristic {
        verdict: RawVerdict,
        reason: String,
        usage: OracleUsage,
    },
}

impl Acquisition {
    pub fn verdict(&self) -> &RawVerdict {
        match self {
            Acquisition::Structured { verdict, .. } | Acquisition::Heuristic { verdict, .. } => {
                verdict
            }
        }
    }

    pub fn usage(&self) -> OracleUsage {
        match self {
            Acquisition::Structured { usage, .. } | Acquisition::Heuristic { usage, .. } => *usage,
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Acquisition::Structured { .. } => None,
            Acquisition::Heuristic { reason, .. } => Some(reason),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Acquisition::Structured { .. } => "structured",
            Acquisition::Heuristic { .. } => "heuristic",
        }
    }

    /// Split into the verdict and the fallback reason, if any.
    pub fn into_parts(self) -> (RawVerdict, Option<String>) {
        match self {
            Acquisition::Structured { verdict, .. } => (verdict, None),
            Acquisition::Heuristic {
                verdict, reason, ..
            } => (verdict, Some(reason)),
        }
    }
}

/// Ask the judge for a verdict, falling back to the heuristic on any failure.
pub async fn acquire_verdict(oracle: &dyn JudgeOracle, prompt: &JudgePrompt) -> Acquisition {
    let schema = verdict_schema();
    let reply = match oracle.judge(prompt, &schema).await {
        Ok(reply) => reply,
        Err(err) => {
            let reason = format!("judge call failed: {err}");
            warn!(
                scenario_id = %prompt.scenario_id,
                error = %err,
                code = err.code(),
                "Judge call failed; using heuristic judgment"
            );
            return heuristic(prompt, reason, OracleUsage::default());
        }
    };

    match parse_verdict(&reply.content) {
        Ok(verdict) => {
            debug!(scenario_id = %prompt.scenario_id, "structured judgment accepted");
            Acquisition::Structured {
                verdict,
                usage: reply.usage,
            }
        }
        Err(err) => {
            warn!(
                scenario_id = %prompt.scenario_id,
                error = %err,
                "Judge reply failed validation; using heuristic judgment"
            );
            heuristic(prompt, format!("invalid verdict: {err}"), reply.usage)
        }
    }
}

fn heuristic(prompt: &JudgePrompt, reason: String, usage: OracleUsage) -> Acquisition {
    Acquisition::Heuristic {
        verdict: fallback_verdict(prompt.response_a(), prompt.response_b()),
        reason,
        usage,
    }
}

/// Length-based score: five points per ten words, capped at 100.
pub fn heuristic_score(text: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    (words / 10.0 * 5.0).min(100.0)
}

/// Deterministic verdict from response lengths alone.
pub fn fallback_verdict(response_a: &str, response_b: &str) -> RawVerdict {
    let a = heuristic_score(response_a);
    let b = heuristic_score(response_b);
    let winner = if (a - b).abs() < FALLBACK_TIE_MARGIN {
        RawWinner::Tie
    } else if a > b {
        RawWinner::A
    } else {
        RawWinner::B
    };

    RawVerdict {
        winner,
        a_overall: a,
        b_overall: b,
        confidence: FALLBACK_CONFIDENCE,
        reasoning: FALLBACK_REASONING.to_string(),
        advantages: Vec::new(),
        criteria: VerdictCriteria::Fallback,
    }
}
