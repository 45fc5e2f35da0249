//! Label mapping from positional verdicts to canonical results.
//!
//! After [`derandomize`] nothing carries the A/B labels or the assignment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::assignment::Assignment;
use super::verdict::{Criterion, RawVerdict, RawWinner, VerdictCriteria, FALLBACK_CRITERION};

/// Which format won a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    FormatOne,
    FormatTwo,
    Tie,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::FormatOne => "format_one",
            Winner::FormatTwo => "format_two",
            Winner::Tie => "tie",
        }
    }
}

/// One criterion's score for both formats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionPair {
    pub format_one: f64,
    pub format_two: f64,
}

/// Diagnostic attached to results that came from the heuristic fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackNote {
    pub reason: String,
}

/// Canonical, format-agnostic judgment for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentResult {
    pub scenario_id: String,
    pub winner: Winner,
    pub confidence: f64,
    pub format_one_score: f64,
    pub format_two_score: f64,
    pub reasoning: String,
    pub criteria_scores: BTreeMap<String, CriterionPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackNote>,
}

impl JudgmentResult {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// `format_two_score - format_one_score`.
    pub fn score_difference(&self) -> f64 {
        self.format_two_score - self.format_one_score
    }
}

impl Assignment {
    /// Map a positional winner to the format it stands for.
    pub fn resolve(&self, winner: RawWinner) -> Winner {
        match (winner, self.format_one_is_a()) {
            (RawWinner::Tie, _) => Winner::Tie,
            (RawWinner::A, true) | (RawWinner::B, false) => Winner::FormatOne,
            (RawWinner::A, false) | (RawWinner::B, true) => Winner::FormatTwo,
        }
    }

    /// Inverse of [`Assignment::resolve`].
    pub fn relabel(&self, winner: Winner) -> RawWinner {
        match (winner, self.format_one_is_a()) {
            (Winner::Tie, _) => RawWinner::Tie,
            (Winner::FormatOne, true) | (Winner::FormatTwo, false) => RawWinner::A,
            (Winner::FormatOne, false) | (Winner::FormatTwo, true) => RawWinner::B,
        }
    }

    fn split<T>(&self, a: T, b: T) -> (T, T) {
        if self.format_one_is_a() {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// Turn a positional verdict into a canonical result.
pub fn derandomize(
    scenario_id: impl Into<String>,
    verdict: RawVerdict,
    assignment: Assignment,
    fallback: Option<FallbackNote>,
) -> JudgmentResult {
    let (format_one_score, format_two_score) =
        assignment.split(verdict.a_overall, verdict.b_overall);

    let criteria_scores = match verdict.criteria {
        VerdictCriteria::Standard { a, b } => {
            let (one, two) = assignment.split(a, b);
            Criterion::ALL
                .iter()
                .map(|criterion| {
                    (
                        criterion.as_str().to_string(),
                        CriterionPair {
                            format_one: one.get(*criterion) as f64,
                            format_two: two.get(*criterion) as f64,
                        },
                    )
                })
                .collect()
        }
        VerdictCriteria::Fallback => BTreeMap::from([(
            FALLBACK_CRITERION.to_string(),
            CriterionPair {
                format_one: format_one_score,
                format_two: format_two_score,
            },
        )]),
    };

    JudgmentResult {
        scenario_id: scenario_id.into(),
        winner: assignment.resolve(verdict.winner),
        confidence: verdict.confidence,
        format_one_score,
        format_two_score,
        reasoning: verdict.reasoning,
        criteria_scores,
        fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::acquisition::fallback_verdict;
    use crate::judge::verdict::CriterionScoreSet;

    fn verdict(winner: RawWinner) -> RawVerdict {
        RawVerdict {
            winner,
            a_overall: 70.0,
            b_overall: 88.0,
            confidence: 80.0,
            reasoning: "x".repeat(60),
            advantages: vec!["clear".to_string()],
            criteria: VerdictCriteria::Standard {
                a: CriterionScoreSet::uniform(70),
                b: CriterionScoreSet::uniform(88),
            },
        }
    }

    #[test]
    fn round_trip_recovers_raw_winner() {
        for format_one_is_a in [true, false] {
            let assignment = Assignment::new(format_one_is_a);
            for raw in RawWinner::ALL {
                let result = derandomize("s", verdict(raw), assignment, None);
                assert_eq!(assignment.relabel(result.winner), raw);
            }
        }
    }

    #[test]
    fn mapping_is_a_bijection_per_assignment() {
        for format_one_is_a in [true, false] {
            let assignment = Assignment::new(format_one_is_a);
            let mut seen: Vec<Winner> = RawWinner::ALL
                .iter()
                .map(|raw| assignment.resolve(*raw))
                .collect();
            seen.sort_by_key(|w| w.as_str());
            seen.dedup();
            assert_eq!(seen.len(), 3);
        }
    }

    #[test]
    fn format_one_as_a_copies_straight() {
        let result = derandomize("s", verdict(RawWinner::B), Assignment::new(true), None);
        assert_eq!(result.winner, Winner::FormatTwo);
        assert_eq!(result.format_one_score, 70.0);
        assert_eq!(result.format_two_score, 88.0);
        let pair = result.criteria_scores["precision_specificity"];
        assert_eq!(pair.format_one, 70.0);
        assert_eq!(pair.format_two, 88.0);
        assert_eq!(result.criteria_scores.len(), 5);
    }

    #[test]
    fn format_one_as_b_mirrors() {
        let result = derandomize("s", verdict(RawWinner::B), Assignment::new(false), None);
        assert_eq!(result.winner, Winner::FormatOne);
        assert_eq!(result.format_one_score, 88.0);
        assert_eq!(result.format_two_score, 70.0);
        let pair = result.criteria_scores["contextual_understanding"];
        assert_eq!(pair.format_one, 88.0);
        assert_eq!(pair.format_two, 70.0);
        assert_eq!(result.score_difference(), -18.0);
    }

    #[test]
    fn fallback_collapses_to_single_criterion() {
        let raw = fallback_verdict(&"w ".repeat(40), &"w ".repeat(200));
        let note = FallbackNote {
            reason: "invalid verdict".to_string(),
        };
        let result = derandomize("s", raw, Assignment::new(false), Some(note));
        assert!(result.is_fallback());
        assert_eq!(result.winner, Winner::FormatOne);
        assert_eq!(result.format_one_score, 100.0);
        assert_eq!(result.format_two_score, 20.0);
        let keys: Vec<&String> = result.criteria_scores.keys().collect();
        assert_eq!(keys, vec!["fallback"]);
    }

    #[test]
    fn serialized_result_has_no_positional_fields() {
        let result = derandomize("s", verdict(RawWinner::A), Assignment::new(false), None);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"winner\":\"format_two\""));
        assert!(!json.contains("format_one_is_a"));
        assert!(!json.contains("response_a"));
        assert!(!json.contains("fallback"));
    }
}
