//! Fold canonical judgments into win rates, score means and breakdowns.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::judge::{JudgmentResult, Winner};

use super::{mean, AnalysisError};

/// Whether heuristic-judged results feed the per-criterion table.
///
/// Heuristic results only carry the synthetic "fallback" criterion, so they
/// never contribute to the five standard criteria either way. `Exclude` also
/// keeps them from deciding which criteria are listed; `Include` reproduces the
/// plain "criteria of the first result" rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCriteriaPolicy {
    #[default]
    Exclude,
    Include,
}

/// Win/tie tallies with rates as fractions of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub format_one_wins: usize,
    pub format_two_wins: usize,
    pub ties: usize,
    pub format_one_win_rate: f64,
    pub format_two_win_rate: f64,
    pub tie_rate: f64,
}

impl OutcomeCounts {
    fn tally<'a>(results: impl IntoIterator<Item = &'a JudgmentResult>) -> Self {
        let (mut one, mut two, mut ties) = (0usize, 0usize, 0usize);
        for result in results {
            match result.winner {
                Winner::FormatOne => one += 1,
                Winner::FormatTwo => two += 1,
                Winner::Tie => ties += 1,
            }
        }
        let total = one + two + ties;
        let rate = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };
        Self {
            total,
            format_one_wins: one,
            format_two_wins: two,
            ties,
            format_one_win_rate: rate(one),
            format_two_win_rate: rate(two),
            tie_rate: rate(ties),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub format_one_mean: f64,
    pub format_two_mean: f64,
    /// `format_two_mean - format_one_mean`.
    pub advantage: f64,
    pub average_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriterionSummary {
    pub format_one_mean: f64,
    pub format_two_mean: f64,
    pub advantage: f64,
    /// Results that contributed.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub outcomes: OutcomeCounts,
    pub format_one_mean: f64,
    pub format_two_mean: f64,
    pub advantage: f64,
    pub scenario_ids: Vec<String>,
}

/// Compact per-result line, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDetail {
    pub scenario_id: String,
    pub winner: Winner,
    pub confidence: f64,
    pub score_difference: f64,
    pub fallback: bool,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub outcomes: OutcomeCounts,
    pub scores: ScoreSummary,
    pub fallback_count: usize,
    pub fallback_rate: f64,
    pub criteria_policy: FallbackCriteriaPolicy,
    pub criteria: BTreeMap<String, CriterionSummary>,
    /// Empty when no category map was supplied.
    pub categories: BTreeMap<String, CategorySummary>,
    pub details: Vec<ResultDetail>,
}

/// Category assigned to results whose scenario is missing from the map.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Summarize a run. Pure: the same input always yields the same summary.
pub fn aggregate(
    results: &[JudgmentResult],
    categories: Option<&HashMap<String, String>>,
    policy: FallbackCriteriaPolicy,
) -> Result<AggregateSummary, AnalysisError> {
    if results.is_empty() {
        return Err(AnalysisError::EmptyInput("judgment results"));
    }

    let outcomes = OutcomeCounts::tally(results);
    let one: Vec<f64> = results.iter().map(|r| r.format_one_score).collect();
    let two: Vec<f64> = results.iter().map(|r| r.format_two_score).collect();
    let confidences: Vec<f64> = results.iter().map(|r| r.confidence).collect();
    let (format_one_mean, format_two_mean) = (mean(&one), mean(&two));

    let fallback_count = results.iter().filter(|r| r.is_fallback()).count();

    Ok(AggregateSummary {
        outcomes,
        scores: ScoreSummary {
            format_one_mean,
            format_two_mean,
            advantage: format_two_mean - format_one_mean,
            average_confidence: mean(&confidences),
        },
        fallback_count,
        fallback_rate: fallback_count as f64 / results.len() as f64,
        criteria_policy: policy,
        criteria: criteria_breakdown(results, policy),
        categories: categories
            .map(|map| category_breakdown(results, map))
            .unwrap_or_default(),
        details: results
            .iter()
            .map(|r| ResultDetail {
                scenario_id: r.scenario_id.clone(),
                winner: r.winner,
                confidence: r.confidence,
                score_difference: r.score_difference(),
                fallback: r.is_fallback(),
                reasoning: r.reasoning.clone(),
            })
            .collect(),
    })
}

fn criteria_breakdown(
    results: &[JudgmentResult],
    policy: FallbackCriteriaPolicy,
) -> BTreeMap<String, CriterionSummary> {
    let pool: Vec<&JudgmentResult> = results
        .iter()
        .filter(|r| policy == FallbackCriteriaPolicy::Include || !r.is_fallback())
        .collect();

    let Some(first) = pool.first() else {
        return BTreeMap::new();
    };

    first
        .criteria_scores
        .keys()
        .filter_map(|name| {
            let pairs: Vec<_> = pool
                .iter()
                .filter_map(|r| r.criteria_scores.get(name))
                .collect();
            if pairs.is_empty() {
                return None;
            }
            let one: Vec<f64> = pairs.iter().map(|p| p.format_one).collect();
            let two: Vec<f64> = pairs.iter().map(|p| p.format_two).collect();
            let (one_mean, two_mean) = (mean(&one), mean(&two));
            Some((
                name.clone(),
                CriterionSummary {
                    format_one_mean: one_mean,
                    format_two_mean: two_mean,
                    advantage: two_mean - one_mean,
                    count: pairs.len(),
                },
            ))
        })
        .collect()
}

fn category_breakdown(
    results: &[JudgmentResult],
    categories: &HashMap<String, String>,
) -> BTreeMap<String, CategorySummary> {
    let mut groups: BTreeMap<String, Vec<&JudgmentResult>> = BTreeMap::new();
    for result in results {
        let category = categories
            .get(&result.scenario_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY);
        groups.entry(category.to_string()).or_default().push(result);
    }

    groups
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(category, members)| {
            let one: Vec<f64> = members.iter().map(|r| r.format_one_score).collect();
            let two: Vec<f64> = members.iter().map(|r| r.format_two_score).collect();
            let (one_mean, two_mean) = (mean(&one), mean(&two));
            let summary = CategorySummary {
                outcomes: OutcomeCounts::tally(members.iter().copied()),
                format_one_mean: one_mean,
                format_two_mean: two_mean,
                advantage: two_mean - one_mean,
                scenario_ids: members.iter().map(|r| r.scenario_id.clone()).collect(),
            };
            (category, summary)
        })
        .collect()
}
