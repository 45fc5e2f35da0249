//! Effect size, significance and power for paired format scores.
//!
//! All functions are pure. Degenerate-but-valid inputs (zero variance, tiny
//! samples) produce defined values; malformed inputs produce [`AnalysisError`].

use serde::Serialize;
use statrs::distribution::{Binomial, ContinuousCDF, Discrete, StudentsT};

use crate::judge::{Criterion, JudgmentResult, Winner};

use super::reliability::ReliabilityReport;
use super::{mean, sample_std, AnalysisError};

pub const ALPHA: f64 = 0.05;
const TWO_SIDED_QUANTILE: f64 = 1.0 - ALPHA / 2.0;
/// Relative slack when comparing binomial probabilities for "as likely as".
const BINOMIAL_RELATIVE_TOLERANCE: f64 = 1e-7;
pub const NULL_HYPOTHESIS: &str = "Equal probability of winning (p = 0.5)";
pub const POWER_UNAVAILABLE: &str = "Power calculation unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    pub fn from_d(d: f64) -> Self {
        let d = d.abs();
        if d < 0.2 {
            EffectMagnitude::Negligible
        } else if d < 0.5 {
            EffectMagnitude::Small
        } else if d < 0.8 {
            EffectMagnitude::Medium
        } else {
            EffectMagnitude::Large
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectSize {
    pub cohens_d: f64,
    pub interpretation: EffectMagnitude,
    /// `mean(group2) - mean(group1)`.
    pub mean_difference: f64,
    pub pooled_std: f64,
}

/// Cohen's d of `group2` over `group1` with the pooled sample deviation.
pub fn calculate_effect_size(group1: &[f64], group2: &[f64]) -> Result<EffectSize, AnalysisError> {
    for group in [group1, group2] {
        if group.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                what: "effect size group",
                needed: 2,
                got: group.len(),
            });
        }
    }

    let (n1, n2) = (group1.len() as f64, group2.len() as f64);
    let (s1, s2) = (sample_std(group1), sample_std(group2));
    let pooled_std =
        (((n1 - 1.0) * s1.powi(2) + (n2 - 1.0) * s2.powi(2)) / (n1 + n2 - 2.0)).sqrt();
    let mean_difference = mean(group2) - mean(group1);
    let cohens_d = if pooled_std == 0.0 {
        0.0
    } else {
        mean_difference / pooled_std
    };

    Ok(EffectSize {
        cohens_d,
        interpretation: EffectMagnitude::from_d(cohens_d),
        mean_difference,
        pooled_std,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairedTTest {
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub degrees_freedom: usize,
    pub mean_difference: f64,
    /// 95% interval for the mean difference.
    pub confidence_interval: (f64, f64),
}

/// Two-tailed paired t-test on `scores_b - scores_a`.
pub fn paired_t_test(scores_a: &[f64], scores_b: &[f64]) -> Result<PairedTTest, AnalysisError> {
    if scores_a.len() != scores_b.len() {
        return Err(AnalysisError::LengthMismatch {
            left: scores_a.len(),
            right: scores_b.len(),
        });
    }
    let n = scores_a.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientData {
            what: "paired t-test",
            needed: 2,
            got: n,
        });
    }

    let differences: Vec<f64> = scores_a
        .iter()
        .zip(scores_b)
        .map(|(a, b)| b - a)
        .collect();
    let df = n - 1;
    let mean_difference = mean(&differences);
    let sem = sample_std(&differences) / (n as f64).sqrt();

    if sem == 0.0 {
        let (t_statistic, p_value) = if mean_difference == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(mean_difference), 0.0)
        };
        return Ok(PairedTTest {
            t_statistic,
            p_value,
            significant: p_value < ALPHA,
            degrees_freedom: df,
            mean_difference,
            confidence_interval: (mean_difference, mean_difference),
        });
    }

    let dist = central_t(df)?;
    let t_statistic = mean_difference / sem;
    let p_value = (2.0 * dist.cdf(-t_statistic.abs())).min(1.0);
    let half_width = dist.inverse_cdf(TWO_SIDED_QUANTILE) * sem;

    Ok(PairedTTest {
        t_statistic,
        p_value,
        significant: p_value < ALPHA,
        degrees_freedom: df,
        mean_difference,
        confidence_interval: (mean_difference - half_width, mean_difference + half_width),
    })
}

fn central_t(df: usize) -> Result<StudentsT, AnalysisError> {
    StudentsT::new(0.0, 1.0, df as f64).map_err(|e| AnalysisError::Distribution(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerAnalysis {
    pub observed_power: Option<f64>,
    pub effect_size_used: f64,
    pub alpha_level: f64,
    pub sample_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_t_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_centrality_parameter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Observed power of a two-tailed test at `ALPHA`.
///
/// The noncentral t is approximated by a central t shifted by the
/// noncentrality parameter. Never fails: anything not computable becomes
/// `observed_power: None` with a note.
pub fn post_hoc_power(sample_size: usize, effect_size: f64) -> PowerAnalysis {
    let unavailable = || PowerAnalysis {
        observed_power: None,
        effect_size_used: effect_size,
        alpha_level: ALPHA,
        sample_size,
        critical_t_value: None,
        non_centrality_parameter: None,
        note: Some(POWER_UNAVAILABLE.to_string()),
    };

    if sample_size < 2 || !effect_size.is_finite() {
        return unavailable();
    }
    let df = (sample_size - 1) as f64;
    let ncp = effect_size * (sample_size as f64).sqrt();

    let computed = StudentsT::new(0.0, 1.0, df)
        .and_then(|central| {
            let critical = central.inverse_cdf(TWO_SIDED_QUANTILE);
            StudentsT::new(ncp, 1.0, df).map(|shifted| (critical, 1.0 - shifted.cdf(critical)))
        })
        .ok()
        .filter(|(critical, power)| critical.is_finite() && power.is_finite());

    match computed {
        Some((critical, power)) => PowerAnalysis {
            observed_power: Some(power.clamp(0.0, 1.0)),
            effect_size_used: effect_size,
            alpha_level: ALPHA,
            sample_size,
            critical_t_value: Some(critical),
            non_centrality_parameter: Some(ncp),
            note: None,
        },
        None => unavailable(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinomialTest {
    pub successes: u64,
    pub trials: u64,
    pub p_value: f64,
    pub statistically_significant: bool,
    pub null_hypothesis: String,
}

/// Exact two-sided binomial test against p = 0.5.
///
/// The p-value sums every outcome no more likely than the observed one.
pub fn binomial_test(successes: u64, trials: u64) -> Result<BinomialTest, AnalysisError> {
    if trials == 0 || successes > trials {
        return Err(AnalysisError::InvalidCount { successes, trials });
    }
    let dist =
        Binomial::new(0.5, trials).map_err(|e| AnalysisError::Distribution(e.to_string()))?;
    let threshold = dist.pmf(successes) * (1.0 + BINOMIAL_RELATIVE_TOLERANCE);
    let p_value = (0..=trials)
        .map(|i| dist.pmf(i))
        .filter(|p| *p <= threshold)
        .sum::<f64>()
        .min(1.0);

    Ok(BinomialTest {
        successes,
        trials,
        p_value,
        statistically_significant: p_value < ALPHA,
        null_hypothesis: NULL_HYPOTHESIS.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreDescriptives {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl ScoreDescriptives {
    fn of(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        Self {
            mean: mean(values),
            std: sample_std(values),
            median,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifferenceDescriptives {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DescriptiveStatistics {
    pub format_one: ScoreDescriptives,
    pub format_two: ScoreDescriptives,
    pub difference: DifferenceDescriptives,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyDesign {
    pub method: &'static str,
    pub comparison: &'static str,
    pub design_type: &'static str,
    pub sample_size: usize,
    pub evaluation_criteria: usize,
    pub random_seed_used: bool,
    pub blind_evaluation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalOutcomes {
    pub format_one_wins: usize,
    pub format_two_wins: usize,
    pub ties: usize,
    pub total_cases: usize,
    pub format_one_win_rate: f64,
    pub format_two_win_rate: f64,
    pub tie_rate: f64,
    /// Tests format-two wins against all cases, ties counted as non-wins.
    pub binomial_test: BinomialTest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticalReport {
    pub study_design: StudyDesign,
    pub descriptive_statistics: DescriptiveStatistics,
    pub paired_t_test: PairedTTest,
    pub effect_size: EffectSize,
    pub power_analysis: PowerAnalysis,
    pub categorical_outcomes: CategoricalOutcomes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inter_rater_reliability: Option<ReliabilityReport>,
}

impl StatisticalReport {
    /// Full inferential report over a run's canonical judgments.
    pub fn from_results(
        results: &[JudgmentResult],
        seeded: bool,
    ) -> Result<Self, AnalysisError> {
        if results.is_empty() {
            return Err(AnalysisError::EmptyInput("judgment results"));
        }
        let n = results.len();
        let one: Vec<f64> = results.iter().map(|r| r.format_one_score).collect();
        let two: Vec<f64> = results.iter().map(|r| r.format_two_score).collect();
        let differences: Vec<f64> = results.iter().map(|r| r.score_difference()).collect();

        let paired_t_test = paired_t_test(&one, &two)?;
        let effect_size = calculate_effect_size(&one, &two)?;
        let power_analysis = post_hoc_power(n, effect_size.cohens_d);

        let wins = |winner: Winner| results.iter().filter(|r| r.winner == winner).count();
        let (one_wins, two_wins, ties) = (
            wins(Winner::FormatOne),
            wins(Winner::FormatTwo),
            wins(Winner::Tie),
        );

        Ok(Self {
            study_design: StudyDesign {
                method: "LLM-as-a-judge evaluation",
                comparison: "Markup tags (format two) vs indented text (format one)",
                design_type: "within-subjects comparison",
                sample_size: n,
                evaluation_criteria: Criterion::ALL.len(),
                random_seed_used: seeded,
                blind_evaluation: true,
            },
            descriptive_statistics: DescriptiveStatistics {
                format_one: ScoreDescriptives::of(&one),
                format_two: ScoreDescriptives::of(&two),
                difference: DifferenceDescriptives {
                    mean: mean(&differences),
                    std: sample_std(&differences),
                },
            },
            paired_t_test,
            effect_size,
            power_analysis,
            categorical_outcomes: CategoricalOutcomes {
                format_one_wins: one_wins,
                format_two_wins: two_wins,
                ties,
                total_cases: n,
                format_one_win_rate: one_wins as f64 / n as f64,
                format_two_win_rate: two_wins as f64 / n as f64,
                tie_rate: ties as f64 / n as f64,
                binomial_test: binomial_test(two_wins as u64, n as u64)?,
            },
            inter_rater_reliability: None,
        })
    }

    pub fn with_reliability(mut self, reliability: ReliabilityReport) -> Self {
        self.inter_rater_reliability = Some(reliability);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn constant_groups_have_zero_effect() {
        let effect = calculate_effect_size(&[80.0, 80.0, 80.0], &[80.0, 80.0, 80.0]).unwrap();
        assert_eq!(effect.cohens_d, 0.0);
        assert_eq!(effect.pooled_std, 0.0);
        assert_eq!(effect.interpretation, EffectMagnitude::Negligible);
    }

    #[test]
    fn effect_size_uses_pooled_sample_std() {
        // both groups have sample std 1.0
        let effect = calculate_effect_size(&[1.0, 2.0, 3.0], &[2.0, 3.0, 4.0]).unwrap();
        close(effect.pooled_std, 1.0, 1e-12);
        close(effect.cohens_d, 1.0, 1e-12);
        assert_eq!(effect.interpretation, EffectMagnitude::Large);

        let reversed = calculate_effect_size(&[2.0, 3.0, 4.0], &[1.0, 2.0, 3.0]).unwrap();
        close(reversed.cohens_d, -1.0, 1e-12);
        assert_eq!(reversed.interpretation, EffectMagnitude::Large);
    }

    #[test]
    fn effect_bands() {
        assert_eq!(EffectMagnitude::from_d(0.19), EffectMagnitude::Negligible);
        assert_eq!(EffectMagnitude::from_d(0.2), EffectMagnitude::Small);
        assert_eq!(EffectMagnitude::from_d(-0.5), EffectMagnitude::Medium);
        assert_eq!(EffectMagnitude::from_d(0.8), EffectMagnitude::Large);
    }

    #[test]
    fn effect_size_needs_two_per_group() {
        let err = calculate_effect_size(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { got: 1, .. }));
    }

    #[test]
    fn t_test_rejects_mismatched_lengths() {
        let err = paired_t_test(&[1.0; 5], &[1.0; 4]).unwrap_err();
        assert_eq!(err, AnalysisError::LengthMismatch { left: 5, right: 4 });
    }

    #[test]
    fn t_test_rejects_single_pair() {
        assert!(matches!(
            paired_t_test(&[1.0], &[2.0]),
            Err(AnalysisError::InsufficientData { .. })
        ));
    }

    #[test]
    fn t_test_known_values() {
        // differences 1..=5: mean 3, sem sqrt(0.5)
        let a = [10.0, 10.0, 10.0, 10.0, 10.0];
        let b = [11.0, 12.0, 13.0, 14.0, 15.0];
        let test = paired_t_test(&a, &b).unwrap();
        assert_eq!(test.degrees_freedom, 4);
        close(test.mean_difference, 3.0, 1e-12);
        close(test.t_statistic, 4.242_640_687, 1e-6);
        close(test.p_value, 0.013_24, 5e-4);
        assert!(test.significant);
        close(test.confidence_interval.0, 1.036_8, 1e-3);
        close(test.confidence_interval.1, 4.963_2, 1e-3);
    }

    #[test]
    fn t_test_zero_variance() {
        let same = paired_t_test(&[70.0, 80.0], &[70.0, 80.0]).unwrap();
        assert_eq!(same.t_statistic, 0.0);
        assert_eq!(same.p_value, 1.0);
        assert!(!same.significant);

        let shifted = paired_t_test(&[70.0, 80.0, 90.0], &[75.0, 85.0, 95.0]).unwrap();
        assert_eq!(shifted.t_statistic, f64::INFINITY);
        assert_eq!(shifted.p_value, 0.0);
        assert_eq!(shifted.confidence_interval, (5.0, 5.0));
    }

    #[test]
    fn binomial_matches_reference() {
        close(binomial_test(8, 10).unwrap().p_value, 0.109_375, 1e-9);
        close(binomial_test(2, 10).unwrap().p_value, 0.109_375, 1e-9);
        close(binomial_test(3, 4).unwrap().p_value, 0.625, 1e-9);
        close(binomial_test(5, 10).unwrap().p_value, 1.0, 1e-9);
        let extreme = binomial_test(10, 10).unwrap();
        close(extreme.p_value, 2.0 / 1024.0, 1e-12);
        assert!(extreme.statistically_significant);
        assert_eq!(extreme.null_hypothesis, NULL_HYPOTHESIS);
    }

    #[test]
    fn binomial_rejects_bad_counts() {
        assert!(binomial_test(0, 0).is_err());
        assert!(binomial_test(4, 3).is_err());
    }

    #[test]
    fn power_with_zero_effect_is_alpha_half() {
        let power = post_hoc_power(10, 0.0);
        close(power.observed_power.unwrap(), 0.025, 1e-5);
        assert_eq!(power.non_centrality_parameter, Some(0.0));
        assert!(power.note.is_none());
    }

    #[test]
    fn power_grows_with_effect() {
        let small = post_hoc_power(10, 0.3).observed_power.unwrap();
        let large = post_hoc_power(10, 2.0).observed_power.unwrap();
        assert!(small < large);
        assert!(large > 0.99);
    }

    #[test]
    fn power_unavailable_for_tiny_samples() {
        let power = post_hoc_power(1, 0.5);
        assert!(power.observed_power.is_none());
        assert_eq!(power.note.as_deref(), Some(POWER_UNAVAILABLE));
        let json = serde_json::to_value(&power).unwrap();
        assert!(json["observed_power"].is_null());
        assert!(json.get("critical_t_value").is_none());
    }

    fn judgment(id: &str, winner: Winner, one: f64, two: f64) -> JudgmentResult {
        JudgmentResult {
            scenario_id: id.to_string(),
            winner,
            confidence: 80.0,
            format_one_score: one,
            format_two_score: two,
            reasoning: String::new(),
            criteria_scores: BTreeMap::new(),
            fallback: None,
        }
    }

    #[test]
    fn report_from_four_scenarios() {
        let results = vec![
            judgment("s1", Winner::FormatTwo, 70.0, 85.0),
            judgment("s2", Winner::FormatTwo, 72.0, 88.0),
            judgment("s3", Winner::FormatTwo, 75.0, 90.0),
            judgment("s4", Winner::Tie, 80.0, 80.0),
        ];
        let report = StatisticalReport::from_results(&results, true).unwrap();
        assert_eq!(report.study_design.sample_size, 4);
        assert_eq!(report.study_design.evaluation_criteria, 5);
        assert!(report.study_design.random_seed_used);
        close(report.descriptive_statistics.format_one.mean, 74.25, 1e-9);
        close(report.descriptive_statistics.format_two.mean, 85.75, 1e-9);
        close(report.descriptive_statistics.format_one.median, 73.5, 1e-9);
        assert_eq!(report.descriptive_statistics.format_two.min, 80.0);
        assert_eq!(report.descriptive_statistics.format_two.max, 90.0);
        close(report.descriptive_statistics.difference.mean, 11.5, 1e-9);
        close(report.paired_t_test.mean_difference, 11.5, 1e-9);
        assert_eq!(report.paired_t_test.degrees_freedom, 3);
        assert!(report.effect_size.cohens_d > 0.8);
        assert_eq!(report.categorical_outcomes.format_two_wins, 3);
        assert_eq!(report.categorical_outcomes.ties, 1);
        close(report.categorical_outcomes.format_two_win_rate, 0.75, 1e-12);
        close(report.categorical_outcomes.binomial_test.p_value, 0.625, 1e-9);
        assert!(report.inter_rater_reliability.is_none());
    }

    #[test]
    fn report_needs_two_results() {
        let results = vec![judgment("s1", Winner::FormatTwo, 70.0, 85.0)];
        assert!(StatisticalReport::from_results(&results, false).is_err());
        assert_eq!(
            StatisticalReport::from_results(&[], false).unwrap_err(),
            AnalysisError::EmptyInput("judgment results")
        );
    }
}
