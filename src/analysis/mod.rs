//! Cross-scenario aggregation and inferential statistics.

pub mod aggregate;
pub mod reliability;
pub mod stats;

pub use aggregate::{
    aggregate, AggregateSummary, CategorySummary, CriterionSummary, FallbackCriteriaPolicy,
    OutcomeCounts, ResultDetail, ScoreSummary,
};
pub use reliability::{inter_rater_reliability, ReliabilityBand, ReliabilityReport};
pub use stats::{
    binomial_test, calculate_effect_size, paired_t_test, post_hoc_power, BinomialTest,
    CategoricalOutcomes, DescriptiveStatistics, DifferenceDescriptives, EffectMagnitude,
    EffectSize, PairedTTest, PowerAnalysis, ScoreDescriptives, StatisticalReport, StudyDesign,
};

/// Rejected input to an aggregation or statistics routine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("{what} needs at least {needed} observations, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("{successes} successes out of {trials} trials")]
    InvalidCount { successes: u64, trials: u64 },
    #[error("reliability needs at least 2 judges, got {0}")]
    TooFewJudges(usize),
    #[error("row {row} has {got} scores, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("distribution error: {0}")]
    Distribution(String),
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (`n - 1` denominator). NaN for fewer than 2 values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}
