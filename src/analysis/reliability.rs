//! Agreement between several judges scoring the same cases.

use serde::{Deserialize, Serialize};

use super::{mean, AnalysisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReliabilityBand {
    Excellent,
    Good,
    Acceptable,
    Questionable,
    Poor,
}

impl ReliabilityBand {
    pub fn from_correlation(r: f64) -> Self {
        if r >= 0.9 {
            ReliabilityBand::Excellent
        } else if r >= 0.8 {
            ReliabilityBand::Good
        } else if r >= 0.7 {
            ReliabilityBand::Acceptable
        } else if r >= 0.6 {
            ReliabilityBand::Questionable
        } else {
            ReliabilityBand::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityReport {
    pub average_pairwise_correlation: f64,
    pub reliability_interpretation: ReliabilityBand,
    /// Defined pairs only, in (0,1), (0,2), .., (1,2) order.
    pub individual_correlations: Vec<f64>,
    pub n_judges: usize,
    pub n_cases: usize,
}

/// Average pairwise Pearson correlation over a cases × judges score matrix.
///
/// Pairs whose correlation is undefined (a constant column, fewer than two
/// cases) are skipped. With no defined pair the average is 0.
pub fn inter_rater_reliability(matrix: &[Vec<f64>]) -> Result<ReliabilityReport, AnalysisError> {
    let Some(first) = matrix.first() else {
        return Err(AnalysisError::EmptyInput("judgment matrix"));
    };
    let n_judges = first.len();
    if let Some((row, scores)) = matrix
        .iter()
        .enumerate()
        .find(|(_, scores)| scores.len() != n_judges)
    {
        return Err(AnalysisError::RaggedMatrix {
            row,
            expected: n_judges,
            got: scores.len(),
        });
    }
    if n_judges < 2 {
        return Err(AnalysisError::TooFewJudges(n_judges));
    }

    let column = |j: usize| -> Vec<f64> { matrix.iter().map(|row| row[j]).collect() };
    let columns: Vec<Vec<f64>> = (0..n_judges).map(column).collect();

    let mut correlations = Vec::new();
    for i in 0..n_judges {
        for j in (i + 1)..n_judges {
            if let Some(r) = pearson(&columns[i], &columns[j]) {
                correlations.push(r);
            }
        }
    }

    let average = if correlations.is_empty() {
        0.0
    } else {
        mean(&correlations)
    };

    Ok(ReliabilityReport {
        average_pairwise_correlation: average,
        reliability_interpretation: ReliabilityBand::from_correlation(average),
        individual_correlations: correlations,
        n_judges,
        n_cases: matrix.len(),
    })
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(x), mean(y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}
