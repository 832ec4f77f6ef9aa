//! Model-fit diagnostics.
//!
//! Respondents are partitioned into quantile groups by estimated theta; per
//! group the observed number of correct responses is compared with the 3PL
//! prediction and accumulated into a chi-square statistic.

use serde::Serialize;
use tracing::info;

use crate::config::EngineConfig;
use crate::data::{ParameterSet, ResponseMatrix};
use crate::error::EngineError;
use crate::utils::{chi_square_sf, prob_3pl, EPSILON};

/// Observed vs. expected correctness for one theta quantile group.
#[derive(Debug, Clone, Serialize)]
pub struct FitBin {
    pub theta_low: f64,
    pub theta_high: f64,
    pub respondents: usize,
    pub observed: f64,
    pub expected: f64,
}

/// Aggregate chi-square goodness-of-fit result.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    /// True when the misfit is significant at the configured level.
    pub significant: bool,
    pub bins: Vec<FitBin>,
}

/// Chi-square fit test of a parameter set against observed responses.
///
/// `thetas` must hold one estimate per matrix row. Binning is by theta
/// quantile with deterministic ordering (theta, then row index).
pub fn test_fit(
    matrix: &ResponseMatrix,
    thetas: &[f64],
    params: &ParameterSet,
    config: &EngineConfig,
) -> Result<FitReport, EngineError> {
    let bins = config.fit_bins;
    if bins < 2 {
        return Err(EngineError::InvalidFitBinning(format!(
            "{bins} bins; at least 2 are required"
        )));
    }
    let n = matrix.n_respondents();
    if n < bins {
        return Err(EngineError::InvalidFitBinning(format!(
            "{n} respondents for {bins} bins"
        )));
    }
    if thetas.len() != n {
        return Err(EngineError::InconsistentIdMap(format!(
            "{} theta estimates for {} matrix rows",
            thetas.len(),
            n
        )));
    }

    let (a, b, c) = params.aligned_to(matrix)?;
    let d = config.d_constant;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        thetas[i]
            .partial_cmp(&thetas[j])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(i.cmp(&j))
    });

    let mut report_bins = Vec::with_capacity(bins);
    let mut chi_square = 0.0;
    for k in 0..bins {
        let start = k * n / bins;
        let end = (k + 1) * n / bins;
        let group = &order[start..end];

        let mut observed = 0.0;
        let mut expected = 0.0;
        for &row in group {
            let theta = thetas[row];
            for (j, &resp) in matrix.row(row).iter().enumerate() {
                if resp < 0 {
                    continue;
                }
                observed += resp as f64;
                expected += prob_3pl(theta, a[j], b[j], c[j], d);
            }
        }

        chi_square += (observed - expected).powi(2) / expected.max(EPSILON);
        report_bins.push(FitBin {
            theta_low: group.first().map_or(f64::NAN, |&i| thetas[i]),
            theta_high: group.last().map_or(f64::NAN, |&i| thetas[i]),
            respondents: group.len(),
            observed,
            expected,
        });
    }

    let degrees_of_freedom = bins - 1;
    let p_value = chi_square_sf(chi_square, degrees_of_freedom);
    let significant = p_value < 1.0 - config.significance_level;

    info!(
        chi_square,
        degrees_of_freedom, p_value, significant, "model fit test"
    );

    Ok(FitReport {
        chi_square,
        degrees_of_freedom,
        p_value,
        significant,
        bins: report_bins,
    })
}
