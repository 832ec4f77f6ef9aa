//! Respondent proficiency estimation and reporting-scale conversion.
//!
//! Theta estimation maximizes the joint 3PL log-likelihood of a respondent's
//! answered items over a caller-supplied closed interval. Respondents are
//! independent given a parameter set, so the batch path runs one rayon task
//! per respondent and merges rows in matrix order.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{EngineConfig, ReportingScale};
use crate::data::{CancelToken, ParameterSet, ResponseMatrix, ResultTable, ThetaEstimate};
use crate::error::{EngineError, EngineWarning};
use crate::optim;
use crate::utils::{clip, log_likelihood_3pl};

/// Estimate one respondent's theta against aligned parameter slices.
///
/// Perfect and zero scores have no interior likelihood maximum and map
/// straight to the configured bounds. Respondents with no valid responses
/// and respondents whose search never converges fall back to theta 0.0 with
/// a warning.
pub fn estimate_theta(
    respondent_id: &str,
    responses: &[i32],
    a: &[f64],
    b: &[f64],
    c: &[f64],
    config: &EngineConfig,
) -> (f64, Option<EngineWarning>) {
    let (lower, upper) = config.theta_bounds;
    let n_correct = responses.iter().filter(|&&r| r == 1).count();
    let n_incorrect = responses.iter().filter(|&&r| r == 0).count();

    if n_correct + n_incorrect == 0 {
        return (
            0.0,
            Some(EngineWarning::DataInsufficiency {
                id: respondent_id.to_string(),
                valid_count: 0,
                detail: "no valid responses".to_string(),
            }),
        );
    }
    if n_incorrect == 0 {
        return (upper, None);
    }
    if n_correct == 0 {
        return (lower, None);
    }

    let d = config.d_constant;
    let objective = |x: &[f64]| -log_likelihood_3pl(responses, x[0], a, b, c, d);

    let best = optim::multi_start(&config.theta_starts, |&start| {
        optim::minimize_bounded(
            &objective,
            &[clip(start, lower, upper)],
            &[(lower, upper)],
            config.max_iterations,
            config.tolerance,
        )
    });

    match best {
        Some(result) => (result.x[0], None),
        None => (
            0.0,
            Some(EngineWarning::OptimizationFailure {
                id: respondent_id.to_string(),
            }),
        ),
    }
}

/// Map a theta onto the reporting scale, clamped to the scale's range.
pub fn convert_score(theta: f64, scale: &ReportingScale) -> f64 {
    clip(scale.base + scale.scale * theta, scale.min, scale.max)
}

/// Score every respondent of the matrix against a calibrated parameter set.
///
/// Per-respondent problems degrade to fallback values and are reported as
/// warnings on the table; a cancellation discards uncommitted rows and marks
/// the table incomplete.
pub fn score_respondents(
    matrix: &ResponseMatrix,
    params: &ParameterSet,
    config: &EngineConfig,
    cancel: Option<&CancelToken>,
) -> Result<ResultTable, EngineError> {
    let (a, b, c) = params.aligned_to(matrix)?;

    info!(
        respondents = matrix.n_respondents(),
        items = matrix.n_items(),
        "estimating proficiencies"
    );

    let outcomes: Vec<Option<(ThetaEstimate, Option<EngineWarning>)>> = (0..matrix.n_respondents())
        .into_par_iter()
        .map(|row| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            let respondent_id = &matrix.respondent_ids()[row];
            let responses = matrix.row(row).to_vec();
            let (theta, warning) = estimate_theta(respondent_id, &responses, &a, &b, &c, config);
            let correct_count = responses.iter().filter(|&&r| r == 1).count();
            let total_items = responses.len();
            let estimate = ThetaEstimate {
                respondent_id: respondent_id.clone(),
                theta,
                correct_count,
                total_items,
                percent_correct: 100.0 * correct_count as f64 / total_items as f64,
                reporting_score: convert_score(theta, &config.reporting),
            };
            Some((estimate, warning))
        })
        .collect();

    let complete = outcomes.iter().all(Option::is_some);
    let mut rows = Vec::with_capacity(matrix.n_respondents());
    let mut warnings = Vec::new();
    for (estimate, warning) in outcomes.into_iter().flatten() {
        rows.push(estimate);
        if let Some(w) = warning {
            warn!("{w}");
            warnings.push(w);
        }
    }

    if !complete {
        warn!(
            committed = rows.len(),
            total = matrix.n_respondents(),
            "scoring cancelled; returning incomplete result table"
        );
    }

    Ok(ResultTable {
        rows,
        warnings,
        complete,
    })
}
