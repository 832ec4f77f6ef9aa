//! Item-parameter calibration.
//!
//! The shipped strategy estimates each item against a *point theta* derived
//! from the item's own observed proportion correct, rather than integrating
//! over a latent-trait distribution. That approximation is named explicitly
//! ([`PointThetaStrategy`]) and sits behind [`CalibrationStrategy`], so a
//! joint EM-based estimator can be added later without touching callers.
//!
//! Items are independent under the point-theta objective, so calibration
//! runs one rayon task per item and merges results in matrix column order.

use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anchors::{self, AnchorParameters};
use crate::config::EngineConfig;
use crate::data::{CancelToken, ItemParameters, ParameterSet, ResponseMatrix};
use crate::error::{EngineError, EngineWarning};
use crate::fences::{self, FenceBounds};
use crate::optim;
use crate::utils::{item_log_likelihood, prob_3pl};

/// Which objective the calibrator minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationMethod {
    /// Plain maximum likelihood.
    Ml,
    /// Maximum likelihood with adaptive fences (soft penalty + tightened
    /// search bounds).
    Mlf,
}

/// One calibration run's output: the new parameter set plus the per-item
/// warnings accumulated along the way.
#[derive(Debug, Clone, Serialize)]
pub struct Calibration {
    pub set: ParameterSet,
    pub warnings: Vec<EngineWarning>,
}

/// Common interface for item-calibration strategies.
pub trait CalibrationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn calibrate(
        &self,
        matrix: &ResponseMatrix,
        anchor_params: Option<&[AnchorParameters]>,
        config: &EngineConfig,
        cancel: Option<&CancelToken>,
    ) -> Result<Calibration, EngineError>;
}

/// The point-theta approximation, in ML or MLF flavor.
#[derive(Debug, Clone, Copy)]
pub struct PointThetaStrategy {
    pub method: CalibrationMethod,
}

impl CalibrationStrategy for PointThetaStrategy {
    fn name(&self) -> &'static str {
        match self.method {
            CalibrationMethod::Ml => "point-theta-ml",
            CalibrationMethod::Mlf => "point-theta-mlf",
        }
    }

    fn calibrate(
        &self,
        matrix: &ResponseMatrix,
        anchor_params: Option<&[AnchorParameters]>,
        config: &EngineConfig,
        cancel: Option<&CancelToken>,
    ) -> Result<Calibration, EngineError> {
        calibrate(matrix, anchor_params, self.method, config, cancel)
    }
}

/// Calibrate every item of the matrix.
///
/// Anchored columns bypass optimization and keep their supplied parameters
/// verbatim. Per-item failures degrade to the configured fallback values and
/// are reported as warnings; only malformed inputs error. When `cancel`
/// fires mid-run, not-yet-committed items are discarded and the returned set
/// is marked incomplete.
pub fn calibrate(
    matrix: &ResponseMatrix,
    anchor_params: Option<&[AnchorParameters]>,
    method: CalibrationMethod,
    config: &EngineConfig,
    cancel: Option<&CancelToken>,
) -> Result<Calibration, EngineError> {
    let layout = anchors::resolve(matrix, anchor_params.unwrap_or(&[]))?;

    info!(
        items = matrix.n_items(),
        respondents = matrix.n_respondents(),
        anchors = layout.anchor_count(),
        method = ?method,
        "calibrating items"
    );

    let outcomes: Vec<Option<(ItemParameters, Option<EngineWarning>)>> = (0..matrix.n_items())
        .into_par_iter()
        .map(|col| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            if let Some(anchor) = layout.anchor_for(col) {
                return Some((
                    ItemParameters {
                        item_id: anchor.item_id.clone(),
                        a: anchor.a,
                        b: anchor.b,
                        c: anchor.c,
                        is_anchor: true,
                        calibrated: false,
                    },
                    None,
                ));
            }
            let item_id = &matrix.item_ids()[col];
            Some(calibrate_item(item_id, matrix.column(col), method, config))
        })
        .collect();

    let complete = outcomes.iter().all(Option::is_some);
    let mut items = Vec::with_capacity(matrix.n_items());
    let mut warnings = Vec::new();
    for outcome in outcomes.into_iter().flatten() {
        let (params, warning) = outcome;
        items.push(params);
        if let Some(w) = warning {
            warn!("{w}");
            warnings.push(w);
        }
    }

    if !complete {
        warn!(
            committed = items.len(),
            total = matrix.n_items(),
            "calibration cancelled; returning incomplete parameter set"
        );
    }

    Ok(Calibration {
        set: ParameterSet::new(items, complete),
        warnings,
    })
}

/// Point theta for a candidate (a, b, c): inversion of the 3PL curve at the
/// observed proportion correct when that is well-defined, otherwise a linear
/// mapping of the proportion onto the theta scale.
fn point_theta(p_observed: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    if c < p_observed && p_observed < 1.0 {
        b + ((p_observed - c) / (1.0 - c)).ln() / (d * a)
    } else {
        2.0 * (p_observed - 0.5)
    }
}

fn fallback_item(item_id: &str, config: &EngineConfig) -> ItemParameters {
    ItemParameters {
        item_id: item_id.to_string(),
        a: config.fallback.a,
        b: config.fallback.b,
        c: config.fallback.c,
        is_anchor: false,
        calibrated: false,
    }
}

fn calibrate_item(
    item_id: &str,
    responses: ArrayView1<'_, i32>,
    method: CalibrationMethod,
    config: &EngineConfig,
) -> (ItemParameters, Option<EngineWarning>) {
    let n_correct = responses.iter().filter(|&&r| r == 1).count();
    let n_incorrect = responses.iter().filter(|&&r| r == 0).count();
    let valid_count = n_correct + n_incorrect;

    if valid_count < config.min_valid_responses {
        return (
            fallback_item(item_id, config),
            Some(EngineWarning::DataInsufficiency {
                id: item_id.to_string(),
                valid_count,
                detail: format!("below minimum of {}", config.min_valid_responses),
            }),
        );
    }

    let p_observed = n_correct as f64 / valid_count as f64;

    // All-identical responses leave the likelihood without an interior
    // optimum; the item is unusable for estimation under either method.
    if n_correct == 0 || n_incorrect == 0 {
        return (
            fallback_item(item_id, config),
            Some(EngineWarning::DataInsufficiency {
                id: item_id.to_string(),
                valid_count,
                detail: "zero response variance".to_string(),
            }),
        );
    }

    let fence = match method {
        CalibrationMethod::Ml => None,
        CalibrationMethod::Mlf => Some(fences::bounds(&config.fences, valid_count, p_observed)),
    };
    let bounds = search_box(config, fence.as_ref());

    let d = config.d_constant;
    let (n1, n0) = (n_correct as f64, n_incorrect as f64);
    let objective = |x: &[f64]| {
        let (a, b, c) = (x[0], x[1], x[2]);
        let theta = point_theta(p_observed, a, b, c, d);
        let p = prob_3pl(theta, a, b, c, d);
        let mut value = -item_log_likelihood(p, n1, n0);
        if let Some(f) = &fence {
            value += f.penalty(a, b, c);
        }
        value
    };

    let best = optim::multi_start(&config.item_starts, |start| {
        optim::minimize_bounded(
            &objective,
            start,
            &bounds,
            config.max_iterations,
            config.tolerance,
        )
    });

    let Some(result) = best else {
        return (
            fallback_item(item_id, config),
            Some(EngineWarning::OptimizationFailure {
                id: item_id.to_string(),
            }),
        );
    };

    let (a, b, c) = (result.x[0], result.x[1], result.x[2]);
    debug!(
        item = item_id,
        a, b, c,
        objective = result.value,
        iterations = result.iterations,
        "item converged"
    );

    // Post-hoc validity: the optimizer works in a box, but a rejected result
    // must never leak out as a calibrated item.
    if !(a > 0.0 && (0.0..=1.0).contains(&c)) {
        return (
            fallback_item(item_id, config),
            Some(EngineWarning::InvalidParameter {
                item_id: item_id.to_string(),
                detail: format!("a = {a}, c = {c}"),
            }),
        );
    }

    (
        ItemParameters {
            item_id: item_id.to_string(),
            a,
            b,
            c,
            is_anchor: false,
            calibrated: true,
        },
        None,
    )
}

/// The ML search box, intersected with the item's fence intervals under MLF
/// so calibrated values land inside the fence.
fn search_box(config: &EngineConfig, fence: Option<&FenceBounds>) -> [(f64, f64); 3] {
    let base = [
        config.item_bounds.a,
        config.item_bounds.b,
        config.item_bounds.c,
    ];
    let Some(f) = fence else {
        return base;
    };
    let fenced = [f.a, f.b, f.c];
    let mut out = [(0.0, 0.0); 3];
    for i in 0..3 {
        let lo = base[i].0.max(fenced[i].0);
        let hi = base[i].1.min(fenced[i].1);
        // Disjoint intervals can only come from a misconfigured fence table;
        // the fence wins so MLF output stays inside it.
        out[i] = if lo <= hi { (lo, hi) } else { fenced[i] };
    }
    out
}
