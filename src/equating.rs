//! Scale equating between independently calibrated parameter sets.
//!
//! Two administrations sharing anchor items are aligned with mean/sigma
//! linear equating on the anchors' difficulty values. The transform is
//! returned together with the quality statistics of the anchor-pair linear
//! fit; weak fits are flagged, never blocked.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::data::{ItemParameters, ParameterSet};
use crate::error::{EngineError, EngineWarning};
use crate::utils::{mean_std, pearson, EPSILON};

const R_SQUARED_FLOOR: f64 = 0.8;
const STD_ERROR_CEIL: f64 = 0.5;

/// Linear scale transform `b' = slope * b + intercept` with the fit quality
/// of the anchor regression it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquatingTransform {
    pub slope: f64,
    pub intercept: f64,
    pub anchor_count: usize,
    pub r_squared: f64,
    pub correlation: f64,
    pub standard_error: f64,
}

impl EquatingTransform {
    /// Transform one difficulty value onto the reference scale.
    pub fn apply_b(&self, b: f64) -> f64 {
        self.slope * b + self.intercept
    }

    /// Re-express a whole parameter set on the reference scale: difficulty
    /// is mapped linearly, discrimination is rescaled by `1 / slope`, and
    /// guessing is scale-free. Produces a new set; the input is untouched.
    pub fn apply(&self, set: &ParameterSet) -> ParameterSet {
        let items = set
            .items()
            .iter()
            .map(|p| ItemParameters {
                item_id: p.item_id.clone(),
                a: p.a / self.slope,
                b: self.apply_b(p.b),
                c: p.c,
                is_anchor: p.is_anchor,
                calibrated: p.calibrated,
            })
            .collect();
        ParameterSet::new(items, set.is_complete())
    }

    /// The transform mapping the reference scale back onto the target scale.
    pub fn invert(&self) -> EquatingTransform {
        EquatingTransform {
            slope: 1.0 / self.slope,
            intercept: -self.intercept / self.slope,
            anchor_count: self.anchor_count,
            r_squared: self.r_squared,
            correlation: self.correlation,
            standard_error: self.standard_error,
        }
    }
}

/// Equating output: the transform plus any quality flags.
#[derive(Debug, Clone, Serialize)]
pub struct Equating {
    pub transform: EquatingTransform,
    pub warnings: Vec<EngineWarning>,
}

/// Derive the mean/sigma transform aligning `target` onto `reference` via
/// the shared anchors.
///
/// Fails fast when an anchor id is missing from either set or when the
/// anchor difficulties have no spread; low anchor counts and weak linear
/// fits only attach an [`EngineWarning::EquatingQuality`] flag.
pub fn equate(
    reference: &ParameterSet,
    target: &ParameterSet,
    shared_anchor_ids: &[String],
    config: &EngineConfig,
) -> Result<Equating, EngineError> {
    let mut ref_b = Vec::with_capacity(shared_anchor_ids.len());
    let mut target_b = Vec::with_capacity(shared_anchor_ids.len());
    for id in shared_anchor_ids {
        let r = reference
            .get(id)
            .ok_or_else(|| EngineError::MissingItemParameters {
                item_id: id.clone(),
            })?;
        let t = target
            .get(id)
            .ok_or_else(|| EngineError::MissingItemParameters {
                item_id: id.clone(),
            })?;
        ref_b.push(r.b);
        target_b.push(t.b);
    }

    let n = ref_b.len();
    if n < 2 {
        return Err(EngineError::DegenerateEquating(format!(
            "{n} shared anchors; at least 2 are required"
        )));
    }

    let (ref_mean, ref_std) = mean_std(&ref_b);
    let (target_mean, target_std) = mean_std(&target_b);
    if ref_std < EPSILON || target_std < EPSILON {
        return Err(EngineError::DegenerateEquating(
            "anchor difficulties have zero spread".to_string(),
        ));
    }

    let slope = ref_std / target_std;
    let intercept = ref_mean - slope * target_mean;

    let correlation = pearson(&target_b, &ref_b);
    let r_squared = correlation * correlation;
    let standard_error = slope_standard_error(&target_b, &ref_b);

    let mut warnings = Vec::new();
    if n < config.min_equating_anchors {
        warnings.push(EngineWarning::EquatingQuality {
            detail: format!(
                "only {n} shared anchors (minimum {})",
                config.min_equating_anchors
            ),
        });
    }
    if r_squared < R_SQUARED_FLOOR {
        warnings.push(EngineWarning::EquatingQuality {
            detail: format!("low anchor fit (R^2 = {r_squared:.3})"),
        });
    }
    if standard_error > STD_ERROR_CEIL {
        warnings.push(EngineWarning::EquatingQuality {
            detail: format!("high slope standard error ({standard_error:.3})"),
        });
    }

    info!(
        anchors = n,
        slope, intercept, r_squared, "equating transform derived"
    );
    for w in &warnings {
        warn!("{w}");
    }

    Ok(Equating {
        transform: EquatingTransform {
            slope,
            intercept,
            anchor_count: n,
            r_squared,
            correlation,
            standard_error,
        },
        warnings,
    })
}

/// Standard error of the OLS slope of `y` on `x` (the anchor-pair linear
/// fit). Zero when there are not enough points for a residual estimate.
fn slope_standard_error(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n <= 2 {
        return 0.0;
    }
    let (x_mean, _) = mean_std(x);
    let (y_mean, _) = mean_std(y);
    let ss_x: f64 = x.iter().map(|xi| (xi - x_mean).powi(2)).sum();
    if ss_x < EPSILON {
        return 0.0;
    }
    let ols_slope: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
        .sum::<f64>()
        / ss_x;
    let ols_intercept = y_mean - ols_slope * x_mean;
    let ss_resid: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (yi - (ols_intercept + ols_slope * xi)).powi(2))
        .sum();
    ((ss_resid / (n as f64 - 2.0)) / ss_x).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_from_b(ids: &[&str], b_values: &[f64]) -> ParameterSet {
        let items = ids
            .iter()
            .zip(b_values)
            .map(|(id, &b)| ItemParameters {
                item_id: (*id).to_string(),
                a: 1.0,
                b,
                c: 0.2,
                is_anchor: true,
                calibrated: false,
            })
            .collect();
        ParameterSet::new(items, true)
    }

    fn anchor_ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("q{i}")).collect()
    }

    #[test]
    fn mean_sigma_scenario_matches_reference_values() {
        // Six anchors: reference mean 0.1 / std 1.0, target mean 0.5 / std 1.3.
        let unit = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        let ref_b: Vec<f64> = unit.iter().map(|u| 0.1 + u).collect();
        let target_b: Vec<f64> = unit.iter().map(|u| 0.5 + 1.3 * u).collect();
        let ids: Vec<&str> = ["q0", "q1", "q2", "q3", "q4", "q5"].to_vec();
        let reference = set_from_b(&ids, &ref_b);
        let target = set_from_b(&ids, &target_b);

        let result = equate(&reference, &target, &anchor_ids(6), &EngineConfig::default()).unwrap();
        let t = result.transform.clone();
        assert!((t.slope - 1.0 / 1.3).abs() < 1e-9);
        assert!((t.intercept - (0.1 - 0.5 / 1.3)).abs() < 1e-9);
        assert_eq!(t.anchor_count, 6);
        assert!((t.r_squared - 1.0).abs() < 1e-9);
        assert!(result.warnings.is_empty());

        // The applied transform moves the target difficulty mean onto the
        // reference mean.
        let transformed = t.apply(&target);
        let b: Vec<f64> = transformed.items().iter().map(|p| p.b).collect();
        let (mean, _) = mean_std(&b);
        assert!((mean - 0.1).abs() < 1e-9);
    }

    #[test]
    fn round_trip_recovers_target_values() {
        let ids: Vec<&str> = ["q0", "q1", "q2", "q3", "q4"].to_vec();
        let reference = set_from_b(&ids, &[-0.8, -0.2, 0.0, 0.4, 1.1]);
        let target = set_from_b(&ids, &[-0.5, 0.1, 0.2, 0.9, 1.6]);
        let result = equate(&reference, &target, &anchor_ids(5), &EngineConfig::default()).unwrap();

        let forward = result.transform.apply(&target);
        let back = result.transform.invert().apply(&forward);
        for (orig, recovered) in target.items().iter().zip(back.items()) {
            assert!((orig.b - recovered.b).abs() < 1e-6);
            assert!((orig.a - recovered.a).abs() < 1e-6);
            assert!((orig.c - recovered.c).abs() < 1e-12);
        }
    }

    #[test]
    fn discrimination_rescales_and_guessing_is_untouched() {
        let ids: Vec<&str> = ["q0", "q1"].to_vec();
        let target = set_from_b(&ids, &[0.0, 1.0]);
        let t = EquatingTransform {
            slope: 2.0,
            intercept: 0.5,
            anchor_count: 2,
            r_squared: 1.0,
            correlation: 1.0,
            standard_error: 0.0,
        };
        let out = t.apply(&target);
        assert!((out.items()[0].a - 0.5).abs() < 1e-12);
        assert!((out.items()[0].b - 0.5).abs() < 1e-12);
        assert!((out.items()[1].b - 2.5).abs() < 1e-12);
        assert!((out.items()[0].c - 0.2).abs() < 1e-12);
    }

    #[test]
    fn few_anchors_flag_quality_but_do_not_block() {
        let ids: Vec<&str> = ["q0", "q1", "q2"].to_vec();
        let reference = set_from_b(&ids, &[-1.0, 0.0, 1.0]);
        let target = set_from_b(&ids, &[-0.9, 0.2, 1.3]);
        let result = equate(&reference, &target, &anchor_ids(3), &EngineConfig::default()).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, EngineWarning::EquatingQuality { .. })));
        assert!(result.transform.slope.is_finite());
    }

    #[test]
    fn uncorrelated_anchors_flag_low_fit() {
        let ids: Vec<&str> = ["q0", "q1", "q2", "q3", "q4", "q5"].to_vec();
        let reference = set_from_b(&ids, &[-1.0, 1.0, 1.0, -1.0, 0.5, -0.5]);
        let target = set_from_b(&ids, &[-1.0, -1.0, 1.0, 1.0, -0.5, 0.5]);
        let result = equate(&reference, &target, &anchor_ids(6), &EngineConfig::default()).unwrap();
        assert!(result.transform.r_squared < R_SQUARED_FLOOR);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, EngineWarning::EquatingQuality { .. })));
    }

    #[test]
    fn zero_spread_fails_fast() {
        let ids: Vec<&str> = ["q0", "q1", "q2"].to_vec();
        let reference = set_from_b(&ids, &[-1.0, 0.0, 1.0]);
        let target = set_from_b(&ids, &[0.3, 0.3, 0.3]);
        assert!(matches!(
            equate(&reference, &target, &anchor_ids(3), &EngineConfig::default()),
            Err(EngineError::DegenerateEquating(_))
        ));
    }

    #[test]
    fn missing_anchor_in_either_set_fails_fast() {
        let reference = set_from_b(&["q0", "q1"], &[-1.0, 1.0]);
        let target = set_from_b(&["q0"], &[0.0]);
        assert!(matches!(
            equate(&reference, &target, &anchor_ids(2), &EngineConfig::default()),
            Err(EngineError::MissingItemParameters { .. })
        ));
    }
}
