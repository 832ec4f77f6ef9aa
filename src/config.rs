//! Engine configuration.
//!
//! Every tunable the estimation engine consumes lives here and is supplied by
//! the caller (the external config layer). Defaults mirror the production
//! configuration of the original assessment system; nothing in the engine
//! reads configuration from the environment.

use serde::{Deserialize, Serialize};

/// Linear reporting scale applied to estimated theta values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingScale {
    pub base: f64,
    pub scale: f64,
    /// Reported scores are clamped into `[min, max]`.
    pub min: f64,
    pub max: f64,
}

impl Default for ReportingScale {
    fn default() -> Self {
        Self {
            base: 500.0,
            scale: 100.0,
            min: 0.0,
            max: 1000.0,
        }
    }
}

/// Box bounds for the item-parameter search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemBounds {
    pub a: (f64, f64),
    pub b: (f64, f64),
    pub c: (f64, f64),
}

impl Default for ItemBounds {
    fn default() -> Self {
        Self {
            a: (0.1, 5.0),
            b: (-3.0, 3.0),
            c: (0.0, 0.5),
        }
    }
}

/// Fallback item parameters used when an item cannot be calibrated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for FallbackParameters {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.2,
        }
    }
}

/// One sample-size tier of the fence table. A tier applies to items whose
/// valid-response count is at least `min_count`; the applicable tier is the
/// one with the largest such `min_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FenceTier {
    pub min_count: usize,
    pub a: (f64, f64),
    pub b: (f64, f64),
    pub c: (f64, f64),
}

/// Adaptive-bound configuration for MLF calibration.
///
/// The soft-penalty margins (fractions of the bound hit before the penalty
/// ramps up) and the extreme-difficulty refinements of the guessing bound are
/// data here rather than literals, so tuning is a config change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FenceConfig {
    pub tiers: Vec<FenceTier>,
    /// Penalty engages above `upper_margin * upper` ...
    pub upper_margin: f64,
    /// ... and below `lower_margin * lower`.
    pub lower_margin: f64,
    pub penalty_weight: f64,
    /// Items with `p_observed` below this are "hard"; their c interval is
    /// replaced by `hard_c`.
    pub hard_threshold: f64,
    pub hard_c: (f64, f64),
    /// Items with `p_observed` above this are "easy"; their c interval is
    /// replaced by `easy_c`.
    pub easy_threshold: f64,
    pub easy_c: (f64, f64),
}

impl Default for FenceConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                FenceTier {
                    min_count: 0,
                    a: (0.2, 3.0),
                    b: (-2.5, 2.5),
                    c: (0.05, 0.4),
                },
                FenceTier {
                    min_count: 30,
                    a: (0.1, 4.0),
                    b: (-3.0, 3.0),
                    c: (0.05, 0.35),
                },
                FenceTier {
                    min_count: 100,
                    a: (0.1, 5.0),
                    b: (-4.0, 4.0),
                    c: (0.05, 0.3),
                },
            ],
            upper_margin: 0.8,
            lower_margin: 1.2,
            penalty_weight: 0.1,
            hard_threshold: 0.1,
            hard_c: (0.05, 0.25),
            easy_threshold: 0.9,
            easy_c: (0.05, 0.15),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scaling constant D of the 3PL model.
    pub d_constant: f64,
    /// Closed interval theta estimates are confined to. Historical versions
    /// of the system disagreed on the canonical value; it is therefore a
    /// caller decision, defaulting to the production config's (-4, 4).
    pub theta_bounds: (f64, f64),
    pub reporting: ReportingScale,
    /// Items with fewer valid responses than this fall back to defaults.
    pub min_valid_responses: usize,
    /// Iteration cap per optimization run.
    pub max_iterations: usize,
    /// Convergence tolerance per optimization run.
    pub tolerance: f64,
    pub item_bounds: ItemBounds,
    /// Fixed (a, b, c) starting points for item calibration.
    pub item_starts: Vec<[f64; 3]>,
    /// Fixed theta starting points for proficiency estimation.
    pub theta_starts: Vec<f64>,
    pub fallback: FallbackParameters,
    pub fences: FenceConfig,
    /// Quantile bin count for the chi-square fit test.
    pub fit_bins: usize,
    /// Confidence level for the fit test (0.95 flags at p < 0.05).
    pub significance_level: f64,
    /// Below this shared-anchor count equating is flagged as low quality.
    pub min_equating_anchors: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            d_constant: 1.7,
            theta_bounds: (-4.0, 4.0),
            reporting: ReportingScale::default(),
            min_valid_responses: 10,
            max_iterations: 1000,
            tolerance: 1e-6,
            item_bounds: ItemBounds::default(),
            item_starts: vec![
                [1.0, 0.0, 0.2],
                [0.8, -0.5, 0.15],
                [1.2, 0.5, 0.25],
                [0.6, -1.0, 0.1],
                [1.5, 1.0, 0.3],
            ],
            theta_starts: vec![-4.0, -2.0, 0.0, 2.0, 4.0],
            fallback: FallbackParameters::default(),
            fences: FenceConfig::default(),
            fit_bins: 5,
            significance_level: 0.95,
            min_equating_anchors: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_values() {
        let config = EngineConfig::default();
        assert_eq!(config.theta_bounds, (-4.0, 4.0));
        assert_eq!(config.min_valid_responses, 10);
        assert_eq!(config.item_starts.len(), 5);
        assert_eq!(config.fences.tiers.len(), 3);
        assert!((config.d_constant - 1.7).abs() < f64::EPSILON);
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fit_bins, config.fit_bins);
        assert_eq!(back.fences.tiers.len(), config.fences.tiers.len());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"fit_bins": 10}"#).unwrap();
        assert_eq!(config.fit_bins, 10);
        assert_eq!(config.min_valid_responses, 10);
    }
}
