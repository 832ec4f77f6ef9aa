//! Adaptive parameter fences for MLF calibration.
//!
//! A fence narrows the search region for an item based on how much data the
//! item has (sample-size tier) and how extreme its observed difficulty is,
//! and adds a soft penalty that ramps up as a candidate approaches the fence
//! edges. Bounds are recomputed per item and never shared.

use serde::Serialize;

use crate::config::{FenceConfig, FenceTier};

/// Per-item search intervals plus the soft-penalty shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FenceBounds {
    pub a: (f64, f64),
    pub b: (f64, f64),
    pub c: (f64, f64),
    pub penalty_weight: f64,
    pub upper_margin: f64,
    pub lower_margin: f64,
}

impl FenceBounds {
    /// Soft barrier: each parameter is penalized linearly once it passes
    /// `upper_margin` of its upper bound or drops under `lower_margin` of its
    /// lower bound. Piecewise-linear, not a hard clamp.
    pub fn penalty(&self, a: f64, b: f64, c: f64) -> f64 {
        self.soft_one(a, self.a) + self.soft_one(b, self.b) + self.soft_one(c, self.c)
    }

    fn soft_one(&self, value: f64, (lower, upper): (f64, f64)) -> f64 {
        let mut penalty = 0.0;
        let upper_edge = self.upper_margin * upper;
        if value > upper_edge {
            penalty += self.penalty_weight * (value - upper_edge);
        }
        let lower_edge = self.lower_margin * lower;
        if value < lower_edge {
            penalty += self.penalty_weight * (lower_edge - value);
        }
        penalty
    }
}

/// Fence for one item, from its valid-response count and observed proportion
/// correct.
pub fn bounds(config: &FenceConfig, valid_count: usize, p_observed: f64) -> FenceBounds {
    let tier = select_tier(&config.tiers, valid_count);

    let mut c = tier.c;
    if p_observed < config.hard_threshold {
        c = config.hard_c;
    } else if p_observed > config.easy_threshold {
        c = config.easy_c;
    }

    FenceBounds {
        a: tier.a,
        b: tier.b,
        c,
        penalty_weight: config.penalty_weight,
        upper_margin: config.upper_margin,
        lower_margin: config.lower_margin,
    }
}

fn select_tier(tiers: &[FenceTier], valid_count: usize) -> FenceTier {
    tiers
        .iter()
        .filter(|t| t.min_count <= valid_count)
        .max_by_key(|t| t.min_count)
        .cloned()
        .unwrap_or(FenceTier {
            min_count: 0,
            a: (0.1, 5.0),
            b: (-4.0, 4.0),
            c: (0.0, 0.5),
        })
}
