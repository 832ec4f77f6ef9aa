//! Shared numeric kernel: 3PL response curve, clipped log-likelihoods, and
//! the small statistical helpers used by the diagnostics and equating modules.

/// Guard value for divisions and degenerate denominators.
pub const EPSILON: f64 = 1e-10;

/// Probabilities are clipped to `[PROB_CLIP, 1 - PROB_CLIP]` before any
/// logarithm is taken.
pub const PROB_CLIP: f64 = 1e-6;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

#[inline]
pub fn clip(x: f64, min: f64, max: f64) -> f64 {
    x.max(min).min(max)
}

/// 3PL response probability `c + (1 - c) / (1 + e^(-D a (theta - b)))`,
/// clipped away from 0 and 1.
#[inline]
pub fn prob_3pl(theta: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    let p = c + (1.0 - c) * sigmoid(d * a * (theta - b));
    clip(p, PROB_CLIP, 1.0 - PROB_CLIP)
}

/// Joint 3PL log-likelihood of one respondent's row against a full item bank.
///
/// Responses use the `-1 = missing` convention; missing cells contribute
/// nothing.
pub fn log_likelihood_3pl(
    responses: &[i32],
    theta: f64,
    a: &[f64],
    b: &[f64],
    c: &[f64],
    d: f64,
) -> f64 {
    let mut ll = 0.0;
    for (j, &resp) in responses.iter().enumerate() {
        if resp < 0 {
            continue;
        }
        let p = prob_3pl(theta, a[j], b[j], c[j], d);
        if resp == 1 {
            ll += p.ln();
        } else {
            ll += (1.0 - p).ln();
        }
    }
    ll
}

/// Binomial log-likelihood of a single item observed `n_correct` /
/// `n_incorrect` times at one predicted probability.
#[inline]
pub fn item_log_likelihood(p: f64, n_correct: f64, n_incorrect: f64) -> f64 {
    let p = clip(p, PROB_CLIP, 1.0 - PROB_CLIP);
    n_correct * p.ln() + n_incorrect * (1.0 - p).ln()
}

/// Population mean and standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Pearson correlation. Returns 0.0 when either side has no spread.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let (mx, sx) = mean_std(x);
    let (my, sy) = mean_std(y);
    if sx < EPSILON || sy < EPSILON {
        return 0.0;
    }
    let cov = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - mx) * (yi - my))
        .sum::<f64>()
        / n as f64;
    cov / (sx * sy)
}

/// Standard normal CDF approximation
pub fn normal_cdf(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let d = 0.3989423 * (-x * x / 2.0).exp();
    let p =
        d * t * (0.3193815 + t * (-0.3565638 + t * (1.781478 + t * (-1.821256 + t * 1.330274))));
    if x > 0.0 {
        1.0 - p
    } else {
        p
    }
}

/// Chi-square survival function `P(X > x)` via the Wilson-Hilferty cube-root
/// normal approximation. Accurate to a few 1e-3 for df >= 1, which is enough
/// for a goodness-of-fit flag.
pub fn chi_square_sf(x: f64, df: usize) -> f64 {
    if x <= 0.0 || df == 0 {
        return 1.0;
    }
    let k = df as f64;
    let t = 2.0 / (9.0 * k);
    let z = ((x / k).powf(1.0 / 3.0) - (1.0 - t)) / t.sqrt();
    1.0 - normal_cdf(z)
}
