//! Box-constrained quasi-Newton minimization and the deterministic
//! multi-start combinator used by calibration and theta estimation.
//!
//! The minimizer is a projected BFGS with finite-difference gradients and an
//! Armijo backtracking line search. Dimensions here are tiny (1 for theta,
//! 3 for item parameters), so the dense inverse-Hessian update is cheap.

use crate::utils::clip;

/// Outcome of a single bounded minimization run.
#[derive(Debug, Clone)]
pub struct OptimResult {
    pub x: Vec<f64>,
    pub value: f64,
    pub converged: bool,
    pub iterations: usize,
}

const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;
const CURVATURE_GUARD: f64 = 1e-10;

fn project(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (xi, &(lo, hi)) in x.iter_mut().zip(bounds) {
        *xi = clip(*xi, lo, hi);
    }
}

/// Central finite-difference gradient, sampling inside the box.
fn gradient<F: Fn(&[f64]) -> f64>(f: &F, x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    let n = x.len();
    let mut g = vec![0.0; n];
    let mut probe = x.to_vec();
    for i in 0..n {
        let (lo, hi) = bounds[i];
        let h = 1e-6 * (1.0 + x[i].abs());
        let xp = (x[i] + h).min(hi);
        let xm = (x[i] - h).max(lo);
        let denom = xp - xm;
        if denom <= 0.0 {
            g[i] = 0.0;
            continue;
        }
        probe[i] = xp;
        let fp = f(&probe);
        probe[i] = xm;
        let fm = f(&probe);
        probe[i] = x[i];
        g[i] = (fp - fm) / denom;
    }
    g
}

/// Norm of the projected gradient step; zero at a box-constrained optimum.
fn projected_gradient_norm(x: &[f64], g: &[f64], bounds: &[(f64, f64)]) -> f64 {
    x.iter()
        .zip(g)
        .zip(bounds)
        .map(|((&xi, &gi), &(lo, hi))| {
            let stepped = clip(xi - gi, lo, hi);
            (stepped - xi).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

fn identity(n: usize) -> Vec<Vec<f64>> {
    let mut m = vec![vec![0.0; n]; n];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter()
        .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// BFGS inverse-Hessian update: H <- (I - rho s y') H (I - rho y s') + rho s s'.
fn bfgs_update(h: &mut Vec<Vec<f64>>, s: &[f64], y: &[f64]) {
    let sy = dot(s, y);
    if sy <= CURVATURE_GUARD {
        return;
    }
    let n = s.len();
    let rho = 1.0 / sy;
    let hy = mat_vec(h, y);
    let yhy = dot(y, &hy);
    let mut new_h = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            new_h[i][j] = h[i][j] - rho * (s[i] * hy[j] + hy[i] * s[j])
                + rho * rho * yhy * s[i] * s[j]
                + rho * s[i] * s[j];
        }
    }
    *h = new_h;
}

/// Minimize `f` over the box `bounds` starting from `x0`.
///
/// Convergence is declared when the projected gradient norm or the accepted
/// step falls below `tol`. The result is fully deterministic for identical
/// inputs.
pub fn minimize_bounded<F: Fn(&[f64]) -> f64>(
    f: F,
    x0: &[f64],
    bounds: &[(f64, f64)],
    max_iter: usize,
    tol: f64,
) -> OptimResult {
    let n = x0.len();
    let mut x = x0.to_vec();
    project(&mut x, bounds);
    let mut fx = f(&x);
    let mut g = gradient(&f, &x, bounds);
    let mut h = identity(n);

    if !fx.is_finite() {
        return OptimResult {
            x,
            value: fx,
            converged: false,
            iterations: 0,
        };
    }

    for iter in 0..max_iter {
        if projected_gradient_norm(&x, &g, bounds) < tol {
            return OptimResult {
                x,
                value: fx,
                converged: true,
                iterations: iter,
            };
        }

        let mut dir: Vec<f64> = mat_vec(&h, &g).iter().map(|v| -v).collect();
        if dot(&dir, &g) >= 0.0 {
            // Curvature information went stale; restart from steepest descent.
            h = identity(n);
            dir = g.iter().map(|v| -v).collect();
        }

        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let mut x_new: Vec<f64> = x.iter().zip(&dir).map(|(xi, di)| xi + alpha * di).collect();
            project(&mut x_new, bounds);
            let displacement: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
            let step_norm = dot(&displacement, &displacement).sqrt();
            if step_norm < tol * 1e-3 {
                alpha *= 0.5;
                continue;
            }
            let f_new = f(&x_new);
            if f_new.is_finite() && f_new <= fx + ARMIJO_C1 * dot(&g, &displacement) {
                accepted = Some((x_new, f_new, step_norm));
                break;
            }
            alpha *= 0.5;
        }

        let Some((x_new, f_new, step_norm)) = accepted else {
            // Line search exhausted; at this point the gradient check above
            // is the authority on convergence.
            let converged = projected_gradient_norm(&x, &g, bounds) < tol * 10.0;
            return OptimResult {
                x,
                value: fx,
                converged,
                iterations: iter,
            };
        };

        let g_new = gradient(&f, &x_new, bounds);
        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        bfgs_update(&mut h, &s, &y);

        x = x_new;
        fx = f_new;
        g = g_new;

        if step_norm < tol {
            return OptimResult {
                x,
                value: fx,
                converged: true,
                iterations: iter + 1,
            };
        }
    }

    OptimResult {
        x,
        value: fx,
        converged: false,
        iterations: max_iter,
    }
}

/// Run one minimization per fixed starting point and return the winner.
///
/// Pure arg-min over the converged runs with finite objective values; ties
/// are broken by the earliest index in `starts`, so the result does not
/// depend on evaluation order.
pub fn multi_start<T, F>(starts: &[T], run: F) -> Option<OptimResult>
where
    F: Fn(&T) -> OptimResult,
{
    let mut best: Option<OptimResult> = None;
    for result in starts.iter().map(run) {
        if !result.converged || !result.value.is_finite() {
            continue;
        }
        let better = match &best {
            None => true,
            Some(b) => result.value < b.value,
        };
        if better {
            best = Some(result);
        }
    }
    best
}
