// src/svm.rs
//
// Soft-margin linear SVM:
//
//   min_{w, beta, z}  (1/2) ||w||^2 + lambda * 1^T z
//   s.t.              diag(d) (A w + beta 1) >= 1 - z,   z >= 0
//
// The sweep driver only talks to the `SvmSolver` trait. The bundled
// `SmoSolver` works on the dual
//
//   min_alpha (1/2) alpha^T Q alpha - 1^T alpha,  Q_ij = d_i d_j a_i.a_j
//   s.t.      0 <= alpha_i <= lambda,  d^T alpha = 0
//
// with maximal-violating-pair working sets. w = sum_i alpha_i d_i a_i is
// kept explicitly, so each iteration costs one pass over nnz(A).
//
// Stop: (max_{I_up} -d_t G_t) - (min_{I_low} -d_t G_t) < tolerance.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SvmError};
use crate::sparse::CsrMatrix;

/// Floor for the curvature of a pair update.
const TAU: f64 = 1e-12;

/// Rows below this count refresh the gradient serially.
const PAR_ROWS: usize = 2048;

/// Solver options. Unknown/omitted fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmCtrl {
    /// KKT violation gap at which the solve is considered converged.
    pub tolerance: f64,
    pub max_iters: usize,

    /// Emit iteration progress through tracing.
    pub progress: bool,
    pub progress_every: usize,

    /// Enable Rayon parallelism for the gradient refresh.
    pub parallel: bool,
}

impl Default for SvmCtrl {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_iters: 200_000,
            progress: false,
            progress_every: 1000,
            parallel: true,
        }
    }
}

/// Hyperplane, intercept and slacks of one solve.
#[derive(Debug, Clone)]
pub struct SvmSolution {
    pub w: Vec<f64>,
    pub beta: f64,
    pub z: Vec<f64>,
    /// Dual variables (one per point).
    pub alpha: Vec<f64>,
    pub iters: usize,
    pub primal_objective: f64,
    pub dual_objective: f64,
}

impl SvmSolution {
    /// `[w; beta; z]`, length `width + 1 + height`.
    pub fn packed(&self) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.w.len() + 1 + self.z.len());
        x.extend_from_slice(&self.w);
        x.push(self.beta);
        x.extend_from_slice(&self.z);
        x
    }

    /// Points with a nonzero dual variable.
    pub fn num_support(&self) -> usize {
        self.alpha.iter().filter(|&&a| a > 0.0).count()
    }

    pub fn duality_gap(&self) -> f64 {
        self.primal_objective - self.dual_objective
    }

    /// Fraction of rows of `a` classified as `d` by `sign(A w + beta)`.
    pub fn train_accuracy(&self, a: &CsrMatrix, d: &[f64]) -> f64 {
        if a.height == 0 {
            return 1.0;
        }
        let hits = (0..a.height)
            .filter(|&i| {
                let f = a.row_dot(i, &self.w) + self.beta;
                (f > 0.0) == (d[i] > 0.0)
            })
            .count();
        hits as f64 / a.height as f64
    }
}

/// Seam for the optimisation back end used by the sweep driver.
pub trait SvmSolver: Sync {
    fn name(&self) -> &'static str;

    /// Solve for one regularization value. Non-convergence is an error, never a partial result.
    fn solve(&self, a: &CsrMatrix, d: &[f64], lambda: f64, ctrl: &SvmCtrl) -> Result<SvmSolution>;
}

/// Sequential minimal optimisation on the dual.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoSolver;

/// Maximal violating pair, or `None` once no pair violates the KKT conditions.
fn select_pair(d: &[f64], alpha: &[f64], grad: &[f64], c: f64) -> Option<(usize, usize, f64)> {
    let mut g_max = f64::NEG_INFINITY;
    let mut g_min = f64::INFINITY;
    let mut i_sel = None;
    let mut j_sel = None;

    for t in 0..d.len() {
        let v = -d[t] * grad[t];
        let up = if d[t] > 0.0 { alpha[t] < c } else { alpha[t] > 0.0 };
        let low = if d[t] > 0.0 { alpha[t] > 0.0 } else { alpha[t] < c };
        if up && v > g_max {
            g_max = v;
            i_sel = Some(t);
        }
        if low && v < g_min {
            g_min = v;
            j_sel = Some(t);
        }
    }
    match (i_sel, j_sel) {
        (Some(i), Some(j)) => Some((i, j, g_max - g_min)),
        _ => None,
    }
}

/// Two-variable subproblem with box [0, c]; returns the new (alpha_i, alpha_j).
fn update_pair(
    (ai, aj): (f64, f64),
    (gi, gj): (f64, f64),
    (qii, qjj, qij): (f64, f64, f64),
    same_sign: bool,
    c: f64,
) -> (f64, f64) {
    let mut ni: f64;
    let mut nj: f64;
    if !same_sign {
        let mut quad = qii + qjj + 2.0 * qij;
        if quad <= 0.0 {
            quad = TAU;
        }
        let delta = (-gi - gj) / quad;
        let diff = ai - aj;
        ni = ai + delta;
        nj = aj + delta;
        if diff > 0.0 {
            if nj < 0.0 {
                nj = 0.0;
                ni = diff;
            }
        } else if ni < 0.0 {
            ni = 0.0;
            nj = -diff;
        }
        if diff > 0.0 {
            if ni > c {
                ni = c;
                nj = c - diff;
            }
        } else if nj > c {
            nj = c;
            ni = c + diff;
        }
    } else {
        let mut quad = qii + qjj - 2.0 * qij;
        if quad <= 0.0 {
            quad = TAU;
        }
        let delta = (gi - gj) / quad;
        let sum = ai + aj;
        ni = ai - delta;
        nj = aj + delta;
        if sum > c {
            if ni > c {
                ni = c;
                nj = sum - c;
            }
        } else if nj < 0.0 {
            nj = 0.0;
            ni = sum;
        }
        if sum > c {
            if nj > c {
                nj = c;
                ni = sum - c;
            }
        } else if ni < 0.0 {
            ni = 0.0;
            nj = sum;
        }
    }
    (ni, nj)
}

/// `grad_t = d_t (a_t . w) - 1` for every point.
fn refresh_gradient(a: &CsrMatrix, d: &[f64], w: &[f64], grad: &mut [f64], parallel: bool) {
    let kernel = |(t, g): (usize, &mut f64)| {
        *g = d[t] * a.row_dot(t, w) - 1.0;
    };
    if parallel && a.height >= PAR_ROWS {
        grad.par_iter_mut().enumerate().for_each(kernel);
    } else {
        grad.iter_mut().enumerate().for_each(kernel);
    }
}

/// Intercept from free support vectors, or the midpoint of the feasible interval.
fn intercept(d: &[f64], alpha: &[f64], grad: &[f64], c: f64) -> f64 {
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut n_free = 0usize;
    let mut sum_free = 0.0;

    for t in 0..d.len() {
        let yg = d[t] * grad[t];
        if alpha[t] >= c {
            if d[t] < 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else if alpha[t] <= 0.0 {
            if d[t] > 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else {
            n_free += 1;
            sum_free += yg;
        }
    }

    let rho = if n_free > 0 {
        sum_free / n_free as f64
    } else if ub.is_finite() && lb.is_finite() {
        0.5 * (ub + lb)
    } else if ub.is_finite() {
        ub
    } else if lb.is_finite() {
        lb
    } else {
        0.0
    };
    -rho
}

impl SvmSolver for SmoSolver {
    fn name(&self) -> &'static str {
        "smo"
    }

    fn solve(&self, a: &CsrMatrix, d: &[f64], lambda: f64, ctrl: &SvmCtrl) -> Result<SvmSolution> {
        if d.len() != a.height {
            return Err(SvmError::shape("labels", a.height, d.len()));
        }
        if lambda <= 0.0 || !lambda.is_finite() {
            return Err(SvmError::invalid_config(format!(
                "lambda must be positive and finite (got {})",
                lambda
            )));
        }

        let n = a.height;
        let c = lambda;
        let qd: Vec<f64> = (0..n).map(|t| a.row_norm_sq(t)).collect();

        let mut alpha = vec![0.0; n];
        let mut w = vec![0.0; a.width];
        let mut grad = vec![-1.0; n];

        let mut iters = 0usize;
        let mut gap: f64;

        loop {
            let Some((i, j, g)) = select_pair(d, &alpha, &grad, c) else {
                gap = 0.0;
                break;
            };
            gap = g;
            if gap < ctrl.tolerance {
                break;
            }
            if iters >= ctrl.max_iters {
                return Err(SvmError::solver_failed(
                    lambda,
                    iters,
                    format!("no convergence (KKT gap {:.3e} > {:.3e})", gap, ctrl.tolerance),
                ));
            }

            let same_sign = d[i] == d[j];
            let qij = d[i] * d[j] * a.rows_dot(i, j);
            let (ni, nj) = update_pair(
                (alpha[i], alpha[j]),
                (grad[i], grad[j]),
                (qd[i], qd[j], qij),
                same_sign,
                c,
            );

            a.axpy_row(i, d[i] * (ni - alpha[i]), &mut w);
            a.axpy_row(j, d[j] * (nj - alpha[j]), &mut w);
            alpha[i] = ni;
            alpha[j] = nj;

            refresh_gradient(a, d, &w, &mut grad, ctrl.parallel);
            iters += 1;

            if !grad[i].is_finite() || !grad[j].is_finite() {
                return Err(SvmError::solver_failed(lambda, iters, "non-finite gradient"));
            }
            if ctrl.progress && ctrl.progress_every > 0 && iters % ctrl.progress_every == 0 {
                info!(iter = iters, gap, lambda, "smo progress");
            }
        }

        if grad.iter().any(|g| !g.is_finite()) {
            return Err(SvmError::solver_failed(lambda, iters, "non-finite gradient"));
        }

        let beta = intercept(d, &alpha, &grad, c);
        let z: Vec<f64> = (0..n)
            .map(|t| (1.0 - d[t] * (a.row_dot(t, &w) + beta)).max(0.0))
            .collect();

        let w_sq: f64 = w.iter().map(|x| x * x).sum();
        let primal_objective = 0.5 * w_sq + c * z.iter().sum::<f64>();
        let dual_objective = alpha.iter().sum::<f64>() - 0.5 * w_sq;

        debug!(
            iters,
            gap,
            primal = primal_objective,
            dual = dual_objective,
            "smo converged"
        );

        Ok(SvmSolution {
            w,
            beta,
            z,
            alpha,
            iters,
            primal_objective,
            dual_objective,
        })
    }
}
