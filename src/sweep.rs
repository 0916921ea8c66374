// src/sweep.rs
//
// Regularization sweep: solve the same labelled problem for
//
//   lambda_j = start + j * (end - start) / (num - 1),   j = 0 .. num-1
//
// timing each solve. A failed solve is either returned immediately or, with
// `continue_on_failure`, recorded and the sweep moves on. Failures are never
// reported as successful solves.

use std::time::Instant;

use tracing::{info, warn};

use crate::display::DisplaySink;
use crate::error::{Result, SvmError};
use crate::partition::World;
use crate::sparse::CsrMatrix;
use crate::svm::{SvmCtrl, SvmSolution, SvmSolver};

/// Evenly spaced regularization values, both ends included. Needs `num >= 2`.
pub fn lambda_sequence(num: usize, start: f64, end: f64) -> Result<Vec<f64>> {
    if num < 2 {
        return Err(SvmError::invalid_config(format!(
            "num_lambdas must be at least 2 (got {})",
            num
        )));
    }
    if !start.is_finite() || !end.is_finite() {
        return Err(SvmError::invalid_config("lambda range must be finite"));
    }
    let span = end - start;
    let steps = (num - 1) as f64;
    Ok((0..num).map(|j| start + (j as f64 * span) / steps).collect())
}

#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub num_lambdas: usize,
    pub start_lambda: f64,
    pub end_lambda: f64,
    pub continue_on_failure: bool,
    /// Hand each packed solution to the display sink.
    pub display: bool,
}

/// Successful solve at one lambda.
#[derive(Debug, Clone)]
pub struct SweepSolve {
    pub elapsed_s: f64,
    pub solution: SvmSolution,
    pub train_accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct SweepRecord {
    pub index: usize,
    pub lambda: f64,
    /// `Err` holds the failure message when the sweep continued past it.
    pub outcome: std::result::Result<SweepSolve, String>,
}

impl SweepRecord {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn elapsed_s(&self) -> Option<f64> {
        self.outcome.as_ref().ok().map(|s| s.elapsed_s)
    }
}

/// Run the sweep over `(a, d)`. Console lines are written by the root rank only.
pub fn run_sweep(
    a: &CsrMatrix,
    d: &[f64],
    settings: &SweepSettings,
    solver: &dyn SvmSolver,
    ctrl: &SvmCtrl,
    world: World,
    sink: &mut dyn DisplaySink,
) -> Result<Vec<SweepRecord>> {
    if d.len() != a.height {
        return Err(SvmError::shape("labels", a.height, d.len()));
    }
    let lambdas = lambda_sequence(
        settings.num_lambdas,
        settings.start_lambda,
        settings.end_lambda,
    )?;
    if settings.start_lambda > settings.end_lambda {
        warn!(
            start = settings.start_lambda,
            end = settings.end_lambda,
            "lambda sweep runs downwards"
        );
    }
    if let Some(bad) = lambdas.iter().find(|&&l| l <= 0.0) {
        return Err(SvmError::invalid_config(format!(
            "every lambda must be positive (got {})",
            bad
        )));
    }

    let mut records = Vec::with_capacity(lambdas.len());
    for (index, &lambda) in lambdas.iter().enumerate() {
        if world.is_root() {
            println!("lambda = {}", lambda);
        }

        let t0 = Instant::now();
        let result = solver.solve(a, d, lambda, ctrl);
        let elapsed_s = t0.elapsed().as_secs_f64();

        let outcome = match result {
            Ok(solution) => {
                if world.is_root() {
                    println!("SVM time: {}", elapsed_s);
                }
                let train_accuracy = solution.train_accuracy(a, d);
                info!(
                    lambda,
                    elapsed_s,
                    iters = solution.iters,
                    objective = solution.primal_objective,
                    train_accuracy,
                    solver = solver.name(),
                    "solved"
                );
                if settings.display {
                    sink.vector("[w;beta;z]", &solution.packed())?;
                }
                Ok(SweepSolve {
                    elapsed_s,
                    solution,
                    train_accuracy,
                })
            }
            Err(e) if settings.continue_on_failure => {
                warn!(lambda, error = %e, "solve failed; continuing sweep");
                Err(e.to_string())
            }
            Err(e) => return Err(e),
        };

        records.push(SweepRecord {
            index,
            lambda,
            outcome,
        });
    }
    Ok(records)
}
