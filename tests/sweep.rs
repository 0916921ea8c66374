// tests/sweep.rs
//
// Sweep driver wiring and end-to-end runs:
// - lambda values handed to the solver, in order
// - failure propagation vs. continue_on_failure
// - display sink receives what the driver promises
// - small real problem solved by the bundled SMO solver

use std::sync::Mutex;

use svm_sweep::config::ExperimentConfig;
use svm_sweep::display::{DisplaySink, NullDisplay};
use svm_sweep::error::{Result, SvmError};
use svm_sweep::experiment::{build_dataset, run_experiment};
use svm_sweep::labeler::{Hyperplane, frobenius_norm};
use svm_sweep::partition::{RowPartition, World};
use svm_sweep::sparse::CsrMatrix;
use svm_sweep::svm::{SmoSolver, SvmCtrl, SvmSolution, SvmSolver};
use svm_sweep::sweep::{SweepSettings, run_sweep};

/// Records every lambda; fails at the listed ones.
struct ScriptedSolver {
    fail_at: Vec<f64>,
    seen: Mutex<Vec<f64>>,
}

impl ScriptedSolver {
    fn new(fail_at: Vec<f64>) -> Self {
        Self {
            fail_at,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl SvmSolver for ScriptedSolver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn solve(&self, a: &CsrMatrix, _d: &[f64], lambda: f64, _ctrl: &SvmCtrl) -> Result<SvmSolution> {
        self.seen.lock().unwrap().push(lambda);
        if self.fail_at.contains(&lambda) {
            return Err(SvmError::solver_failed(lambda, 3, "scripted failure"));
        }
        Ok(SvmSolution {
            w: vec![0.0; a.width],
            beta: 1.0,
            z: vec![0.0; a.height],
            alpha: vec![0.0; a.height],
            iters: 1,
            primal_objective: 0.0,
            dual_objective: 0.0,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    names: Vec<String>,
    lengths: Vec<usize>,
}

impl DisplaySink for RecordingSink {
    fn vector(&mut self, name: &str, data: &[f64]) -> Result<()> {
        self.names.push(name.to_string());
        self.lengths.push(data.len());
        Ok(())
    }
    fn matrix(&mut self, name: &str, a: &CsrMatrix) -> Result<()> {
        self.names.push(name.to_string());
        self.lengths.push(a.height);
        Ok(())
    }
    fn scalar(&mut self, name: &str, _value: f64) -> Result<()> {
        self.names.push(name.to_string());
        self.lengths.push(1);
        Ok(())
    }
}

fn small_config() -> ExperimentConfig {
    ExperimentConfig {
        n0: 3,
        n1: 3,
        ..Default::default()
    }
}

fn settings(continue_on_failure: bool) -> SweepSettings {
    SweepSettings {
        num_lambdas: 4,
        start_lambda: 1.0,
        end_lambda: 10.0,
        continue_on_failure,
        display: false,
    }
}

#[test]
fn solver_sees_evenly_spaced_lambdas() {
    let data = build_dataset(&small_config()).unwrap();
    let solver = ScriptedSolver::new(vec![]);
    let records = run_sweep(
        &data.a,
        &data.d,
        &settings(false),
        &solver,
        &SvmCtrl::default(),
        World::single(),
        &mut NullDisplay,
    )
    .unwrap();

    assert_eq!(*solver.seen.lock().unwrap(), vec![1.0, 4.0, 7.0, 10.0]);
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.is_ok()));
    assert!(records.iter().all(|r| r.elapsed_s().unwrap() >= 0.0));
}

#[test]
fn failure_stops_the_sweep_by_default() {
    let data = build_dataset(&small_config()).unwrap();
    let solver = ScriptedSolver::new(vec![4.0]);
    let err = run_sweep(
        &data.a,
        &data.d,
        &settings(false),
        &solver,
        &SvmCtrl::default(),
        World::single(),
        &mut NullDisplay,
    )
    .unwrap_err();

    assert!(matches!(err, SvmError::SolverFailed { lambda, .. } if lambda == 4.0));
    assert_eq!(*solver.seen.lock().unwrap(), vec![1.0, 4.0]);
}

#[test]
fn continue_on_failure_records_the_gap() {
    let data = build_dataset(&small_config()).unwrap();
    let solver = ScriptedSolver::new(vec![4.0]);
    let records = run_sweep(
        &data.a,
        &data.d,
        &settings(true),
        &solver,
        &SvmCtrl::default(),
        World::single(),
        &mut NullDisplay,
    )
    .unwrap();

    assert_eq!(records.len(), 4);
    assert!(records[0].is_ok());
    assert!(!records[1].is_ok());
    assert!(records[1].elapsed_s().is_none());
    assert!(records[2].is_ok() && records[3].is_ok());
}

#[test]
fn non_positive_lambda_is_rejected_before_solving() {
    let data = build_dataset(&small_config()).unwrap();
    let solver = ScriptedSolver::new(vec![]);
    let s = SweepSettings {
        start_lambda: -1.0,
        ..settings(false)
    };
    let err = run_sweep(
        &data.a,
        &data.d,
        &s,
        &solver,
        &SvmCtrl::default(),
        World::single(),
        &mut NullDisplay,
    )
    .unwrap_err();
    assert!(err.is_config());
    assert!(solver.seen.lock().unwrap().is_empty());
}

#[test]
fn display_receives_dataset_and_solutions() {
    let cfg = ExperimentConfig {
        display: true,
        ..small_config()
    };
    let mut sink = RecordingSink::default();
    let solver = ScriptedSolver::new(vec![]);
    run_experiment(&cfg, &solver, &mut sink).unwrap();

    assert_eq!(&sink.names[..4], &["wGen", "offset", "A", "d"]);
    assert_eq!(&sink.lengths[..4], &[9, 1, 18, 18]);
    let packed: Vec<usize> = sink.lengths[4..].to_vec();
    assert_eq!(packed, vec![9 + 1 + 18; 4]);
}

#[test]
fn labels_are_reproducible_and_worker_independent() {
    let one = build_dataset(&small_config()).unwrap();
    let again = build_dataset(&small_config()).unwrap();
    assert_eq!(one.d, again.d);
    assert_eq!(one.plane, again.plane);

    let four = build_dataset(&ExperimentConfig {
        workers: 4,
        partition: RowPartition::Cyclic,
        ..small_config()
    })
    .unwrap();
    assert_eq!(one.a, four.a);
    assert_eq!(one.d, four.d);

    assert!((frobenius_norm(&one.plane.w) - 1.0).abs() < 1e-12);
    assert!(one.d.iter().all(|&v| v == 1.0 || v == -1.0));
}

#[test]
fn labels_match_hyperplane_side() {
    let data = build_dataset(&small_config()).unwrap();
    let plane = Hyperplane::random(9, 0.3147, 0).unwrap();
    let dist = data.a.apply(&plane.w).unwrap();
    for (i, (&di, &yi)) in dist.iter().zip(&data.d).enumerate() {
        let expected = if di - plane.offset > 0.0 { 1.0 } else { -1.0 };
        assert_eq!(yi, expected, "row {}", i);
    }
}

#[test]
fn smo_sweep_on_small_grid() {
    let cfg = ExperimentConfig {
        n0: 3,
        n1: 2,
        ..Default::default()
    };
    let (data, records) = run_experiment(&cfg, &SmoSolver, &mut NullDisplay).unwrap();

    assert_eq!(records.len(), 4);
    for r in &records {
        let s = r.outcome.as_ref().expect("solve should succeed");
        let sol = &s.solution;
        assert_eq!(sol.packed().len(), data.a.width + 1 + data.a.height);
        assert!(sol.z.iter().all(|&z| z >= 0.0));
        assert!(sol.primal_objective.is_finite());
        // weak duality
        assert!(sol.primal_objective >= sol.dual_objective - 1e-6);
        assert!(sol.alpha.iter().all(|&a| a >= 0.0 && a <= r.lambda + 1e-9));
    }
}
