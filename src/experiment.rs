// src/experiment.rs
//
// One full run:
//   validate config -> assemble shards (one task per worker)
//   -> each worker draws the hyperplane from the shared seed and labels its rows
//   -> gather (A, d) -> lambda sweep.

use rayon::prelude::*;
use tracing::info;

use crate::config::ExperimentConfig;
use crate::dist_sparse::{DistSparseMatrix, gather_csr, gather_vector};
use crate::display::DisplaySink;
use crate::error::{Result, SvmError};
use crate::grid::StackedGrid;
use crate::labeler::{Hyperplane, local_labels, report_balance};
use crate::partition::World;
use crate::sparse::CsrMatrix;
use crate::svm::SvmSolver;
use crate::sweep::{SweepRecord, run_sweep};

/// Assembled operator, generating hyperplane and labels.
#[derive(Debug)]
pub struct Dataset {
    pub grid: StackedGrid,
    pub shards: Vec<DistSparseMatrix>,
    pub plane: Hyperplane,
    /// Gathered operator (all rows, global order).
    pub a: CsrMatrix,
    /// Gathered labels in {+1, -1}.
    pub d: Vec<f64>,
}

pub fn build_dataset(cfg: &ExperimentConfig) -> Result<Dataset> {
    cfg.validate()?;
    let grid = cfg.grid()?;
    let shards = crate::stencil::assemble_all(&grid, cfg.workers, cfg.partition)?;

    let per_worker: Vec<(Hyperplane, Vec<f64>)> = shards
        .par_iter()
        .map(|a| -> Result<(Hyperplane, Vec<f64>)> {
            let plane = Hyperplane::random(grid.width(), cfg.offset, cfg.seed)?;
            let d = local_labels(a, &plane)?;
            Ok((plane, d))
        })
        .collect::<Result<_>>()?;

    let plane = per_worker
        .first()
        .map(|(p, _)| p.clone())
        .ok_or_else(|| SvmError::invalid_config("no workers"))?;
    if per_worker.iter().any(|(p, _)| *p != plane) {
        return Err(SvmError::invalid_config(
            "workers disagree on the generating hyperplane",
        ));
    }

    let pieces: Vec<Vec<f64>> = per_worker.into_iter().map(|(_, d)| d).collect();
    let d = gather_vector(&shards, &pieces)?;
    let a = gather_csr(&shards)?;
    report_balance(&d);

    Ok(Dataset {
        grid,
        shards,
        plane,
        a,
        d,
    })
}

/// Build the dataset, show it if requested, and sweep lambda.
pub fn run_experiment(
    cfg: &ExperimentConfig,
    solver: &dyn SvmSolver,
    sink: &mut dyn DisplaySink,
) -> Result<(Dataset, Vec<SweepRecord>)> {
    let data = build_dataset(cfg)?;
    let root = World::single();

    if cfg.display {
        sink.vector("wGen", &data.plane.w)?;
        sink.scalar("offset", data.plane.offset)?;
        sink.matrix("A", &data.a)?;
        sink.vector("d", &data.d)?;
    }

    let records = run_sweep(
        &data.a,
        &data.d,
        &cfg.sweep_settings(),
        solver,
        &cfg.solver,
        root,
        sink,
    )?;

    let solved = records.iter().filter(|r| r.is_ok()).count();
    info!(
        solved,
        failed = records.len() - solved,
        solver = solver.name(),
        "sweep finished"
    );
    Ok((data, records))
}
