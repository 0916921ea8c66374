// src/output.rs
//
// Run-directory writers:
//  - sweep table (CSV, one row per lambda)
//  - sparse matrix in Matrix Market coordinate format (1-based)
//  - dense vectors as single-column CSV
//
// Layout per run:
//   <out_root>/<run_id>/
//     ├── config.json
//     ├── sweep.csv
//     ├── A.mtx            (if requested)
//     ├── wGen.csv / d.csv (if requested)
//     └── plots/*.png      (if plots are enabled)

use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::sparse::CsrMatrix;
use crate::sweep::SweepRecord;

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    Ok(())
}

/// Replace anything outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_run_id(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<out_root>/<run_id>`, suffixed `_1`, `_2`, ... if it already exists.
pub fn unique_run_dir(out_root: &Path, run_id: &str) -> PathBuf {
    let base = out_root.to_path_buf();
    let mut dir = base.join(run_id);
    if !dir.exists() {
        return dir;
    }
    for k in 1..1000 {
        let cand = base.join(format!("{}_{}", run_id, k));
        if !cand.exists() {
            dir = cand;
            break;
        }
    }
    dir
}

/// Create a fresh run directory and return its path.
pub fn create_run_dir(out_root: &Path, run_id: &str) -> Result<PathBuf> {
    let dir = unique_run_dir(out_root, &sanitize_run_id(run_id));
    create_dir_all(&dir)?;
    Ok(dir)
}

pub fn write_sweep_csv(path: &Path, records: &[SweepRecord]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(
        w,
        "lambda,elapsed_s,iters,objective,train_accuracy,num_support,status"
    )?;
    for r in records {
        match &r.outcome {
            Ok(s) => writeln!(
                w,
                "{:.16e},{:.6e},{},{:.16e},{:.6},{},ok",
                r.lambda,
                s.elapsed_s,
                s.solution.iters,
                s.solution.primal_objective,
                s.train_accuracy,
                s.solution.num_support()
            )?,
            Err(msg) => writeln!(
                w,
                "{:.16e},,,,,,\"failed: {}\"",
                r.lambda,
                msg.replace('"', "'")
            )?,
        }
    }
    w.flush()?;
    Ok(())
}

pub fn write_matrix_market(path: &Path, a: &CsrMatrix) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "%%MatrixMarket matrix coordinate real general")?;
    writeln!(w, "{} {} {}", a.height, a.width, a.nnz())?;
    for (i, j, v) in a.triplets() {
        writeln!(w, "{} {} {:.16e}", i + 1, j + 1, v)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_vector_csv(path: &Path, header: &str, data: &[f64]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "{}", header)?;
    for v in data {
        writeln!(w, "{:.16e}", v)?;
    }
    w.flush()?;
    Ok(())
}
