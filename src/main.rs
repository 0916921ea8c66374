// src/main.rs
//
// Assemble the stacked finite-difference dataset, label it from a random
// hyperplane, and sweep the SVM regularization parameter.
//
// Examples:
//
//   cargo run --release
//       -> default 50x50 grids, lambda in {1, 4, 7, 10}, single worker.
//
//   cargo run --release -- --n0 20 --n1 20 --workers 4 --partition cyclic --display
//       -> four simulated workers, print wGen / A / d / [w;beta;z].
//
//   cargo run --release -- --config sweep.json --plots --dump
//       -> load a JSON config, write PNGs and A.mtx / wGen.csv / d.csv.
//
// Per run:
//   runs/<run_id>/
//     ├── config.json
//     ├── sweep.csv
//     ├── A.mtx, wGen.csv, d.csv   (--dump)
//     └── plots/*.png              (--plots)
//
// Logging goes through tracing; set RUST_LOG=debug for per-shard detail.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use svm_sweep::config::{ExperimentConfig, RunConfig, RunInfo};
use svm_sweep::display::{ConsoleDisplay, DisplaySink, MultiDisplay, PlotDisplay, save_sweep_time_plot};
use svm_sweep::experiment::run_experiment;
use svm_sweep::output::{create_run_dir, write_matrix_market, write_sweep_csv, write_vector_csv};
use svm_sweep::partition::{RowPartition, World};
use svm_sweep::svm::{SmoSolver, SvmSolver};

fn parse_partition(s: &str) -> std::result::Result<RowPartition, String> {
    RowPartition::from_arg(s).ok_or_else(|| format!("unknown partition '{}' (block|cyclic)", s))
}

#[derive(Parser, Debug)]
#[command(
    name = "svm_sweep",
    about = "Stacked 2D finite-difference SVM dataset and lambda sweep",
    version
)]
struct Cli {
    /// JSON experiment config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    n0: Option<usize>,
    #[arg(long)]
    n1: Option<usize>,

    #[arg(long)]
    num_lambdas: Option<usize>,
    #[arg(long)]
    start_lambda: Option<f64>,
    #[arg(long)]
    end_lambda: Option<f64>,

    /// Affine offset of the generating hyperplane.
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<f64>,
    /// Seed shared by all workers.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated workers.
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long, value_parser = parse_partition)]
    partition: Option<RowPartition>,

    /// Print wGen, offset, A, d and every [w;beta;z].
    #[arg(long)]
    display: bool,
    /// Render displayed objects and the timing curve as PNGs.
    #[arg(long)]
    plots: bool,
    /// Write A.mtx, wGen.csv and d.csv into the run directory.
    #[arg(long)]
    dump: bool,
    /// Keep sweeping after a failed solve.
    #[arg(long)]
    continue_on_failure: bool,
    /// Wait for Enter before exiting (single worker only).
    #[arg(long)]
    pause: bool,

    /// Log solver progress.
    #[arg(long)]
    progress: bool,
    #[arg(long)]
    tolerance: Option<f64>,
    #[arg(long)]
    max_iters: Option<usize>,

    /// Output root directory.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    run_id: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ExperimentConfig> {
        let mut cfg = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ExperimentConfig::default(),
        };

        if let Some(v) = self.n0 {
            cfg.n0 = v;
        }
        if let Some(v) = self.n1 {
            cfg.n1 = v;
        }
        if let Some(v) = self.num_lambdas {
            cfg.num_lambdas = v;
        }
        if let Some(v) = self.start_lambda {
            cfg.start_lambda = v;
        }
        if let Some(v) = self.end_lambda {
            cfg.end_lambda = v;
        }
        if let Some(v) = self.offset {
            cfg.offset = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.workers {
            cfg.workers = v;
        }
        if let Some(v) = self.partition {
            cfg.partition = v;
        }
        if let Some(v) = self.tolerance {
            cfg.solver.tolerance = v;
        }
        if let Some(v) = self.max_iters {
            cfg.solver.max_iters = v;
        }
        if let Some(v) = self.out {
            cfg.out_dir = v;
        }
        if self.run_id.is_some() {
            cfg.run_id = self.run_id;
        }

        cfg.display |= self.display;
        cfg.plots |= self.plots;
        cfg.dump |= self.dump;
        cfg.continue_on_failure |= self.continue_on_failure;
        cfg.pause |= self.pause;
        cfg.solver.progress |= self.progress;
        Ok(cfg)
    }
}

fn default_run_id(cfg: &ExperimentConfig, ts: u64) -> String {
    format!(
        "{}_n{}x{}_w{}_{}",
        ts,
        cfg.n0,
        cfg.n1,
        cfg.workers,
        cfg.partition.as_str()
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Cli::parse().into_config()?;
    cfg.validate().context("invalid configuration")?;

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .ok();
    let run_id = cfg
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(&cfg, ts.unwrap_or(0)));
    let run_dir = create_run_dir(&cfg.out_dir, &run_id)?;
    info!(dir = %run_dir.display(), "run directory");

    let solver = SmoSolver;
    RunConfig {
        experiment: cfg.clone(),
        run: RunInfo {
            binary: "svm_sweep".to_string(),
            run_id: run_id.clone(),
            solver: solver.name().to_string(),
            timestamp_unix: ts,
        },
    }
    .write_to_dir(&run_dir)?;

    let root = World::single();
    let mut sink = MultiDisplay::default();
    if cfg.display {
        sink.sinks.push(Box::new(ConsoleDisplay::new(root)));
    }
    if cfg.plots {
        sink.sinks.push(Box::new(PlotDisplay::new(run_dir.join("plots"))?));
    }

    let (data, records) = run_experiment(&cfg, &solver, &mut sink as &mut dyn DisplaySink)?;

    write_sweep_csv(&run_dir.join("sweep.csv"), &records)?;
    if cfg.plots {
        save_sweep_time_plot(&records, &run_dir.join("plots").join("sweep_time.png"))?;
    }
    if cfg.dump {
        write_matrix_market(&run_dir.join("A.mtx"), &data.a)?;
        write_vector_csv(&run_dir.join("wGen.csv"), "wGen", &data.plane.w)?;
        write_vector_csv(&run_dir.join("d.csv"), "d", &data.d)?;
    }
    info!(dir = %run_dir.display(), "outputs written");

    if cfg.pause && cfg.workers == 1 {
        println!("Press Enter to exit");
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
    }
    Ok(())
}
