// src/config.rs

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmError};
use crate::grid::StackedGrid;
use crate::partition::RowPartition;
use crate::svm::SvmCtrl;
use crate::sweep::SweepSettings;

/// Everything that defines one experiment. Omitted JSON fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub n0: usize,
    pub n1: usize,

    pub num_lambdas: usize,
    pub start_lambda: f64,
    pub end_lambda: f64,

    /// Affine shift of the generating hyperplane.
    pub offset: f64,
    /// Shared by every worker so all shards draw the same hyperplane.
    pub seed: u64,

    pub workers: usize,
    pub partition: RowPartition,

    /// Show wGen, A, d and each solution through the display sink.
    pub display: bool,
    /// Render displayed objects (and the timing curve) as PNGs.
    pub plots: bool,
    /// Dump A (Matrix Market), wGen and d into the run directory.
    pub dump: bool,
    pub continue_on_failure: bool,
    /// Wait for Enter before exiting (single-worker runs only).
    pub pause: bool,

    pub solver: SvmCtrl,

    pub out_dir: PathBuf,
    pub run_id: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            n0: 50,
            n1: 50,
            num_lambdas: 4,
            start_lambda: 1.0,
            end_lambda: 10.0,
            offset: 0.3147,
            seed: 0,
            workers: 1,
            partition: RowPartition::Block,
            display: false,
            plots: false,
            dump: false,
            continue_on_failure: false,
            pause: false,
            solver: SvmCtrl::default(),
            out_dir: PathBuf::from("runs"),
            run_id: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let cfg = serde_json::from_reader(BufReader::new(file))?;
        Ok(cfg)
    }

    /// All fail-fast checks; run before any assembly work.
    pub fn validate(&self) -> Result<()> {
        let height = self.grid()?.height();
        if self.num_lambdas < 2 {
            return Err(SvmError::invalid_config(format!(
                "num_lambdas must be at least 2 (got {})",
                self.num_lambdas
            )));
        }
        for (name, v) in [("start_lambda", self.start_lambda), ("end_lambda", self.end_lambda)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(SvmError::invalid_config(format!(
                    "{} must be positive and finite (got {})",
                    name, v
                )));
            }
        }
        if !self.offset.is_finite() {
            return Err(SvmError::invalid_config("offset must be finite"));
        }
        if self.workers == 0 {
            return Err(SvmError::invalid_config("workers must be positive"));
        }
        if self.workers > height {
            return Err(SvmError::invalid_config(format!(
                "{} workers for {} rows leaves some workers empty",
                self.workers, height
            )));
        }
        if self.solver.tolerance <= 0.0 || !self.solver.tolerance.is_finite() {
            return Err(SvmError::invalid_config("solver tolerance must be positive"));
        }
        Ok(())
    }

    pub fn grid(&self) -> Result<StackedGrid> {
        StackedGrid::new(self.n0, self.n1)
    }

    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            num_lambdas: self.num_lambdas,
            start_lambda: self.start_lambda,
            end_lambda: self.end_lambda,
            continue_on_failure: self.continue_on_failure,
            display: self.display,
        }
    }
}

/// Config plus provenance, written as `config.json` into each run directory.
#[derive(Serialize)]
pub struct RunConfig {
    pub experiment: ExperimentConfig,
    pub run: RunInfo,
}

#[derive(Serialize)]
pub struct RunInfo {
    pub binary: String,
    pub run_id: String,
    pub solver: String,
    pub timestamp_unix: Option<u64>,
}

impl RunConfig {
    pub fn write_to_dir(&self, out_dir: &Path) -> Result<()> {
        let path = out_dir.join("config.json");
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ExperimentConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.grid().unwrap().height(), 5000);
    }

    #[test]
    fn invalid_settings_fail_fast() {
        let bad = [
            ExperimentConfig { n0: 0, ..Default::default() },
            ExperimentConfig { num_lambdas: 1, ..Default::default() },
            ExperimentConfig { start_lambda: 0.0, ..Default::default() },
            ExperimentConfig { end_lambda: f64::NAN, ..Default::default() },
            ExperimentConfig { workers: 0, ..Default::default() },
            ExperimentConfig { n0: 1, n1: 1, workers: 3, ..Default::default() },
            ExperimentConfig { n0: usize::MAX, n1: usize::MAX, ..Default::default() },
            ExperimentConfig { n0: usize::MAX / 2, n1: 2, ..Default::default() },
        ];
        for cfg in &bad {
            let err = cfg.validate().unwrap_err();
            assert!(err.is_config(), "expected config error, got {}", err);
        }
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: ExperimentConfig =
            serde_json::from_str(r#"{ "n0": 3, "partition": "cyclic", "solver": { "progress": true } }"#)
                .unwrap();
        assert_eq!(cfg.n0, 3);
        assert_eq!(cfg.n1, 50);
        assert_eq!(cfg.partition, RowPartition::Cyclic);
        assert!(cfg.solver.progress);
        assert_eq!(cfg.solver.max_iters, SvmCtrl::default().max_iters);
    }

    #[test]
    fn run_config_round_trips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let rc = RunConfig {
            experiment: ExperimentConfig { n0: 4, ..Default::default() },
            run: RunInfo {
                binary: "svm_sweep".into(),
                run_id: "t".into(),
                solver: "smo".into(),
                timestamp_unix: None,
            },
        };
        rc.write_to_dir(tmp.path()).unwrap();

        let text = std::fs::read_to_string(tmp.path().join("config.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        let back: ExperimentConfig = serde_json::from_value(v["experiment"].clone()).unwrap();
        assert_eq!(back.n0, 4);
    }
}
