// src/partition.rs
//
// In-process model of the distributed runtime: a worker identity (rank, size)
// and the rule deciding which global rows a worker owns.
//
// Assembly code only ever asks "which global row is my local row k?", so any
// partition scheme can be plugged in without touching the stencil code.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmError};

/// This worker's identity within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct World {
    pub rank: usize,
    pub size: usize,
}

impl World {
    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SvmError::invalid_config("world size must be positive"));
        }
        if rank >= size {
            return Err(SvmError::invalid_config(format!(
                "rank {} out of range for world size {}",
                rank, size
            )));
        }
        Ok(Self { rank, size })
    }

    /// A single-worker world.
    pub fn single() -> Self {
        Self { rank: 0, size: 1 }
    }

    /// All ranks of a world of `size` workers.
    pub fn all(size: usize) -> Result<Vec<World>> {
        if size == 0 {
            return Err(SvmError::invalid_config("world size must be positive"));
        }
        (0..size).map(|r| World::new(r, size)).collect()
    }

    /// Rank 0 is the only console writer.
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }
}

/// How rows are distributed over workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowPartition {
    /// Contiguous blocks; the first `height % size` workers get one extra row.
    #[default]
    Block,
    /// Round-robin: row `s` belongs to worker `s % size`.
    Cyclic,
}

impl RowPartition {
    pub fn from_arg(s: &str) -> Option<Self> {
        match s {
            "block" | "contiguous" => Some(Self::Block),
            "cyclic" | "roundrobin" | "round-robin" => Some(Self::Cyclic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Cyclic => "cyclic",
        }
    }

    /// Number of rows `world` owns out of `height`.
    ///
    /// Both schemes hand the `height % size` leftover rows to the lowest ranks,
    /// so the count is the same; only the placement differs.
    pub fn local_height(&self, height: usize, world: World) -> usize {
        let base = height / world.size;
        let extra = height % world.size;
        base + usize::from(world.rank < extra)
    }

    /// Global index of local row `local` on `world`.
    pub fn global_row(&self, local: usize, height: usize, world: World) -> usize {
        match self {
            Self::Block => {
                let base = height / world.size;
                let extra = height % world.size;
                let first = world.rank * base + world.rank.min(extra);
                first + local
            }
            Self::Cyclic => world.rank + local * world.size,
        }
    }

    /// Rank owning global row `s`.
    pub fn owner(&self, s: usize, height: usize, size: usize) -> usize {
        match self {
            Self::Block => {
                let base = height / size;
                let extra = height % size;
                let split = extra * (base + 1);
                if s < split {
                    s / (base + 1)
                } else {
                    extra + (s - split) / base
                }
            }
            Self::Cyclic => s % size,
        }
    }

    /// All global rows owned by `world`, in local order.
    pub fn owned_rows(&self, height: usize, world: World) -> Vec<usize> {
        (0..self.local_height(height, world))
            .map(|k| self.global_row(k, height, world))
            .collect()
    }
}
