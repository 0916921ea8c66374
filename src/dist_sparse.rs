// src/dist_sparse.rs
//
// Row-distributed sparse matrix.
//
// Each worker holds a shard: the global shape, the global rows it owns
// (in local order) and a local CSR block whose row k is global row
// `owned[k]`. Columns are always global.
//
// Lifecycle mirrors a declare-then-materialize build:
//   resize/new -> reserve -> queue_update* -> process_queues -> queries
// Queries before process_queues fail with NotCommitted; a second
// process_queues fails with AlreadyCommitted.

use tracing::debug;

use crate::error::{Result, SvmError};
use crate::partition::{RowPartition, World};
use crate::sparse::{CsrMatrix, SparseBuilder};

#[derive(Debug)]
pub struct DistSparseMatrix {
    height: usize,
    width: usize,
    world: World,
    owned: Vec<usize>,
    builder: SparseBuilder,
    local: Option<CsrMatrix>,
}

impl DistSparseMatrix {
    /// Shard of a `height × width` matrix using a standard partition.
    pub fn new(height: usize, width: usize, world: World, partition: RowPartition) -> Self {
        let owned = partition.owned_rows(height, world);
        Self::from_owned(height, width, world, owned)
    }

    /// Shard owning an arbitrary (caller-supplied) set of global rows.
    ///
    /// Every row must lie below `height` and appear at most once.
    pub fn with_rows(height: usize, width: usize, world: World, owned: Vec<usize>) -> Result<Self> {
        let mut seen = vec![false; height];
        for &s in &owned {
            let slot = seen
                .get_mut(s)
                .ok_or(SvmError::RowOutOfRange { row: s, height })?;
            if *slot {
                return Err(SvmError::RowOwnedTwice { row: s });
            }
            *slot = true;
        }
        Ok(Self::from_owned(height, width, world, owned))
    }

    fn from_owned(height: usize, width: usize, world: World, owned: Vec<usize>) -> Self {
        let local_height = owned.len();
        Self {
            height,
            width,
            world,
            owned,
            builder: SparseBuilder::new(local_height, width),
            local: None,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn world(&self) -> World {
        self.world
    }

    pub fn local_height(&self) -> usize {
        self.owned.len()
    }

    /// Global row index of local row `local`.
    pub fn global_row(&self, local: usize) -> Result<usize> {
        self.owned
            .get(local)
            .copied()
            .ok_or(SvmError::LocalRowOutOfRange {
                local,
                local_height: self.owned.len(),
            })
    }

    /// Global rows owned by this shard, in local order.
    pub fn owned_rows(&self) -> &[usize] {
        &self.owned
    }

    /// Local index of a global row, if owned here.
    pub fn local_row(&self, global: usize) -> Option<usize> {
        self.owned.iter().position(|&s| s == global)
    }

    pub fn reserve(&mut self, n: usize) {
        self.builder.reserve(n);
    }

    pub fn reserved(&self) -> usize {
        self.builder.capacity()
    }

    pub fn queued(&self) -> usize {
        self.builder.queued()
    }

    /// Queue `value` at (local row, global column).
    pub fn queue_update(&mut self, local: usize, col: usize, value: f64) -> Result<()> {
        if self.local.is_some() {
            return Err(SvmError::AlreadyCommitted);
        }
        self.builder.queue(local, col, value)
    }

    /// Queue `value` at (global row, global column); the row must be owned here.
    pub fn queue_global_update(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let local = self.local_row(row).ok_or(SvmError::RowNotOwned { row })?;
        self.queue_update(local, col, value)
    }

    /// Commit every queued entry. Duplicates are summed.
    pub fn process_queues(&mut self) -> Result<()> {
        if self.local.is_some() {
            return Err(SvmError::AlreadyCommitted);
        }
        let csr = self.builder.commit()?;
        debug!(
            rank = self.world.rank,
            local_height = csr.height,
            nnz = csr.nnz(),
            "processed sparse queues"
        );
        self.local = Some(csr);
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.local.is_some()
    }

    /// Committed local block (rows in local order, global columns).
    pub fn local_csr(&self) -> Result<&CsrMatrix> {
        self.local.as_ref().ok_or(SvmError::NotCommitted)
    }

    pub fn local_nnz(&self) -> Result<usize> {
        Ok(self.local_csr()?.nnz())
    }

    /// Local rows of `alpha * A x + beta * y_local`, with `x` replicated on every worker.
    pub fn multiply(&self, alpha: f64, x: &[f64], beta: f64, y_local: &mut [f64]) -> Result<()> {
        self.local_csr()?.multiply(alpha, x, beta, y_local)
    }
}

/// Collect committed shards into one global CSR matrix.
///
/// Shards must describe the same global shape and together own every row exactly once.
pub fn gather_csr(shards: &[DistSparseMatrix]) -> Result<CsrMatrix> {
    let Some(first) = shards.first() else {
        return Err(SvmError::invalid_config("no shards to gather"));
    };
    let (height, width) = (first.height, first.width);

    let mut rows: Vec<Option<(&CsrMatrix, usize)>> = vec![None; height];
    for shard in shards {
        if shard.height != height || shard.width != width {
            return Err(SvmError::shape("shard height", height, shard.height));
        }
        let local = shard.local_csr()?;
        for (k, &s) in shard.owned.iter().enumerate() {
            let slot = rows
                .get_mut(s)
                .ok_or(SvmError::RowOutOfRange { row: s, height })?;
            if slot.is_some() {
                return Err(SvmError::RowOwnedTwice { row: s });
            }
            *slot = Some((local, k));
        }
    }

    let mut out = CsrMatrix::zeros(height, width);
    for (s, slot) in rows.into_iter().enumerate() {
        let (local, k) = slot.ok_or(SvmError::RowNotOwned { row: s })?;
        for (j, v) in local.row(k) {
            out.col_idx.push(j);
            out.values.push(v);
        }
        out.row_ptr[s + 1] = out.col_idx.len();
    }
    Ok(out)
}

/// Collect per-worker vector pieces (indexed by each shard's owned rows) into a global vector.
///
/// Same ownership rules as [`gather_csr`]: every row exactly once.
pub fn gather_vector(shards: &[DistSparseMatrix], pieces: &[Vec<f64>]) -> Result<Vec<f64>> {
    if shards.len() != pieces.len() {
        return Err(SvmError::shape("vector pieces", shards.len(), pieces.len()));
    }
    let height = shards.first().map_or(0, |s| s.height);
    let mut out: Vec<Option<f64>> = vec![None; height];
    for (shard, piece) in shards.iter().zip(pieces) {
        if shard.height != height {
            return Err(SvmError::shape("shard height", height, shard.height));
        }
        if piece.len() != shard.local_height() {
            return Err(SvmError::shape("vector piece", shard.local_height(), piece.len()));
        }
        for (&s, &v) in shard.owned.iter().zip(piece) {
            let slot = out
                .get_mut(s)
                .ok_or(SvmError::RowOutOfRange { row: s, height })?;
            if slot.is_some() {
                return Err(SvmError::RowOwnedTwice { row: s });
            }
            *slot = Some(v);
        }
    }
    out.into_iter()
        .enumerate()
        .map(|(s, v)| v.ok_or(SvmError::RowNotOwned { row: s }))
        .collect()
}
