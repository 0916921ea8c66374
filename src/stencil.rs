// src/stencil.rs
//
// Two 2D five-point finite-difference operators stacked on top of each other,
// with an extra dense last column:
//
//   A = | FD_upper |  + (-10 / height) * [0 ... 0 1]   for every row
//       | FD_lower |
//
// Height 2*n0*n1, width n0*n1. Row s of either block touches the cell
// (x0, x1) = (r % n0, r / n0) where r is s relative to its block, and its
// four neighbours when they lie inside the grid.
//
// Where a stencil column coincides with the last column the two entries are
// summed at commit time.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::dist_sparse::DistSparseMatrix;
use crate::error::{Result, SvmError};
use crate::grid::{Block, StackedGrid};
use crate::partition::{RowPartition, World};

/// Maximum entries queued for one row: five stencil points plus the dense column.
pub const MAX_ENTRIES_PER_ROW: usize = 6;

/// Numerator of the dense last-column value (`DENSE_NUMERATOR / height`).
pub const DENSE_NUMERATOR: f64 = -10.0;

/// Five-point stencil weights for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilCoeffs {
    pub center: f64,
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl StencilCoeffs {
    pub const UPPER: Self = Self {
        center: 11.0,
        west: -10.0,
        east: 20.0,
        north: -30.0,
        south: 40.0,
    };

    pub const LOWER: Self = Self {
        center: -20.0,
        west: -1.0,
        east: -2.0,
        north: -3.0,
        south: 3.0,
    };

    pub fn for_block(block: Block) -> Self {
        match block {
            Block::Upper => Self::UPPER,
            Block::Lower => Self::LOWER,
        }
    }
}

/// Value stored in the last column of every row.
#[inline]
pub fn dense_column_value(grid: &StackedGrid) -> f64 {
    DENSE_NUMERATOR / grid.height() as f64
}

/// `(column, value)` updates queued for global row `s`, in emission order.
///
/// The last element is always the dense-column entry.
pub fn row_entries(grid: &StackedGrid, s: usize) -> Vec<(usize, f64)> {
    let (block, r) = grid.locate(s);
    let c = StencilCoeffs::for_block(block);
    let (x0, x1) = grid.coords(r);
    let n0 = grid.n0;

    let mut out = Vec::with_capacity(MAX_ENTRIES_PER_ROW);
    out.push((r, c.center));
    if x0 > 0 {
        out.push((r - 1, c.west));
    }
    if x0 + 1 < grid.n0 {
        out.push((r + 1, c.east));
    }
    if x1 > 0 {
        out.push((r - n0, c.north));
    }
    if x1 + 1 < grid.n1 {
        out.push((r + n0, c.south));
    }
    out.push((grid.width() - 1, dense_column_value(grid)));
    out
}

/// Queue and commit the rows of the stacked operator owned by `a`.
///
/// Only `a`'s own rows are touched; the set of owned rows may be any subset.
pub fn fill_stacked_fd(grid: &StackedGrid, a: &mut DistSparseMatrix) -> Result<()> {
    if a.height() != grid.height() {
        return Err(SvmError::shape("stacked FD height", grid.height(), a.height()));
    }
    if a.width() != grid.width() {
        return Err(SvmError::shape("stacked FD width", grid.width(), a.width()));
    }
    let local_height = a.local_height();
    a.reserve(MAX_ENTRIES_PER_ROW * local_height);

    for s_loc in 0..local_height {
        let s = a.global_row(s_loc)?;
        for (col, value) in row_entries(grid, s) {
            a.queue_update(s_loc, col, value)?;
        }
    }
    a.process_queues()
}

/// Assemble the shard of the stacked operator owned by `world`.
pub fn stacked_fd_2d(
    grid: &StackedGrid,
    world: World,
    partition: RowPartition,
) -> Result<DistSparseMatrix> {
    let mut a = DistSparseMatrix::new(grid.height(), grid.width(), world, partition);
    fill_stacked_fd(grid, &mut a)?;
    debug!(
        rank = world.rank,
        local_height = a.local_height(),
        nnz = a.local_nnz()?,
        "assembled stacked FD shard"
    );
    Ok(a)
}

/// Assemble every shard of a `size`-worker run, one worker per rayon task.
pub fn assemble_all(
    grid: &StackedGrid,
    size: usize,
    partition: RowPartition,
) -> Result<Vec<DistSparseMatrix>> {
    let shards: Vec<DistSparseMatrix> = World::all(size)?
        .into_par_iter()
        .map(|w| stacked_fd_2d(grid, w, partition))
        .collect::<Result<_>>()?;

    let nnz: usize = shards
        .iter()
        .map(|a| a.local_nnz())
        .sum::<Result<usize>>()?;
    info!(
        n0 = grid.n0,
        n1 = grid.n1,
        height = grid.height(),
        width = grid.width(),
        workers = size,
        partition = partition.as_str(),
        nnz,
        "assembled stacked FD operator"
    );
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_corner_row_on_2x2() {
        let g = StackedGrid::new(2, 2).unwrap();
        // s=0: (0,0): centre, east, south, dense
        assert_eq!(
            row_entries(&g, 0),
            vec![(0, 11.0), (1, 20.0), (2, 40.0), (3, -1.25)]
        );
    }

    #[test]
    fn lower_block_uses_relative_index() {
        let g = StackedGrid::new(2, 2).unwrap();
        // s=7 -> r=3: (1,1): centre, west, north, dense
        assert_eq!(
            row_entries(&g, 7),
            vec![(3, -20.0), (2, -1.0), (1, -3.0), (3, -1.25)]
        );
    }

    #[test]
    fn interior_row_has_six_entries() {
        let g = StackedGrid::new(3, 3).unwrap();
        let e = row_entries(&g, 4);
        assert_eq!(e.len(), MAX_ENTRIES_PER_ROW);
        assert_eq!(e[..5], [(4, 11.0), (3, -10.0), (5, 20.0), (1, -30.0), (7, 40.0)]);
    }

    #[test]
    fn dense_value_is_real_division() {
        let g = StackedGrid::new(3, 5).unwrap();
        assert!((dense_column_value(&g) - (-10.0 / 30.0)).abs() < 1e-15);
    }

    #[test]
    fn reserve_covers_queued_entries() {
        let g = StackedGrid::new(3, 3).unwrap();
        let w = World::new(0, 2).unwrap();
        let mut a = DistSparseMatrix::new(g.height(), g.width(), w, RowPartition::Block);
        a.reserve(MAX_ENTRIES_PER_ROW * a.local_height());
        let cap = a.reserved();
        for k in 0..a.local_height() {
            let s = a.global_row(k).unwrap();
            for (col, v) in row_entries(&g, s) {
                a.queue_update(k, col, v).unwrap();
            }
        }
        assert!(a.queued() <= cap);
        assert_eq!(a.reserved(), cap, "queue reallocated during assembly");
    }
}
