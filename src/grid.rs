// src/grid.rs

use crate::error::{Result, SvmError};

/// Which of the two stacked grids a matrix row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// Rows `[0, n0*n1)`.
    Upper,
    /// Rows `[n0*n1, 2*n0*n1)`.
    Lower,
}

/// Two N0 × N1 finite-difference grids stacked on top of each other.
///
/// Row `s` of the stacked operator maps to a cell of one of the two grids;
/// columns always address the (single) N0 × N1 unknown grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackedGrid {
    pub n0: usize,
    pub n1: usize,
}

impl StackedGrid {
    /// Create a stacked grid. Both dimensions must be positive and the
    /// stacked height `2*n0*n1` must fit in `usize`.
    pub fn new(n0: usize, n1: usize) -> Result<Self> {
        if n0 == 0 || n1 == 0 {
            return Err(SvmError::invalid_config(format!(
                "grid dimensions must be positive (n0={}, n1={})",
                n0, n1
            )));
        }
        if n0.checked_mul(n1).and_then(|n| n.checked_mul(2)).is_none() {
            return Err(SvmError::invalid_config(format!(
                "grid too large: 2*{}*{} rows overflows usize",
                n0, n1
            )));
        }
        Ok(Self { n0, n1 })
    }

    /// Number of cells in one grid (= matrix width).
    pub fn n_cells(&self) -> usize {
        self.n0 * self.n1
    }

    /// Rows of the stacked operator (two grids).
    pub fn height(&self) -> usize {
        2 * self.n_cells()
    }

    /// Columns of the stacked operator.
    pub fn width(&self) -> usize {
        self.n_cells()
    }

    /// Split a linear cell index into `(x0, x1)`; integer division, never float.
    #[inline]
    pub fn coords(&self, s: usize) -> (usize, usize) {
        debug_assert!(s < self.n_cells());
        (s % self.n0, s / self.n0)
    }

    /// Inverse of [`coords`](Self::coords).
    #[inline]
    pub fn idx(&self, x0: usize, x1: usize) -> usize {
        debug_assert!(x0 < self.n0 && x1 < self.n1);
        x1 * self.n0 + x0
    }

    /// Block of a stacked row and its index relative to that block.
    #[inline]
    pub fn locate(&self, s: usize) -> (Block, usize) {
        debug_assert!(s < self.height());
        let n = self.n_cells();
        if s < n {
            (Block::Upper, s)
        } else {
            (Block::Lower, s - n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_indexing_is_consistent() {
        let g = StackedGrid::new(4, 3).unwrap();
        assert_eq!(g.idx(0, 0), 0);
        assert_eq!(g.idx(1, 0), 1);
        assert_eq!(g.idx(0, 1), 4);
        assert_eq!(g.idx(3, 2), 11);
        assert_eq!(g.n_cells(), 12);
        assert_eq!(g.height(), 24);
        assert_eq!(g.width(), 12);

        for s in 0..g.n_cells() {
            let (x0, x1) = g.coords(s);
            assert!(x0 < g.n0 && x1 < g.n1);
            assert_eq!(g.idx(x0, x1), s);
        }
    }

    #[test]
    fn coords_use_floor_division_on_odd_sizes() {
        let g = StackedGrid::new(3, 5).unwrap();
        assert_eq!(g.coords(7), (1, 2));
        assert_eq!(g.coords(14), (2, 4));
    }

    #[test]
    fn locate_splits_blocks_at_n_cells() {
        let g = StackedGrid::new(2, 2).unwrap();
        assert_eq!(g.locate(3), (Block::Upper, 3));
        assert_eq!(g.locate(4), (Block::Lower, 0));
        assert_eq!(g.locate(7), (Block::Lower, 3));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(StackedGrid::new(0, 3).is_err());
        assert!(StackedGrid::new(3, 0).is_err());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let big = 1usize << (usize::BITS / 2);
        assert!(StackedGrid::new(big, big).unwrap_err().is_config());
        assert!(StackedGrid::new(usize::MAX / 2, 2).is_err());
        assert_eq!(StackedGrid::new(usize::MAX / 4, 2).unwrap().height(), 4 * (usize::MAX / 4));
    }
}
