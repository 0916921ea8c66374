// src/sparse.rs
//
// Compressed sparse row storage and the two-phase builder that fills it.
//
// Builder protocol:
//   reserve(n)             -> optional capacity hint (entries)
//   queue(row, col, value) -> any order, any number of times
//   commit()               -> sort by (row, col), sum duplicates, emit CSR
//
// A builder can be committed exactly once.

use rayon::prelude::*;

use crate::error::{Result, SvmError};

/// Rows below this count are multiplied serially.
const PAR_ROWS: usize = 4096;

/// Sparse matrix in compressed sparse row format.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pub height: usize,
    pub width: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// Empty `height × width` matrix.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            row_ptr: vec![0; height + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `(col, value)` pairs of row `i`, sorted by column.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let r = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[r.clone()]
            .iter()
            .copied()
            .zip(self.values[r].iter().copied())
    }

    /// Stored value at `(i, j)`, zero if absent.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let r = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[r.clone()].binary_search(&j) {
            Ok(k) => self.values[r.start + k],
            Err(_) => 0.0,
        }
    }

    /// Dot product of row `i` with a dense vector.
    #[inline]
    pub fn row_dot(&self, i: usize, x: &[f64]) -> f64 {
        let mut sum = 0.0;
        for k in self.row_ptr[i]..self.row_ptr[i + 1] {
            sum += self.values[k] * x[self.col_idx[k]];
        }
        sum
    }

    /// Dot product of rows `i` and `j` (merge over sorted columns).
    pub fn rows_dot(&self, i: usize, j: usize) -> f64 {
        let (mut p, pe) = (self.row_ptr[i], self.row_ptr[i + 1]);
        let (mut q, qe) = (self.row_ptr[j], self.row_ptr[j + 1]);
        let mut sum = 0.0;
        while p < pe && q < qe {
            let (cp, cq) = (self.col_idx[p], self.col_idx[q]);
            if cp == cq {
                sum += self.values[p] * self.values[q];
                p += 1;
                q += 1;
            } else if cp < cq {
                p += 1;
            } else {
                q += 1;
            }
        }
        sum
    }

    /// Squared 2-norm of row `i`.
    pub fn row_norm_sq(&self, i: usize) -> f64 {
        self.values[self.row_ptr[i]..self.row_ptr[i + 1]]
            .iter()
            .map(|v| v * v)
            .sum()
    }

    /// `y := alpha * A x + beta * y`.
    pub fn multiply(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        if x.len() != self.width {
            return Err(SvmError::shape("x", self.width, x.len()));
        }
        if y.len() != self.height {
            return Err(SvmError::shape("y", self.height, y.len()));
        }
        let kernel = |(i, yi): (usize, &mut f64)| {
            *yi = alpha * self.row_dot(i, x) + beta * *yi;
        };
        if self.height >= PAR_ROWS {
            y.par_iter_mut().enumerate().for_each(kernel);
        } else {
            y.iter_mut().enumerate().for_each(kernel);
        }
        Ok(())
    }

    /// `y := A x` into a freshly allocated vector.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut y = vec![0.0; self.height];
        self.multiply(1.0, x, 0.0, &mut y)?;
        Ok(y)
    }

    /// Add `scale * row i` into a dense vector.
    #[inline]
    pub fn axpy_row(&self, i: usize, scale: f64, y: &mut [f64]) {
        for k in self.row_ptr[i]..self.row_ptr[i + 1] {
            y[self.col_idx[k]] += scale * self.values[k];
        }
    }

    /// All stored entries as `(row, col, value)` triplets, row-major.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        (0..self.height)
            .flat_map(|i| self.row(i).map(move |(j, v)| (i, j, v)))
            .collect()
    }
}

/// Queue of `(row, col, value)` updates waiting to be committed into CSR.
#[derive(Debug)]
pub struct SparseBuilder {
    height: usize,
    width: usize,
    queue: Vec<(usize, usize, f64)>,
    committed: bool,
}

impl SparseBuilder {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            queue: Vec::new(),
            committed: false,
        }
    }

    /// Reserve capacity for `n` additional queued entries.
    pub fn reserve(&mut self, n: usize) {
        self.queue.reserve(n);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Queue one update. Nothing is visible until [`commit`](Self::commit).
    pub fn queue(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if self.committed {
            return Err(SvmError::AlreadyCommitted);
        }
        if row >= self.height {
            return Err(SvmError::LocalRowOutOfRange {
                local: row,
                local_height: self.height,
            });
        }
        if col >= self.width {
            return Err(SvmError::ColumnOutOfRange {
                col,
                width: self.width,
            });
        }
        self.queue.push((row, col, value));
        Ok(())
    }

    /// Materialize the queue. Duplicate `(row, col)` entries are summed.
    pub fn commit(&mut self) -> Result<CsrMatrix> {
        if self.committed {
            return Err(SvmError::AlreadyCommitted);
        }
        self.committed = true;

        let mut entries = std::mem::take(&mut self.queue);
        entries.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_ptr = vec![0usize; self.height + 1];
        let mut col_idx = Vec::with_capacity(entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(entries.len());
        let mut last: Option<(usize, usize)> = None;

        for (i, j, v) in entries {
            if last == Some((i, j)) {
                if let Some(tail) = values.last_mut() {
                    *tail += v;
                }
                continue;
            }
            row_ptr[i + 1] += 1;
            col_idx.push(j);
            values.push(v);
            last = Some((i, j));
        }
        for i in 0..self.height {
            row_ptr[i + 1] += row_ptr[i];
        }

        Ok(CsrMatrix {
            height: self.height,
            width: self.width,
            row_ptr,
            col_idx,
            values,
        })
    }
}
