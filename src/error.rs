// src/error.rs

//! Error types for assembly, labeling, and the regularization sweep.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SvmError>;

/// Errors that can occur while building or solving an experiment.
#[derive(Debug, Error)]
pub enum SvmError {
    /// Configuration rejected before any distributed work is queued.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong
        reason: String,
    },

    /// The random hyperplane draw had zero (or non-finite) norm.
    #[error("Hyperplane draw has zero or non-finite norm ({norm})")]
    ZeroNorm {
        /// Observed 2-norm
        norm: f64,
    },

    /// The distributed matrix was queried before its queues were processed.
    #[error("Sparse matrix queried before process_queues()")]
    NotCommitted,

    /// The queues were processed a second time, or updated after commit.
    #[error("Sparse matrix queues already processed")]
    AlreadyCommitted,

    /// Local row index beyond this worker's shard.
    #[error("Local row {local} out of range (local height {local_height})")]
    LocalRowOutOfRange {
        /// Requested local row
        local: usize,
        /// Rows owned by this worker
        local_height: usize,
    },

    /// Global row not owned by this worker.
    #[error("Global row {row} is not owned by this worker")]
    RowNotOwned {
        /// Requested global row
        row: usize,
    },

    /// Global row index beyond the matrix height.
    #[error("Global row {row} out of range (height {height})")]
    RowOutOfRange {
        /// Requested global row
        row: usize,
        /// Matrix height
        height: usize,
    },

    /// Global row claimed by more than one shard (or twice by one shard).
    #[error("Global row {row} is owned more than once")]
    RowOwnedTwice {
        /// Duplicated global row
        row: usize,
    },

    /// Column index beyond the matrix width.
    #[error("Column {col} out of range (width {width})")]
    ColumnOutOfRange {
        /// Requested column
        col: usize,
        /// Matrix width
        width: usize,
    },

    /// Vector or matrix has an unexpected length.
    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which operand
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// The SVM solver did not converge or hit a numerical failure.
    #[error("SVM solve failed at lambda={lambda} after {iters} iterations: {reason}")]
    SolverFailed {
        /// Regularization value being solved
        lambda: f64,
        /// Iterations performed before failure
        iters: usize,
        /// Failure description
        reason: String,
    },

    /// Plot rendering failed.
    #[error("Plot error: {reason}")]
    Plot {
        /// Backend message
        reason: String,
    },

    /// I/O error while writing run output.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization error for configs.
    #[error("JSON error: {source}")]
    Json {
        /// Underlying serde_json error
        #[from]
        source: serde_json::Error,
    },
}

impl SvmError {
    /// Create an invalid-configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a solver failure error
    pub fn solver_failed(lambda: f64, iters: usize, reason: impl Into<String>) -> Self {
        Self::SolverFailed {
            lambda,
            iters,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape(what: &'static str, expected: usize, got: usize) -> Self {
        Self::ShapeMismatch {
            what,
            expected,
            got,
        }
    }

    /// Whether this error is a fail-fast configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::ZeroNorm { .. })
    }
}
