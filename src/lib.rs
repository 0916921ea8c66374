// src/lib.rs

pub mod config;
pub mod display;
pub mod dist_sparse;
pub mod error;
pub mod experiment;
pub mod grid;
pub mod labeler;
pub mod output;
pub mod partition;
pub mod sparse;
pub mod stencil;
pub mod svm;
pub mod sweep;
