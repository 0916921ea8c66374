// src/labeler.rs
//
// Ground-truth labels from a random affine hyperplane:
//
//   w_gen ~ N(0, I),  w_gen <- w_gen / ||w_gen||_2
//   d     = sign(A w_gen - offset)        (+1 if > 0, else -1)
//
// Every worker draws w_gen from the same seeded generator, so all shards
// agree on the hyperplane without a broadcast. Points exactly on the
// hyperplane (distance == 0) are labelled -1.

use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{info, warn};

use crate::dist_sparse::DistSparseMatrix;
use crate::error::{Result, SvmError};

/// Affine hyperplane `{x : w·x = offset}` with unit-norm `w`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperplane {
    pub w: Vec<f64>,
    pub offset: f64,
}

impl Hyperplane {
    /// Draw a unit-norm Gaussian direction of length `n` from `seed`.
    pub fn random(n: usize, offset: f64, seed: u64) -> Result<Self> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let w: Vec<f64> = (0..n).map(|_| StandardNormal.sample(&mut rng)).collect();
        Self::from_direction(w, offset)
    }

    /// Normalise an arbitrary direction. Fails on zero or non-finite norm.
    pub fn from_direction(mut w: Vec<f64>, offset: f64) -> Result<Self> {
        if !offset.is_finite() {
            return Err(SvmError::invalid_config(format!(
                "offset must be finite (got {})",
                offset
            )));
        }
        let norm = frobenius_norm(&w);
        if norm == 0.0 || !norm.is_finite() {
            return Err(SvmError::ZeroNorm { norm });
        }
        let inv = 1.0 / norm;
        for wi in &mut w {
            *wi *= inv;
        }
        Ok(Self { w, offset })
    }

    pub fn dim(&self) -> usize {
        self.w.len()
    }
}

pub fn frobenius_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Label convention: strictly positive distance is +1, everything else -1.
#[inline]
pub fn sign_label(distance: f64) -> f64 {
    if distance > 0.0 { 1.0 } else { -1.0 }
}

/// Signed distances `A w - offset` for the rows owned by `a`.
pub fn local_distances(a: &DistSparseMatrix, plane: &Hyperplane) -> Result<Vec<f64>> {
    if plane.dim() != a.width() {
        return Err(SvmError::shape("hyperplane", a.width(), plane.dim()));
    }
    let mut d = vec![1.0; a.local_height()];
    a.multiply(1.0, &plane.w, -plane.offset, &mut d)?;
    Ok(d)
}

/// Labels in {+1, -1} for the rows owned by `a`.
pub fn local_labels(a: &DistSparseMatrix, plane: &Hyperplane) -> Result<Vec<f64>> {
    let mut d = local_distances(a, plane)?;
    for di in &mut d {
        *di = sign_label(*di);
    }
    Ok(d)
}

/// Log the class balance of a full label vector; warns if one class is missing.
pub fn report_balance(labels: &[f64]) -> (usize, usize) {
    let pos = labels.iter().filter(|&&v| v > 0.0).count();
    let neg = labels.len() - pos;
    info!(positive = pos, negative = neg, "labelled points");
    if pos == 0 || neg == 0 {
        warn!("all points carry the same label; the SVM problem is degenerate");
    }
    (pos, neg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::StackedGrid;
    use crate::partition::{RowPartition, World};
    use crate::stencil::stacked_fd_2d;

    #[test]
    fn random_hyperplane_has_unit_norm_and_is_reproducible() {
        let a = Hyperplane::random(25, 0.3, 7).unwrap();
        let b = Hyperplane::random(25, 0.3, 7).unwrap();
        assert!((frobenius_norm(&a.w) - 1.0).abs() < 1e-12);
        assert_eq!(a, b);

        let c = Hyperplane::random(25, 0.3, 8).unwrap();
        assert_ne!(a.w, c.w);
    }

    #[test]
    fn zero_direction_is_rejected() {
        assert!(matches!(
            Hyperplane::from_direction(vec![0.0; 4], 0.1),
            Err(SvmError::ZeroNorm { .. })
        ));
        assert!(Hyperplane::from_direction(vec![1.0], f64::NAN).is_err());
    }

    #[test]
    fn zero_distance_maps_to_negative() {
        assert_eq!(sign_label(0.0), -1.0);
        assert_eq!(sign_label(-0.0), -1.0);
        assert_eq!(sign_label(1e-300), 1.0);
        assert_eq!(sign_label(-2.0), -1.0);
    }

    #[test]
    fn labels_follow_distances() {
        let g = StackedGrid::new(2, 2).unwrap();
        let a = stacked_fd_2d(&g, World::single(), RowPartition::Block).unwrap();
        let plane = Hyperplane::from_direction(vec![1.0, 0.0, 0.0, 0.0], 0.5).unwrap();

        let dist = local_distances(&a, &plane).unwrap();
        // column 0 carries 11 (row 0), -10 (row 1), -30 (row 2), -20 (row 4), -1 (row 5), -3 (row 6)
        let expected = [10.5, -10.5, -30.5, -0.5, -20.5, -1.5, -3.5, -0.5];
        for (got, want) in dist.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "got {}, want {}", got, want);
        }

        let d = local_labels(&a, &plane).unwrap();
        assert_eq!(d, vec![1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let g = StackedGrid::new(2, 2).unwrap();
        let a = stacked_fd_2d(&g, World::single(), RowPartition::Block).unwrap();
        let plane = Hyperplane::from_direction(vec![1.0; 3], 0.0).unwrap();
        assert!(local_distances(&a, &plane).is_err());
    }
}
