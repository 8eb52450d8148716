//! Data-parallel engine built on `rayon`.
//!
//! Elementwise kernels and reductions split across the thread pool once a
//! buffer crosses `PAR_THRESHOLD`; below it the scalar paths are used, as
//! the spawn overhead dominates for short likelihood vectors.

use rayon::prelude::*;

use crate::backend::{
    binary_scalar, scalar_binary, scalar_unary, unary_scalar, BinaryOp, TensorBackend, UnaryOp,
};
use crate::tensor::Precision;

/// Minimum buffer length before work is split across threads.
const PAR_THRESHOLD: usize = 4096;

/// Rayon-backed engine.
#[derive(Debug, Clone, Copy)]
pub struct ParallelBackend {
    precision: Precision,
}

impl ParallelBackend {
    /// Create a parallel engine with the given precision mode.
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }
}

impl Default for ParallelBackend {
    fn default() -> Self {
        Self::new(Precision::B64)
    }
}

impl TensorBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    fn apply_binary(&self, op: BinaryOp, a: &[f64], b: &[f64]) -> Vec<f64> {
        if a.len() < PAR_THRESHOLD {
            return scalar_binary(op, a, b);
        }
        a.par_iter().zip(b.par_iter()).map(|(&x, &y)| binary_scalar(op, x, y)).collect()
    }

    fn apply_unary(&self, op: UnaryOp, a: &[f64]) -> Vec<f64> {
        if a.len() < PAR_THRESHOLD {
            return scalar_unary(op, a);
        }
        a.par_iter().map(|&x| unary_scalar(op, x)).collect()
    }

    fn reduce_sum(&self, a: &[f64]) -> f64 {
        if a.len() < PAR_THRESHOLD {
            return a.iter().sum();
        }
        a.par_iter().sum()
    }

    fn reduce_product(&self, a: &[f64]) -> f64 {
        if a.len() < PAR_THRESHOLD {
            return a.iter().product();
        }
        a.par_iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_tokens() {
        let backend = ParallelBackend::default();
        assert_eq!(backend.name(), "parallel");
        assert_eq!(backend.precision(), Precision::B64);
    }

    #[test]
    fn test_parallel_path_matches_scalar() {
        let n = PAR_THRESHOLD + 17;
        let a: Vec<f64> = (0..n).map(|i| (i % 31) as f64 + 1.0).collect();
        let b: Vec<f64> = (0..n).map(|i| (i % 7) as f64 + 2.0).collect();
        let backend = ParallelBackend::default();
        assert_eq!(backend.apply_binary(BinaryOp::Mul, &a, &b), scalar_binary(BinaryOp::Mul, &a, &b));
        assert_eq!(backend.apply_unary(UnaryOp::Log, &a), scalar_unary(UnaryOp::Log, &a));
        let serial: f64 = a.iter().sum();
        assert!((backend.reduce_sum(&a) - serial).abs() < 1e-9);
    }
}
