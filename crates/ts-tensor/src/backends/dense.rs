//! Scalar reference engine.
//!
//! This is the engine every other one is checked against: plain buffer
//! loops, no vectorization, no threading. It is also the registry default
//! (64-bit precision).

use crate::backend::{scalar_binary, scalar_unary, BinaryOp, TensorBackend, UnaryOp};
use crate::tensor::Precision;

/// Reference dense engine.
#[derive(Debug, Clone, Copy)]
pub struct DenseBackend {
    precision: Precision,
}

impl DenseBackend {
    /// Create a dense engine with the given precision mode.
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }
}

impl Default for DenseBackend {
    fn default() -> Self {
        Self::new(Precision::B64)
    }
}

impl TensorBackend for DenseBackend {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    fn apply_binary(&self, op: BinaryOp, a: &[f64], b: &[f64]) -> Vec<f64> {
        scalar_binary(op, a, b)
    }

    fn apply_unary(&self, op: UnaryOp, a: &[f64]) -> Vec<f64> {
        scalar_unary(op, a)
    }

    fn reduce_sum(&self, a: &[f64]) -> f64 {
        a.iter().sum()
    }

    fn reduce_product(&self, a: &[f64]) -> f64 {
        a.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_tokens() {
        let backend = DenseBackend::default();
        assert_eq!(backend.name(), "dense");
        assert_eq!(backend.precision(), Precision::B64);
    }

    #[test]
    fn test_reduce_product_empty_is_one() {
        let backend = DenseBackend::default();
        assert_eq!(backend.reduce_product(&[]), 1.0);
    }
}
