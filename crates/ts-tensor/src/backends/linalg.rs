//! Linear-algebra engine built on `nalgebra` vector storage.
//!
//! Kernels run through `DVector` component-wise maps, so the element loop
//! is nalgebra's rather than ours. Semantics are identical to the scalar
//! reference engine.

use nalgebra::DVector;

use crate::backend::{binary_scalar, unary_scalar, BinaryOp, TensorBackend, UnaryOp};
use crate::tensor::Precision;

/// nalgebra-backed engine.
#[derive(Debug, Clone, Copy)]
pub struct LinalgBackend {
    precision: Precision,
}

impl LinalgBackend {
    /// Create a nalgebra engine with the given precision mode.
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }
}

impl Default for LinalgBackend {
    fn default() -> Self {
        Self::new(Precision::B64)
    }
}

impl TensorBackend for LinalgBackend {
    fn name(&self) -> &'static str {
        "nalgebra"
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    fn apply_binary(&self, op: BinaryOp, a: &[f64], b: &[f64]) -> Vec<f64> {
        let av = DVector::from_column_slice(a);
        let bv = DVector::from_column_slice(b);
        av.zip_map(&bv, |x, y| binary_scalar(op, x, y)).as_slice().to_vec()
    }

    fn apply_unary(&self, op: UnaryOp, a: &[f64]) -> Vec<f64> {
        DVector::from_column_slice(a).map(|x| unary_scalar(op, x)).as_slice().to_vec()
    }

    fn reduce_sum(&self, a: &[f64]) -> f64 {
        DVector::from_column_slice(a).sum()
    }

    fn reduce_product(&self, a: &[f64]) -> f64 {
        DVector::from_column_slice(a).iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{scalar_binary, scalar_unary};

    #[test]
    fn test_identity_tokens() {
        let backend = LinalgBackend::default();
        assert_eq!(backend.name(), "nalgebra");
        assert_eq!(backend.precision(), Precision::B64);
    }

    #[test]
    fn test_kernels_match_scalar_reference() {
        let a = [1.0, 4.0, 9.0, 16.0, 25.0];
        let b = [2.0, 2.0, 3.0, 4.0, 5.0];
        let backend = LinalgBackend::default();
        assert_eq!(
            backend.apply_binary(BinaryOp::Div, &a, &b),
            scalar_binary(BinaryOp::Div, &a, &b)
        );
        assert_eq!(backend.apply_unary(UnaryOp::Sqrt, &a), scalar_unary(UnaryOp::Sqrt, &a));
        assert_eq!(backend.reduce_sum(&a), 55.0);
        assert_eq!(backend.reduce_product(&b), 240.0);
    }
}
