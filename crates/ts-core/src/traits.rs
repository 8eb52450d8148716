//! Core traits for TensorStat
//!
//! This module defines the trait-based architecture that enables
//! dependency inversion: the inference layer depends on a model
//! contract, never on a concrete model implementation.

use crate::Result;

/// Contract the test-statistic engine requires from a statistical model.
///
/// `data` is always the full observed-plus-auxiliary vector: main-bin
/// observations followed by the auxiliary observations in the model's
/// `auxdata` ordering.
pub trait LikelihoodModel: Send + Sync {
    /// Number of model parameters
    fn n_parameters(&self) -> usize;

    /// Index of the parameter of interest, if one is declared
    fn poi_index(&self) -> Option<usize>;

    /// Suggested initial parameter values
    fn suggested_init(&self) -> Vec<f64>;

    /// Suggested per-parameter inclusive bounds
    fn suggested_bounds(&self) -> Vec<(f64, f64)>;

    /// Suggested fixed-parameter mask (true = held at init)
    fn suggested_fixed(&self) -> Vec<bool>;

    /// Auxiliary observations implied by the model's constraint terms
    fn auxdata(&self) -> Vec<f64>;

    /// Log-likelihood of `params` given the full data vector
    fn logpdf(&self, params: &[f64], data: &[f64]) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatModel;

    impl LikelihoodModel for FlatModel {
        fn n_parameters(&self) -> usize {
            1
        }

        fn poi_index(&self) -> Option<usize> {
            Some(0)
        }

        fn suggested_init(&self) -> Vec<f64> {
            vec![1.0]
        }

        fn suggested_bounds(&self) -> Vec<(f64, f64)> {
            vec![(0.0, 10.0)]
        }

        fn suggested_fixed(&self) -> Vec<bool> {
            vec![false]
        }

        fn auxdata(&self) -> Vec<f64> {
            vec![]
        }

        fn logpdf(&self, _params: &[f64], _data: &[f64]) -> Result<f64> {
            Ok(0.0)
        }
    }

    #[test]
    fn test_flat_model() {
        let model = FlatModel;
        assert_eq!(model.n_parameters(), 1);
        assert_eq!(model.poi_index(), Some(0));
        assert!(model.logpdf(&[1.0], &[]).is_ok());
    }
}
