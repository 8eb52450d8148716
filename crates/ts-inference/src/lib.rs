//! # ts-inference
//!
//! Profile-likelihood inference for TensorStat.
//!
//! This crate provides:
//! - the optimizer contract and an L-BFGS implementation
//! - maximum-likelihood fit helpers (free and fixed-POI)
//! - the five profile-likelihood test statistics and a name-based lookup
//!
//! The inference layer depends on the [`ts_core::traits::LikelihoodModel`]
//! contract, never on a concrete model implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mle;
pub mod optimizer;
pub mod test_statistics;
pub mod utils;

pub use optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult, Optimizer, OptimizerConfig};
pub use test_statistics::{q0, qmu, qmu_tilde, tmu, tmu_tilde, ProfileFits};
pub use utils::{get_test_stat, TestStatKind};
