//! # ts-model
//!
//! Binned statistical models for TensorStat.
//!
//! A [`Model`] combines per-channel sample rates with rate modifiers
//! (free normalizations, Barlow-Beeston per-bin uncertainties, correlated
//! template and normalization systematics) into a Poisson likelihood with
//! constraint terms. Likelihood evaluation runs through the active tensor
//! backend, so models compute identically on every registered engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod model;
pub mod simplemodels;
pub mod spec;

pub use model::{Model, ModelConfig, Parameter};
pub use spec::{Channel, Modifier, ModelSpec, Sample};
