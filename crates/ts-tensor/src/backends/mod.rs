//! Concrete tensor engines.
//!
//! Four engines implement the [`crate::backend::TensorBackend`] contract,
//! each atop a different execution strategy:
//!
//! - [`dense`] — scalar reference engine (the registry default)
//! - [`simd`] — 4-wide SIMD kernels via `wide`
//! - [`parallel`] — data-parallel kernels via `rayon`
//! - [`linalg`] — kernels executed through `nalgebra` vector storage

pub mod dense;
pub mod linalg;
pub mod parallel;
pub mod simd;

pub use dense::DenseBackend;
pub use linalg::LinalgBackend;
pub use parallel::ParallelBackend;
pub use simd::SimdBackend;
