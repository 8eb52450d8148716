//! # ts-tensor
//!
//! Backend-agnostic tensor computation for TensorStat.
//!
//! This crate provides:
//! - the [`TensorBackend`] operation contract every engine implements
//! - four concrete engines (dense reference, SIMD, rayon, nalgebra)
//! - the process-wide active-backend registry and its change events
//!
//! Identical model code runs unmodified over any engine: select one,
//! install it with [`set_backend`], and read it back anywhere through
//! [`tensorlib`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod backends;
mod einsum;
pub mod events;
mod ops;
pub mod registry;
pub mod tensor;

pub use backend::{BinaryOp, TensorBackend, UnaryOp};
pub use backends::{DenseBackend, LinalgBackend, ParallelBackend, SimdBackend};
pub use events::{subscribe, unsubscribe, EventKind, Subscription};
pub use ops::Interpolation;
pub use registry::{set_backend, tensorlib};
pub use tensor::{DType, DenseArray, NativeDType, Precision, Tensor, TensorData, TensorValue};
