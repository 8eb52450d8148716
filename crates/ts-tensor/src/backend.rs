//! The tensor-engine contract.
//!
//! [`TensorBackend`] defines the complete operation surface every engine
//! exposes: construction, elementwise arithmetic, reductions, shape
//! manipulation, selection, statistics, probability primitives, control
//! flow, and conversion. Engines implement the low-level execution hooks
//! ([`TensorBackend::apply_binary`], [`TensorBackend::apply_unary`], the
//! reductions); the operation surface is defined once in terms of those
//! hooks, so observable semantics agree across engines by construction.
//! The conformance suite still exercises every operation against every
//! engine rather than assuming it.
//!
//! Domain policy: the probability primitives here are numerically defined —
//! arguments outside the valid domain (for example a zero-width normal
//! evaluated off its mean) produce NaN rather than a raised error. This
//! holds for all engines in this crate.

use statrs::function::erf;
use statrs::function::gamma::ln_gamma;
use ts_core::{Error, Result};

use crate::einsum;
use crate::ops::{self, Interpolation};
use crate::tensor::{
    value_flatten, value_shape, DType, DenseArray, NativeDType, Precision, Tensor, TensorData,
    TensorValue,
};

/// `ln(sqrt(2π))`, precomputed.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Elementwise binary kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a ^ b`
    Pow,
    /// `a * ln(b)`, defined as 0 when `a == 0` (the `xlogy` convention)
    XLogY,
}

/// Elementwise unary kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Square root
    Sqrt,
    /// Natural exponential
    Exp,
    /// Natural logarithm
    Log,
    /// Absolute value
    Abs,
    /// Error function
    Erf,
    /// Inverse error function
    ErfInv,
    /// Generalized log-factorial `ln Γ(x + 1)`
    LnFactorial,
}

/// Apply a binary kernel to one element pair.
#[inline]
pub(crate) fn binary_scalar(op: BinaryOp, x: f64, y: f64) -> f64 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Pow => x.powf(y),
        BinaryOp::XLogY => {
            if x == 0.0 {
                0.0
            } else {
                x * y.ln()
            }
        }
    }
}

/// Apply a unary kernel to one element.
#[inline]
pub(crate) fn unary_scalar(op: UnaryOp, x: f64) -> f64 {
    match op {
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Log => x.ln(),
        UnaryOp::Abs => x.abs(),
        UnaryOp::Erf => erf::erf(x),
        UnaryOp::ErfInv => erf::erf_inv(x),
        UnaryOp::LnFactorial => ln_gamma(x + 1.0),
    }
}

/// Reference scalar implementation of a binary kernel over buffers.
pub(crate) fn scalar_binary(op: BinaryOp, a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(&x, &y)| binary_scalar(op, x, y)).collect()
}

/// Reference scalar implementation of a unary kernel over a buffer.
pub(crate) fn scalar_unary(op: UnaryOp, a: &[f64]) -> Vec<f64> {
    a.iter().map(|&x| unary_scalar(op, x)).collect()
}

/// A concrete tensor engine.
///
/// Engines are identified by `(name, precision)`; the registry uses this
/// pair for change detection when the active backend is replaced.
pub trait TensorBackend: Send + Sync {
    /// Engine identity token.
    fn name(&self) -> &'static str;

    /// Precision mode fixed at construction.
    fn precision(&self) -> Precision;

    /// Establish any precision-dependent engine state.
    ///
    /// Called by the registry when this backend becomes active with a
    /// different `(name, precision)` than the previous one.
    fn setup(&self) {}

    /// Execute an elementwise binary kernel over equal-length buffers.
    fn apply_binary(&self, op: BinaryOp, a: &[f64], b: &[f64]) -> Vec<f64>;

    /// Execute an elementwise unary kernel over a buffer.
    fn apply_unary(&self, op: UnaryOp, a: &[f64]) -> Vec<f64>;

    /// Sum of a contiguous buffer.
    fn reduce_sum(&self, a: &[f64]) -> f64;

    /// Product of a contiguous buffer.
    fn reduce_product(&self, a: &[f64]) -> f64;

    // ---- construction -----------------------------------------------------

    /// Native type a logical dtype token maps to under this precision mode.
    fn native_dtype(&self, dtype: DType) -> NativeDType {
        match dtype {
            DType::Float => ops::float_dtype(self.precision()),
            DType::Int => ops::int_dtype(self.precision()),
            DType::Bool => NativeDType::Bool,
        }
    }

    /// Convert a nested plain value into this engine's tensor type.
    fn astensor(&self, value: &TensorValue, dtype: DType) -> Result<Tensor> {
        let shape = value_shape(value)?;
        let mut flat = Vec::new();
        value_flatten(value, &mut flat);
        Ok(match dtype {
            DType::Float => ops::store_float(self.precision(), shape, flat),
            DType::Int => {
                ops::store_int(self.precision(), shape, flat.into_iter().map(|x| x as i64).collect())
            }
            DType::Bool => ops::store_bool(shape, flat.into_iter().map(|x| x != 0.0).collect()),
        })
    }

    /// Tensor of ones with the given shape.
    fn ones(&self, shape: &[usize], dtype: DType) -> Result<Tensor> {
        let n = ops::element_count(shape);
        Ok(match dtype {
            DType::Float => ops::store_float(self.precision(), shape.to_vec(), vec![1.0; n]),
            DType::Int => ops::store_int(self.precision(), shape.to_vec(), vec![1; n]),
            DType::Bool => ops::store_bool(shape.to_vec(), vec![true; n]),
        })
    }

    /// Tensor of zeros with the given shape.
    fn zeros(&self, shape: &[usize], dtype: DType) -> Result<Tensor> {
        let n = ops::element_count(shape);
        Ok(match dtype {
            DType::Float => ops::store_float(self.precision(), shape.to_vec(), vec![0.0; n]),
            DType::Int => ops::store_int(self.precision(), shape.to_vec(), vec![0; n]),
            DType::Bool => ops::store_bool(shape.to_vec(), vec![false; n]),
        })
    }

    // ---- elementwise arithmetic -------------------------------------------

    /// Broadcasting elementwise binary operation producing a float tensor.
    fn binary_op(&self, op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let (shape, av, bv) = ops::broadcast_pair(a, b)?;
        let out = self.apply_binary(op, &av, &bv);
        Ok(ops::store_float(self.precision(), shape, out))
    }

    /// Elementwise unary operation producing a float tensor.
    fn unary_op(&self, op: UnaryOp, a: &Tensor) -> Result<Tensor> {
        let out = self.apply_unary(op, &a.to_f64_vec());
        Ok(ops::store_float(self.precision(), a.shape().to_vec(), out))
    }

    /// Elementwise addition.
    fn add(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary_op(BinaryOp::Add, a, b)
    }

    /// Elementwise subtraction.
    fn sub(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary_op(BinaryOp::Sub, a, b)
    }

    /// Elementwise multiplication.
    fn mul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary_op(BinaryOp::Mul, a, b)
    }

    /// Elementwise division.
    fn div(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary_op(BinaryOp::Div, a, b)
    }

    /// Elementwise exponentiation.
    fn power(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary_op(BinaryOp::Pow, a, b)
    }

    /// Elementwise square root.
    fn sqrt(&self, a: &Tensor) -> Result<Tensor> {
        self.unary_op(UnaryOp::Sqrt, a)
    }

    /// Elementwise natural exponential.
    fn exp(&self, a: &Tensor) -> Result<Tensor> {
        self.unary_op(UnaryOp::Exp, a)
    }

    /// Elementwise natural logarithm.
    fn log(&self, a: &Tensor) -> Result<Tensor> {
        self.unary_op(UnaryOp::Log, a)
    }

    /// Elementwise absolute value.
    fn abs(&self, a: &Tensor) -> Result<Tensor> {
        self.unary_op(UnaryOp::Abs, a)
    }

    /// Elementwise error function.
    fn erf(&self, a: &Tensor) -> Result<Tensor> {
        self.unary_op(UnaryOp::Erf, a)
    }

    /// Elementwise inverse error function.
    fn erfinv(&self, a: &Tensor) -> Result<Tensor> {
        self.unary_op(UnaryOp::ErfInv, a)
    }

    /// Elementwise `a < b`, producing a boolean tensor.
    fn lt(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let (shape, av, bv) = ops::broadcast_pair(a, b)?;
        let out: Vec<bool> = av.iter().zip(&bv).map(|(&x, &y)| x < y).collect();
        Ok(ops::store_bool(shape, out))
    }

    /// Elementwise `a > b`, producing a boolean tensor.
    fn gt(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let (shape, av, bv) = ops::broadcast_pair(a, b)?;
        let out: Vec<bool> = av.iter().zip(&bv).map(|(&x, &y)| x > y).collect();
        Ok(ops::store_bool(shape, out))
    }

    /// Elementwise finiteness test, producing a boolean tensor.
    fn isfinite(&self, a: &Tensor) -> Result<Tensor> {
        let out: Vec<bool> = a.to_f64_vec().into_iter().map(|x| x.is_finite()).collect();
        Ok(ops::store_bool(a.shape().to_vec(), out))
    }

    // ---- reductions -------------------------------------------------------

    /// Sum over an axis (or all elements when `axis` is `None`).
    fn sum(&self, t: &Tensor, axis: Option<usize>) -> Result<Tensor> {
        self.reduce(t, axis, true)
    }

    /// Product over an axis (or all elements when `axis` is `None`).
    fn product(&self, t: &Tensor, axis: Option<usize>) -> Result<Tensor> {
        self.reduce(t, axis, false)
    }

    /// Shared reduction plumbing for [`TensorBackend::sum`] and
    /// [`TensorBackend::product`].
    fn reduce(&self, t: &Tensor, axis: Option<usize>, is_sum: bool) -> Result<Tensor> {
        match axis {
            None => {
                let flat = t.to_f64_vec();
                let v = if is_sum { self.reduce_sum(&flat) } else { self.reduce_product(&flat) };
                Ok(ops::store_float(self.precision(), vec![], vec![v]))
            }
            Some(ax) => {
                if ax >= t.ndim() {
                    return Err(Error::Shape(format!(
                        "Reduction axis {ax} out of range for shape {:?}",
                        t.shape()
                    )));
                }
                // Move the reduced axis last, then reduce contiguous lanes.
                let mut perm: Vec<usize> = (0..t.ndim()).filter(|&d| d != ax).collect();
                perm.push(ax);
                let (pshape, idx) = ops::permute_plan(t.shape(), &perm);
                let data = ops::take_flat(t, &idx, pshape.clone()).to_f64_vec();
                let lane = *pshape.last().unwrap_or(&1);
                let out_shape: Vec<usize> = pshape[..pshape.len() - 1].to_vec();
                let out: Vec<f64> = if lane == 0 {
                    vec![if is_sum { 0.0 } else { 1.0 }; ops::element_count(&out_shape)]
                } else {
                    data.chunks(lane)
                        .map(|row| if is_sum { self.reduce_sum(row) } else { self.reduce_product(row) })
                        .collect()
                };
                Ok(ops::store_float(self.precision(), out_shape, out))
            }
        }
    }

    // ---- shape manipulation -----------------------------------------------

    /// Reshape; one dimension may be `-1` and is inferred.
    fn reshape(&self, t: &Tensor, shape: &[i64]) -> Result<Tensor> {
        let known: i64 = shape.iter().filter(|&&d| d >= 0).product();
        let n_wild = shape.iter().filter(|&&d| d < 0).count();
        let n = t.len() as i64;
        let resolved: Vec<usize> = match n_wild {
            0 => shape.iter().map(|&d| d as usize).collect(),
            1 => {
                if known == 0 || n % known != 0 {
                    return Err(Error::Shape(format!(
                        "Cannot infer wildcard dimension in {shape:?} for {n} elements"
                    )));
                }
                shape
                    .iter()
                    .map(|&d| if d < 0 { (n / known) as usize } else { d as usize })
                    .collect()
            }
            _ => {
                return Err(Error::Shape(
                    "At most one reshape dimension may be -1".to_string(),
                ))
            }
        };
        if ops::element_count(&resolved) != t.len() {
            return Err(Error::Shape(format!(
                "Cannot reshape {} elements into {resolved:?}",
                t.len()
            )));
        }
        Tensor::from_parts(resolved, t.data().clone())
    }

    /// Flatten to 1-D in row-major order.
    fn ravel(&self, t: &Tensor) -> Result<Tensor> {
        Tensor::from_parts(vec![t.len()], t.data().clone())
    }

    /// Reverse the axis order. General permutations go through
    /// [`TensorBackend::einsum`].
    fn transpose(&self, t: &Tensor) -> Result<Tensor> {
        let perm: Vec<usize> = (0..t.ndim()).rev().collect();
        let (shape, idx) = ops::permute_plan(t.shape(), &perm);
        Ok(ops::take_flat(t, &idx, shape))
    }

    /// Repeat along each axis; `repeats` may extend the rank with leading
    /// dimensions.
    fn tile(&self, t: &Tensor, repeats: &[usize]) -> Result<Tensor> {
        let (shape, idx) = ops::tile_plan(t.shape(), repeats);
        Ok(ops::take_flat(t, &idx, shape))
    }

    /// Join equal-shaped tensors along a new axis.
    fn stack(&self, tensors: &[Tensor], axis: usize) -> Result<Tensor> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::Shape("Cannot stack an empty tensor sequence".to_string()))?;
        if axis > first.ndim() {
            return Err(Error::Shape(format!(
                "Stack axis {axis} out of range for {}-d tensors",
                first.ndim()
            )));
        }
        let mut expanded_shape: Vec<i64> = first.shape().iter().map(|&d| d as i64).collect();
        expanded_shape.insert(axis, 1);
        let mut parts = Vec::with_capacity(tensors.len());
        for t in tensors {
            if t.shape() != first.shape() {
                return Err(Error::Shape(format!(
                    "Stack requires equal shapes, got {:?} and {:?}",
                    first.shape(),
                    t.shape()
                )));
            }
            parts.push(self.reshape(t, &expanded_shape)?);
        }
        self.concatenate(&parts, axis)
    }

    /// Join tensors along an existing axis.
    fn concatenate(&self, tensors: &[Tensor], axis: usize) -> Result<Tensor> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::Shape("Cannot concatenate an empty tensor sequence".to_string()))?;
        if axis >= first.ndim() {
            return Err(Error::Shape(format!(
                "Concatenate axis {axis} out of range for shape {:?}",
                first.shape()
            )));
        }
        let mut out_shape = first.shape().to_vec();
        out_shape[axis] = 0;
        for t in tensors {
            if t.ndim() != first.ndim()
                || t.shape()
                    .iter()
                    .enumerate()
                    .any(|(d, &s)| d != axis && s != first.shape()[d])
            {
                return Err(Error::Shape(format!(
                    "Concatenate requires matching shapes off axis {axis}: {:?} vs {:?}",
                    first.shape(),
                    t.shape()
                )));
            }
            out_shape[axis] += t.shape()[axis];
        }

        let out_strides = ops::strides_for(&out_shape);
        let mut out = vec![0.0f64; ops::element_count(&out_shape)];
        let mut axis_offset = 0usize;
        for t in tensors {
            let data = t.to_f64_vec();
            let shape = t.shape();
            let mut coords = vec![0usize; shape.len()];
            for &x in &data {
                let flat: usize = coords
                    .iter()
                    .enumerate()
                    .map(|(d, &c)| {
                        let c = if d == axis { c + axis_offset } else { c };
                        c * out_strides[d]
                    })
                    .sum();
                out[flat] = x;
                for d in (0..shape.len()).rev() {
                    coords[d] += 1;
                    if coords[d] < shape[d] {
                        break;
                    }
                    coords[d] = 0;
                }
            }
            axis_offset += shape[axis];
        }
        Ok(ops::store_float(self.precision(), out_shape, out))
    }

    /// Outer product of two 1-D tensors.
    fn outer(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        if a.ndim() != 1 || b.ndim() != 1 {
            return Err(Error::Shape(format!(
                "Outer product requires 1-d tensors, got {:?} and {:?}",
                a.shape(),
                b.shape()
            )));
        }
        let col = self.reshape(a, &[a.len() as i64, 1])?;
        self.mul(&col, b)
    }

    // ---- indexing / selection ---------------------------------------------

    /// Take along axis 0 using an integer index tensor. The output shape is
    /// `indices.shape + t.shape[1:]`.
    fn gather(&self, t: &Tensor, indices: &Tensor) -> Result<Tensor> {
        if t.ndim() == 0 {
            return Err(Error::Shape("Cannot gather from a 0-d tensor".to_string()));
        }
        let idx = indices.to_index_vec()?;
        let rows = t.shape()[0];
        let row_len: usize = t.shape()[1..].iter().product();
        let mut flat = Vec::with_capacity(idx.len() * row_len);
        for &i in &idx {
            if i < 0 || i as usize >= rows {
                return Err(Error::Shape(format!(
                    "Gather index {i} out of range for axis of length {rows}"
                )));
            }
            let base = i as usize * row_len;
            flat.extend(base..base + row_len);
        }
        let mut out_shape = indices.shape().to_vec();
        out_shape.extend_from_slice(&t.shape()[1..]);
        Ok(ops::take_flat(t, &flat, out_shape))
    }

    /// 1-D selection of the elements where `mask` is truthy, in row-major
    /// order. The mask must have the same shape as the tensor.
    fn boolean_mask(&self, t: &Tensor, mask: &Tensor) -> Result<Tensor> {
        if mask.shape() != t.shape() {
            return Err(Error::Shape(format!(
                "Mask shape {:?} does not match tensor shape {:?}",
                mask.shape(),
                t.shape()
            )));
        }
        let keep = ops::materialize_bool(mask, mask.shape());
        let idx: Vec<usize> =
            keep.iter().enumerate().filter(|(_, &k)| k).map(|(i, _)| i).collect();
        let out_shape = vec![idx.len()];
        Ok(ops::take_flat(t, &idx, out_shape))
    }

    /// Elementwise select: `cond ? a : b` with three-way broadcasting. 0-d
    /// tensors serve as the scalar branches.
    fn where_cond(&self, cond: &Tensor, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let shape = ops::broadcast_shapes(
            &ops::broadcast_shapes(cond.shape(), a.shape())?,
            b.shape(),
        )?;
        let c = ops::materialize_bool(cond, &shape);
        let av = ops::materialize_f64(a, &shape);
        let bv = ops::materialize_f64(b, &shape);
        let out: Vec<f64> =
            c.iter().zip(av.iter().zip(&bv)).map(|(&k, (&x, &y))| if k { x } else { y }).collect();
        Ok(ops::store_float(self.precision(), shape, out))
    }

    /// Clamp every element into `[lo, hi]`.
    fn clip(&self, t: &Tensor, lo: f64, hi: f64) -> Result<Tensor> {
        let out: Vec<f64> = t.to_f64_vec().into_iter().map(|x| x.clamp(lo, hi)).collect();
        Ok(ops::store_float(self.precision(), t.shape().to_vec(), out))
    }

    // ---- statistics / linear algebra --------------------------------------

    /// q-th percentile (`0 <= q <= 100`), flattened or along an axis.
    fn percentile(
        &self,
        t: &Tensor,
        q: f64,
        axis: Option<usize>,
        interpolation: Interpolation,
    ) -> Result<Tensor> {
        if !(0.0..=100.0).contains(&q) {
            return Err(Error::Domain(format!(
                "Percentile must lie in [0, 100], got {q}"
            )));
        }
        if t.is_empty() {
            return Err(Error::Domain("Percentile of an empty tensor".to_string()));
        }
        match axis {
            None => {
                let mut flat = t.to_f64_vec();
                flat.sort_unstable_by(f64::total_cmp);
                let v = ops::percentile_sorted(&flat, q, interpolation);
                Ok(ops::store_float(self.precision(), vec![], vec![v]))
            }
            Some(ax) => {
                if ax >= t.ndim() {
                    return Err(Error::Shape(format!(
                        "Percentile axis {ax} out of range for shape {:?}",
                        t.shape()
                    )));
                }
                let mut perm: Vec<usize> = (0..t.ndim()).filter(|&d| d != ax).collect();
                perm.push(ax);
                let (pshape, idx) = ops::permute_plan(t.shape(), &perm);
                let data = ops::take_flat(t, &idx, pshape.clone()).to_f64_vec();
                let lane = *pshape.last().unwrap_or(&1);
                let out_shape: Vec<usize> = pshape[..pshape.len() - 1].to_vec();
                let out: Vec<f64> = data
                    .chunks(lane)
                    .map(|row| {
                        let mut row = row.to_vec();
                        row.sort_unstable_by(f64::total_cmp);
                        ops::percentile_sorted(&row, q, interpolation)
                    })
                    .collect();
                Ok(ops::store_float(self.precision(), out_shape, out))
            }
        }
    }

    /// Einstein summation over the operands.
    fn einsum(&self, subscripts: &str, operands: &[&Tensor]) -> Result<Tensor> {
        let (shape, out) = einsum::einsum(subscripts, operands)?;
        Ok(ops::store_float(self.precision(), shape, out))
    }

    /// Broadcast scalars/length-1 tensors against the common maximal length.
    /// Two tensors of differing non-unit lengths are a shape error.
    fn simple_broadcast(&self, tensors: &[&Tensor]) -> Result<Vec<Tensor>> {
        let mut max_len = 1usize;
        for t in tensors {
            if t.ndim() > 1 {
                return Err(Error::Shape(format!(
                    "simple_broadcast expects scalars or 1-d tensors, got shape {:?}",
                    t.shape()
                )));
            }
            if t.ndim() == 1 && t.len() != 1 {
                if max_len != 1 && t.len() != max_len {
                    return Err(Error::Shape(format!(
                        "Cannot broadcast lengths {max_len} and {}",
                        t.len()
                    )));
                }
                max_len = max_len.max(t.len());
            }
        }
        tensors
            .iter()
            .map(|t| {
                let out = ops::materialize_f64(t, &[max_len]);
                Ok(ops::store_float(self.precision(), vec![max_len], out))
            })
            .collect()
    }

    // ---- probability primitives -------------------------------------------

    /// Cumulative distribution function of `Normal(mu, sigma)` at `x`.
    fn normal_cdf(&self, x: &Tensor, mu: &Tensor, sigma: &Tensor) -> Result<Tensor> {
        // Φ(x) = (1 + erf(z / √2)) / 2
        let z = self.div(&self.sub(x, mu)?, sigma)?;
        let scaled = self.mul(&self.scalar(std::f64::consts::FRAC_1_SQRT_2)?, &z)?;
        let one_plus = self.add(&self.scalar(1.0)?, &self.erf(&scaled)?)?;
        self.mul(&self.scalar(0.5)?, &one_plus)
    }

    /// Log-density of `Normal(mu, sigma)` at `x`. A zero-width normal is
    /// numerically undefined here and yields NaN.
    fn normal_logpdf(&self, x: &Tensor, mu: &Tensor, sigma: &Tensor) -> Result<Tensor> {
        // log p = -z²/2 - ln(σ) - ln(√2π)
        let z = self.div(&self.sub(x, mu)?, sigma)?;
        let z2 = self.mul(&z, &z)?;
        let quad = self.mul(&self.scalar(-0.5)?, &z2)?;
        let less_lns = self.sub(&quad, &self.log(sigma)?)?;
        self.sub(&less_lns, &self.scalar(LN_SQRT_2PI)?)
    }

    /// Poisson probability of `n` (continuous, via the Gamma continuation)
    /// at rate `lam`, with `poisson(0, 0) = 1` as the limiting value.
    fn poisson(&self, n: &Tensor, lam: &Tensor) -> Result<Tensor> {
        let logp = self.poisson_logpdf(n, lam)?;
        self.exp(&logp)
    }

    /// Poisson log-probability; `xlogy` handles the `lam → 0` limit.
    fn poisson_logpdf(&self, n: &Tensor, lam: &Tensor) -> Result<Tensor> {
        // log Pois(n | λ) = n·ln(λ) - λ - ln Γ(n + 1)
        let nloglam = self.binary_op(BinaryOp::XLogY, n, lam)?;
        let less_lam = self.sub(&nloglam, lam)?;
        self.sub(&less_lam, &self.unary_op(UnaryOp::LnFactorial, n)?)
    }

    // ---- control flow -----------------------------------------------------

    /// Evaluate `predicate` (a 0-d boolean tensor) and invoke exactly one
    /// thunk. Thunks must be side-effect free; the unselected branch is
    /// never evaluated. A non-0-d predicate is a shape error.
    fn conditional(
        &self,
        predicate: &Tensor,
        on_true: &dyn Fn() -> Result<Tensor>,
        on_false: &dyn Fn() -> Result<Tensor>,
    ) -> Result<Tensor> {
        if predicate.scalar_bool()? {
            on_true()
        } else {
            on_false()
        }
    }

    // ---- conversion -------------------------------------------------------

    /// A 0-d float tensor holding `v`.
    fn scalar(&self, v: f64) -> Result<Tensor> {
        Ok(ops::store_float(self.precision(), vec![], vec![v]))
    }

    /// Recursively convert to a nested plain value. 0-d tensors convert to
    /// bare scalars; boolean tensors to plain booleans.
    fn tolist(&self, t: &Tensor) -> TensorValue {
        fn build(shape: &[usize], next: &mut dyn FnMut() -> TensorValue) -> TensorValue {
            match shape.first() {
                None => next(),
                Some(&n) => {
                    TensorValue::List((0..n).map(|_| build(&shape[1..], next)).collect())
                }
            }
        }
        match t.data() {
            TensorData::Bool(v) => {
                let mut it = v.iter();
                build(t.shape(), &mut || TensorValue::Bool(*it.next().unwrap_or(&false)))
            }
            _ => {
                let flat = t.to_f64_vec();
                let mut it = flat.iter();
                build(t.shape(), &mut || TensorValue::Num(*it.next().unwrap_or(&f64::NAN)))
            }
        }
    }

    /// No-op pass-through for input that is already a plain nested value.
    fn tolist_value(&self, value: &TensorValue) -> TensorValue {
        value.clone()
    }

    /// Export to the universal dense row-major representation.
    fn to_dense(&self, t: &Tensor) -> DenseArray {
        DenseArray { shape: t.shape().to_vec(), data: t.to_f64_vec() }
    }
}
