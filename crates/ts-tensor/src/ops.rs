//! Shared shape machinery: broadcasting, index plans, storage helpers.
//!
//! Everything here is pure index arithmetic with identical semantics for
//! every engine; the engines only differ in how elementwise kernels and
//! reductions are executed.

use crate::tensor::{NativeDType, Precision, Tensor, TensorData};
use ts_core::{Error, Result};

pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for a shape.
pub(crate) fn strides_for(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

/// Broadcast two shapes per trailing-dimension alignment with size-1
/// stretching; incompatible dimensions are a shape error.
pub(crate) fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0usize; ndim];
    for d in 0..ndim {
        let da = if d < ndim - a.len() { 1 } else { a[d - (ndim - a.len())] };
        let db = if d < ndim - b.len() { 1 } else { b[d - (ndim - b.len())] };
        out[d] = if da == db {
            da
        } else if da == 1 {
            db
        } else if db == 1 {
            da
        } else {
            return Err(Error::Shape(format!(
                "Cannot broadcast shapes {a:?} and {b:?}"
            )));
        };
    }
    Ok(out)
}

/// Materialize `src` (with shape `from`) into a freshly allocated buffer of
/// shape `to`, which must be a valid broadcast target of `from`.
pub(crate) fn broadcast_flat<T: Copy>(src: &[T], from: &[usize], to: &[usize]) -> Vec<T> {
    if from == to {
        return src.to_vec();
    }
    let n = element_count(to);
    let offset = to.len() - from.len();
    let from_strides = strides_for(from);
    let sstr: Vec<usize> = (0..to.len())
        .map(|d| {
            if d < offset || from[d - offset] == 1 {
                0
            } else {
                from_strides[d - offset]
            }
        })
        .collect();

    let mut out = Vec::with_capacity(n);
    let mut coords = vec![0usize; to.len()];
    for _ in 0..n {
        let idx: usize = coords.iter().zip(&sstr).map(|(c, s)| c * s).sum();
        out.push(src[idx]);
        for d in (0..to.len()).rev() {
            coords[d] += 1;
            if coords[d] < to[d] {
                break;
            }
            coords[d] = 0;
        }
    }
    out
}

/// Widen to `f64` and materialize at the target shape.
pub(crate) fn materialize_f64(t: &Tensor, target: &[usize]) -> Vec<f64> {
    broadcast_flat(&t.to_f64_vec(), t.shape(), target)
}

/// Materialize truthiness at the target shape.
pub(crate) fn materialize_bool(t: &Tensor, target: &[usize]) -> Vec<bool> {
    match t.data() {
        TensorData::Bool(v) => broadcast_flat(v, t.shape(), target),
        _ => broadcast_flat(&t.to_f64_vec(), t.shape(), target)
            .into_iter()
            .map(|x| x != 0.0)
            .collect(),
    }
}

/// Broadcast a pair of tensors to their common shape as `f64` buffers.
pub(crate) fn broadcast_pair(a: &Tensor, b: &Tensor) -> Result<(Vec<usize>, Vec<f64>, Vec<f64>)> {
    let shape = broadcast_shapes(a.shape(), b.shape())?;
    let av = materialize_f64(a, &shape);
    let bv = materialize_f64(b, &shape);
    Ok((shape, av, bv))
}

/// Store an `f64` buffer at the precision mode's float width.
pub(crate) fn store_float(precision: Precision, shape: Vec<usize>, data: Vec<f64>) -> Tensor {
    let data = match precision {
        Precision::B32 => TensorData::F32(data.into_iter().map(|x| x as f32).collect()),
        Precision::B64 => TensorData::F64(data),
    };
    Tensor::new_unchecked(shape, data)
}

/// Store an integer buffer at the precision mode's integer width.
pub(crate) fn store_int(precision: Precision, shape: Vec<usize>, data: Vec<i64>) -> Tensor {
    let data = match precision {
        Precision::B32 => TensorData::I32(data.into_iter().map(|x| x as i32).collect()),
        Precision::B64 => TensorData::I64(data),
    };
    Tensor::new_unchecked(shape, data)
}

pub(crate) fn store_bool(shape: Vec<usize>, data: Vec<bool>) -> Tensor {
    Tensor::new_unchecked(shape, TensorData::Bool(data))
}

/// Native float width for a precision mode (dtype-map queries).
pub(crate) fn float_dtype(precision: Precision) -> NativeDType {
    match precision {
        Precision::B32 => NativeDType::F32,
        Precision::B64 => NativeDType::F64,
    }
}

pub(crate) fn int_dtype(precision: Precision) -> NativeDType {
    match precision {
        Precision::B32 => NativeDType::I32,
        Precision::B64 => NativeDType::I64,
    }
}

/// Gather elements by flat source index, preserving the native dtype.
pub(crate) fn take_flat(t: &Tensor, indices: &[usize], out_shape: Vec<usize>) -> Tensor {
    let data = match t.data() {
        TensorData::F32(v) => TensorData::F32(indices.iter().map(|&i| v[i]).collect()),
        TensorData::F64(v) => TensorData::F64(indices.iter().map(|&i| v[i]).collect()),
        TensorData::I32(v) => TensorData::I32(indices.iter().map(|&i| v[i]).collect()),
        TensorData::I64(v) => TensorData::I64(indices.iter().map(|&i| v[i]).collect()),
        TensorData::Bool(v) => TensorData::Bool(indices.iter().map(|&i| v[i]).collect()),
    };
    Tensor::new_unchecked(out_shape, data)
}

/// Index plan for a general axis permutation.
pub(crate) fn permute_plan(shape: &[usize], perm: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let out_shape: Vec<usize> = perm.iter().map(|&p| shape[p]).collect();
    let src_strides = strides_for(shape);
    let n = element_count(&out_shape);
    let mut indices = Vec::with_capacity(n);
    let mut coords = vec![0usize; out_shape.len()];
    for _ in 0..n {
        let idx: usize = coords
            .iter()
            .enumerate()
            .map(|(d, &c)| c * src_strides[perm[d]])
            .sum();
        indices.push(idx);
        for d in (0..out_shape.len()).rev() {
            coords[d] += 1;
            if coords[d] < out_shape[d] {
                break;
            }
            coords[d] = 0;
        }
    }
    (out_shape, indices)
}

/// Index plan for per-axis repetition. Shorter of shape/repeats is padded
/// with leading ones, so repeats may extend the rank.
pub(crate) fn tile_plan(shape: &[usize], reps: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let d = shape.len().max(reps.len());
    let mut sh = vec![1usize; d];
    sh[d - shape.len()..].copy_from_slice(shape);
    let mut rp = vec![1usize; d];
    rp[d - reps.len()..].copy_from_slice(reps);

    let out_shape: Vec<usize> = sh.iter().zip(&rp).map(|(a, b)| a * b).collect();
    let src_strides = strides_for(&sh);
    let n = element_count(&out_shape);
    let mut indices = Vec::with_capacity(n);
    let mut coords = vec![0usize; d];
    for _ in 0..n {
        let idx: usize = coords
            .iter()
            .enumerate()
            .map(|(dim, &c)| (c % sh[dim]) * src_strides[dim])
            .sum();
        indices.push(idx);
        for dim in (0..d).rev() {
            coords[dim] += 1;
            if coords[dim] < out_shape[dim] {
                break;
            }
            coords[dim] = 0;
        }
    }
    (out_shape, indices)
}

/// Percentile interpolation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Linear interpolation between the two bracketing order statistics
    Linear,
    /// Closest order statistic (ties round to even index)
    Nearest,
    /// Lower bracketing order statistic
    Lower,
    /// Higher bracketing order statistic
    Higher,
    /// Mean of the two bracketing order statistics
    Midpoint,
}

/// q-th percentile of a sorted non-empty slice.
pub(crate) fn percentile_sorted(sorted: &[f64], q: f64, interpolation: Interpolation) -> f64 {
    let n = sorted.len();
    let pos = q / 100.0 * ((n - 1) as f64);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    match interpolation {
        Interpolation::Linear => sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo]),
        Interpolation::Lower => sorted[lo],
        Interpolation::Higher => sorted[hi],
        Interpolation::Midpoint => 0.5 * (sorted[lo] + sorted[hi]),
        Interpolation::Nearest => sorted[pos.round_ties_even() as usize],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorData;

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[3], &[1]).unwrap(), vec![3]);
        assert_eq!(broadcast_shapes(&[2, 1], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shapes(&[], &[4]).unwrap(), vec![4]);
        assert!(broadcast_shapes(&[2], &[3]).is_err());
    }

    #[test]
    fn test_broadcast_flat_stretches_rows() {
        // [[1], [2]] broadcast to (2, 3)
        let out = broadcast_flat(&[1.0, 2.0], &[2, 1], &[2, 3]);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_strides_row_major() {
        assert_eq!(strides_for(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(strides_for(&[]), Vec::<usize>::new());
    }

    #[test]
    fn test_tile_plan_rank_extension() {
        // tile([10, 20], (2, 1)) -> [[10, 20], [10, 20]]
        let t = Tensor::from_parts(vec![2], TensorData::F64(vec![10.0, 20.0])).unwrap();
        let (shape, idx) = tile_plan(t.shape(), &[2, 1]);
        assert_eq!(shape, vec![2, 2]);
        let tiled = take_flat(&t, &idx, shape);
        assert_eq!(tiled.to_f64_vec(), vec![10.0, 20.0, 10.0, 20.0]);
    }

    #[test]
    fn test_percentile_sorted_schemes() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 7.0, 10.0];
        assert_eq!(percentile_sorted(&sorted, 50.0, Interpolation::Linear), 3.5);
        assert_eq!(percentile_sorted(&sorted, 50.0, Interpolation::Lower), 3.0);
        assert_eq!(percentile_sorted(&sorted, 50.0, Interpolation::Higher), 4.0);
        assert_eq!(percentile_sorted(&sorted, 50.0, Interpolation::Midpoint), 3.5);
        assert_eq!(percentile_sorted(&sorted, 50.0, Interpolation::Nearest), 3.0);
        assert_eq!(percentile_sorted(&sorted, 0.0, Interpolation::Linear), 1.0);
        assert_eq!(percentile_sorted(&sorted, 100.0, Interpolation::Linear), 10.0);
    }
}
