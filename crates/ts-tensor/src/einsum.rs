//! Einstein-summation evaluation over dense row-major buffers.
//!
//! Supports the standard subscript mini-language: comma-separated operand
//! specs, an optional `->` output spec, single-letter axis labels, and
//! ellipsis (`...`) groups. Without an output spec, the output follows the
//! usual convention: ellipsis dimensions first, then every label appearing
//! exactly once, alphabetically.

use crate::ops::{element_count, strides_for};
use crate::tensor::Tensor;
use ts_core::{Error, Result};

/// An axis identity: a named subscript label or the k-th ellipsis dimension
/// (counted left to right across the widest ellipsis group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AxisId {
    Label(char),
    Ell(usize),
}

struct OperandSpec {
    labels: Vec<char>,
    /// Position of the ellipsis within `labels`, if present.
    ellipsis_at: Option<usize>,
}

fn parse_operand_spec(spec: &str) -> Result<OperandSpec> {
    let mut labels = Vec::new();
    let mut ellipsis_at = None;
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '.' {
            if chars.next() != Some('.') || chars.next() != Some('.') {
                return Err(Error::Shape(format!("Malformed ellipsis in subscripts '{spec}'")));
            }
            if ellipsis_at.is_some() {
                return Err(Error::Shape(format!(
                    "Multiple ellipses in operand subscripts '{spec}'"
                )));
            }
            ellipsis_at = Some(labels.len());
        } else if c.is_ascii_alphabetic() {
            labels.push(c);
        } else {
            return Err(Error::Shape(format!("Invalid subscript character '{c}'")));
        }
    }
    Ok(OperandSpec { labels, ellipsis_at })
}

/// Axis ids of one operand, with its ellipsis block aligned to the right of
/// the widest ellipsis group (rank `ell_total`).
fn operand_axes(spec: &OperandSpec, ndim: usize, ell_total: usize) -> Result<Vec<AxisId>> {
    match spec.ellipsis_at {
        None => {
            if spec.labels.len() != ndim {
                return Err(Error::Shape(format!(
                    "Subscripts name {} axes for a {}-d operand",
                    spec.labels.len(),
                    ndim
                )));
            }
            Ok(spec.labels.iter().map(|&c| AxisId::Label(c)).collect())
        }
        Some(at) => {
            let ell_rank = ndim - spec.labels.len();
            let mut axes = Vec::with_capacity(ndim);
            for &c in &spec.labels[..at] {
                axes.push(AxisId::Label(c));
            }
            for j in 0..ell_rank {
                axes.push(AxisId::Ell(ell_total - ell_rank + j));
            }
            for &c in &spec.labels[at..] {
                axes.push(AxisId::Label(c));
            }
            Ok(axes)
        }
    }
}

/// Evaluate an einsum expression; returns the output shape and buffer.
pub(crate) fn einsum(subscripts: &str, operands: &[&Tensor]) -> Result<(Vec<usize>, Vec<f64>)> {
    let spec: String = subscripts.chars().filter(|c| !c.is_whitespace()).collect();
    let (lhs, rhs) = match spec.split_once("->") {
        Some((l, r)) => (l.to_string(), Some(r.to_string())),
        None => (spec.clone(), None),
    };

    let op_specs: Vec<OperandSpec> =
        lhs.split(',').map(parse_operand_spec).collect::<Result<_>>()?;
    if op_specs.len() != operands.len() {
        return Err(Error::Shape(format!(
            "Subscripts describe {} operands, got {}",
            op_specs.len(),
            operands.len()
        )));
    }

    // Widest ellipsis group across operands.
    let mut ell_total = 0usize;
    for (spec, t) in op_specs.iter().zip(operands) {
        if spec.ellipsis_at.is_some() {
            if spec.labels.len() > t.ndim() {
                return Err(Error::Shape(format!(
                    "Subscripts name {} axes for a {}-d operand",
                    spec.labels.len(),
                    t.ndim()
                )));
            }
            ell_total = ell_total.max(t.ndim() - spec.labels.len());
        }
    }

    // Axis ids per operand, plus the merged size of every axis id.
    let mut axes_per_operand = Vec::with_capacity(operands.len());
    let mut sizes: Vec<(AxisId, usize)> = Vec::new();
    for (spec, t) in op_specs.iter().zip(operands) {
        let axes = operand_axes(spec, t.ndim(), ell_total)?;
        for (d, &id) in axes.iter().enumerate() {
            let dim = t.shape()[d];
            match sizes.iter().position(|(known, _)| *known == id) {
                None => sizes.push((id, dim)),
                Some(pos) => {
                    let known_dim = sizes[pos].1;
                    let broadcastable = matches!(id, AxisId::Ell(_));
                    if known_dim == dim {
                        // consistent
                    } else if broadcastable && known_dim == 1 {
                        sizes[pos].1 = dim;
                    } else if broadcastable && dim == 1 {
                        // stretched operand dimension
                    } else {
                        return Err(Error::Shape(format!(
                            "Inconsistent dimension for subscript {id:?}: {known_dim} vs {dim}"
                        )));
                    }
                }
            }
        }
        axes_per_operand.push(axes);
    }
    let size_of = |id: AxisId| -> usize {
        sizes.iter().find(|(known, _)| *known == id).map(|(_, s)| *s).unwrap_or(1)
    };

    // Output axis ids.
    let out_ids: Vec<AxisId> = match rhs {
        Some(out_spec) => {
            let parsed = parse_operand_spec(&out_spec)?;
            if parsed.ellipsis_at.is_none() && ell_total > 0 {
                return Err(Error::Shape(
                    "Output subscripts must carry the ellipsis group".to_string(),
                ));
            }
            let mut ids = Vec::new();
            let at = parsed.ellipsis_at.unwrap_or(parsed.labels.len());
            for &c in &parsed.labels[..at] {
                ids.push(AxisId::Label(c));
            }
            if parsed.ellipsis_at.is_some() {
                for k in 0..ell_total {
                    ids.push(AxisId::Ell(k));
                }
            }
            for &c in &parsed.labels[at..] {
                ids.push(AxisId::Label(c));
            }
            for &id in &ids {
                if !sizes.iter().any(|(known, _)| *known == id) {
                    return Err(Error::Shape(format!(
                        "Output subscript {id:?} does not appear in any operand"
                    )));
                }
            }
            ids
        }
        None => {
            let mut counts: Vec<(char, usize)> = Vec::new();
            for axes in &axes_per_operand {
                for id in axes {
                    if let AxisId::Label(c) = id {
                        match counts.iter().position(|(k, _)| k == c) {
                            None => counts.push((*c, 1)),
                            Some(pos) => counts[pos].1 += 1,
                        }
                    }
                }
            }
            let mut once: Vec<char> =
                counts.into_iter().filter(|&(_, n)| n == 1).map(|(c, _)| c).collect();
            once.sort_unstable();
            let mut ids: Vec<AxisId> = (0..ell_total).map(AxisId::Ell).collect();
            ids.extend(once.into_iter().map(AxisId::Label));
            ids
        }
    };

    // Summed axes: everything not in the output, in first-seen order.
    let mut sum_ids: Vec<AxisId> = Vec::new();
    for axes in &axes_per_operand {
        for &id in axes {
            if !out_ids.contains(&id) && !sum_ids.contains(&id) {
                sum_ids.push(id);
            }
        }
    }

    let out_shape: Vec<usize> = out_ids.iter().map(|&id| size_of(id)).collect();
    let sum_shape: Vec<usize> = sum_ids.iter().map(|&id| size_of(id)).collect();

    // Per-operand flat-index coefficients in (out_ids ++ sum_ids) slot order.
    let all_ids: Vec<AxisId> = out_ids.iter().chain(sum_ids.iter()).copied().collect();
    let mut coeffs = Vec::with_capacity(operands.len());
    let mut buffers = Vec::with_capacity(operands.len());
    for (axes, t) in axes_per_operand.iter().zip(operands) {
        let strides = strides_for(t.shape());
        let mut per_slot = vec![0usize; all_ids.len()];
        for (d, &id) in axes.iter().enumerate() {
            let slot = all_ids.iter().position(|&x| x == id).unwrap_or(0);
            // Stretched (size-1) dimensions pin their coordinate to zero.
            if t.shape()[d] != 1 {
                per_slot[slot] += strides[d];
            }
        }
        coeffs.push(per_slot);
        buffers.push(t.to_f64_vec());
    }

    let out_n = element_count(&out_shape);
    let sum_n = element_count(&sum_shape);
    let n_out_slots = out_ids.len();
    let mut out = vec![0.0f64; out_n];
    let mut coords = vec![0usize; all_ids.len()];

    for slot_out in out.iter_mut() {
        // Reset the summed part of the coordinate vector.
        for c in coords[n_out_slots..].iter_mut() {
            *c = 0;
        }
        let mut acc = 0.0;
        for _ in 0..sum_n {
            let mut prod = 1.0;
            for (buf, per_slot) in buffers.iter().zip(&coeffs) {
                let idx: usize = coords.iter().zip(per_slot).map(|(c, k)| c * k).sum();
                prod *= buf[idx];
            }
            acc += prod;
            for d in (n_out_slots..all_ids.len()).rev() {
                coords[d] += 1;
                if coords[d] < sum_shape[d - n_out_slots] {
                    break;
                }
                coords[d] = 0;
            }
        }
        *slot_out = acc;
        for d in (0..n_out_slots).rev() {
            coords[d] += 1;
            if coords[d] < out_shape[d] {
                break;
            }
            coords[d] = 0;
        }
    }

    Ok((out_shape, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorData;

    fn t(shape: Vec<usize>, data: Vec<f64>) -> Tensor {
        Tensor::from_parts(shape, TensorData::F64(data)).unwrap()
    }

    #[test]
    fn test_transpose_2d() {
        let x = t(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let (shape, out) = einsum("ij->ji", &[&x]).unwrap();
        assert_eq!(shape, vec![3, 2]);
        assert_eq!(out, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_outer_product() {
        let a = t(vec![3], vec![1.0, 1.0, 1.0]);
        let b = t(vec![3], vec![1.0, 2.0, 3.0]);
        let (shape, out) = einsum("i,j->ij", &[&a, &b]).unwrap();
        assert_eq!(shape, vec![3, 3]);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_matmul_implicit_output() {
        // "ij,jk" -> "ik" by the single-occurrence rule
        let a = t(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let b = t(vec![2, 2], vec![5.0, 6.0, 7.0, 8.0]);
        let (shape, out) = einsum("ij,jk", &[&a, &b]).unwrap();
        assert_eq!(shape, vec![2, 2]);
        assert_eq!(out, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_ellipsis_swap_leading_axes() {
        // 'ij...->ji...' on shape (1, 3) -> (3, 1)
        let x = t(vec![1, 3], vec![1.0, 2.0, 3.0]);
        let (shape, out) = einsum("ij...->ji...", &[&x]).unwrap();
        assert_eq!(shape, vec![3, 1]);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);

        // Same spec on shape (1, 1, 3): ellipsis covers the trailing axis.
        let x = t(vec![1, 1, 3], vec![1.0, 2.0, 3.0]);
        let (shape, out) = einsum("ij...->ji...", &[&x]).unwrap();
        assert_eq!(shape, vec![1, 1, 3]);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_ellipsis_three_axis_reverse() {
        let x = t(vec![1, 1, 3], vec![1.0, 2.0, 3.0]);
        let (shape, out) = einsum("ijk...->kji...", &[&x]).unwrap();
        assert_eq!(shape, vec![3, 1, 1]);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_trace_sums_diagonal() {
        let x = t(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let (shape, out) = einsum("ii->i", &[&x]).unwrap();
        assert_eq!(shape, vec![2]);
        assert_eq!(out, vec![1.0, 4.0]);
    }

    #[test]
    fn test_operand_count_mismatch() {
        let x = t(vec![2], vec![1.0, 2.0]);
        assert!(einsum("i,j->ij", &[&x]).is_err());
    }
}
