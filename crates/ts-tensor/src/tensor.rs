//! Tensor value types: dense row-major storage, logical dtypes, precision
//! modes, and the nested plain-value representation used at the API boundary.

use ts_core::{Error, Result};

/// Floating-point / integer width mode, fixed at backend construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    /// 32-bit floats and integers
    B32,
    /// 64-bit floats and integers
    B64,
}

impl Precision {
    /// Render as the conventional token (`"32b"` / `"64b"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::B32 => "32b",
            Precision::B64 => "64b",
        }
    }
}

/// Logical dtype token. The active backend's precision mode maps these to
/// concrete native types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Floating point (`f32`/`f64` depending on precision)
    Float,
    /// Integer (`i32`/`i64` depending on precision)
    Int,
    /// Boolean
    Bool,
}

impl DType {
    /// Name-based dtype lookup.
    ///
    /// Any name outside `{"float", "int", "bool"}` logs an INFO diagnostic
    /// on the `ts::tensor` channel and fails with [`Error::InvalidDType`].
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "float" => Ok(DType::Float),
            "int" => Ok(DType::Int),
            "bool" => Ok(DType::Bool),
            _ => {
                log::info!(target: "ts::tensor", "Invalid dtype: {name}");
                Err(Error::InvalidDType(name.to_string()))
            }
        }
    }
}

/// Concrete native element type of a stored tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeDType {
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// Boolean
    Bool,
}

/// Dense row-major element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// 32-bit float buffer
    F32(Vec<f32>),
    /// 64-bit float buffer
    F64(Vec<f64>),
    /// 32-bit integer buffer
    I32(Vec<i32>),
    /// 64-bit integer buffer
    I64(Vec<i64>),
    /// Boolean buffer
    Bool(Vec<bool>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }
}

/// An opaque dense multi-dimensional numeric value.
///
/// A 0-d tensor has an empty shape and exactly one element. Storage is
/// row-major; the native element type is determined by the backend that
/// produced the tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Assemble a tensor from a shape and matching storage.
    pub fn from_parts(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::Shape(format!(
                "Storage length {} does not match shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    pub(crate) fn new_unchecked(shape: Vec<usize>, data: TensorData) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self { shape, data }
    }

    /// Shape as an ordered tuple of non-negative integers.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for tensors with zero elements.
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// True for 0-d tensors.
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Concrete native element type.
    pub fn native_dtype(&self) -> NativeDType {
        match &self.data {
            TensorData::F32(_) => NativeDType::F32,
            TensorData::F64(_) => NativeDType::F64,
            TensorData::I32(_) => NativeDType::I32,
            TensorData::I64(_) => NativeDType::I64,
            TensorData::Bool(_) => NativeDType::Bool,
        }
    }

    pub(crate) fn data(&self) -> &TensorData {
        &self.data
    }

    /// Elements widened to `f64` in row-major order (booleans as 0/1).
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            TensorData::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            TensorData::F64(v) => v.clone(),
            TensorData::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            TensorData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Bool(v) => v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Integer elements in row-major order; fails for float/bool storage.
    pub fn to_index_vec(&self) -> Result<Vec<i64>> {
        match &self.data {
            TensorData::I32(v) => Ok(v.iter().map(|&x| i64::from(x)).collect()),
            TensorData::I64(v) => Ok(v.clone()),
            _ => Err(Error::Validation(
                "Index tensor must have integer dtype".to_string(),
            )),
        }
    }

    /// The single element of a 0-d (or one-element) tensor as `f64`.
    pub fn scalar_f64(&self) -> Result<f64> {
        if self.len() != 1 {
            return Err(Error::Shape(format!(
                "Expected a scalar tensor, got shape {:?}",
                self.shape
            )));
        }
        Ok(self.to_f64_vec()[0])
    }

    /// The single element of a 0-d boolean tensor.
    pub fn scalar_bool(&self) -> Result<bool> {
        if !self.is_scalar() {
            return Err(Error::Shape(format!(
                "Expected a 0-d predicate tensor, got shape {:?}",
                self.shape
            )));
        }
        match &self.data {
            TensorData::Bool(v) => Ok(v[0]),
            _ => Ok(self.to_f64_vec()[0] != 0.0),
        }
    }
}

/// Universal dense row-major export format for interop with external
/// collaborators (plotting, I/O).
#[derive(Debug, Clone, PartialEq)]
pub struct DenseArray {
    /// Shape of the exported array
    pub shape: Vec<usize>,
    /// Row-major elements, widened to `f64`
    pub data: Vec<f64>,
}

/// Nested language-native value: the input accepted by `astensor` and the
/// output produced by `tolist`.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValue {
    /// A numeric scalar
    Num(f64),
    /// A boolean scalar
    Bool(bool),
    /// A (possibly nested) sequence
    List(Vec<TensorValue>),
}

impl TensorValue {
    /// Recursive approximate equality with relative tolerance.
    ///
    /// Two NaN leaves compare equal, mirroring the way reference values for
    /// numerically-undefined results are written down.
    pub fn approx_eq(&self, other: &TensorValue, rel: f64) -> bool {
        match (self, other) {
            (TensorValue::Num(a), TensorValue::Num(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                if a.is_infinite() || b.is_infinite() {
                    return a == b;
                }
                (a - b).abs() <= rel * a.abs().max(b.abs()).max(1e-300) || (a - b).abs() < 1e-12
            }
            (TensorValue::Bool(a), TensorValue::Bool(b)) => a == b,
            (TensorValue::List(a), TensorValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.approx_eq(y, rel))
            }
            _ => false,
        }
    }
}

impl From<f64> for TensorValue {
    fn from(v: f64) -> Self {
        TensorValue::Num(v)
    }
}

impl From<f32> for TensorValue {
    fn from(v: f32) -> Self {
        TensorValue::Num(f64::from(v))
    }
}

impl From<i32> for TensorValue {
    fn from(v: i32) -> Self {
        TensorValue::Num(f64::from(v))
    }
}

impl From<i64> for TensorValue {
    fn from(v: i64) -> Self {
        TensorValue::Num(v as f64)
    }
}

impl From<bool> for TensorValue {
    fn from(v: bool) -> Self {
        TensorValue::Bool(v)
    }
}

impl<T: Into<TensorValue>> From<Vec<T>> for TensorValue {
    fn from(v: Vec<T>) -> Self {
        TensorValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TensorValue> + Clone> From<&[T]> for TensorValue {
    fn from(v: &[T]) -> Self {
        TensorValue::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<TensorValue> + Clone, const N: usize> From<[T; N]> for TensorValue {
    fn from(v: [T; N]) -> Self {
        TensorValue::List(v.iter().cloned().map(Into::into).collect())
    }
}

/// Shape of a nested value; ragged nesting is a shape error.
pub(crate) fn value_shape(value: &TensorValue) -> Result<Vec<usize>> {
    match value {
        TensorValue::Num(_) | TensorValue::Bool(_) => Ok(vec![]),
        TensorValue::List(items) => {
            let mut shape = vec![items.len()];
            if let Some(first) = items.first() {
                let inner = value_shape(first)?;
                for item in items.iter().skip(1) {
                    if value_shape(item)? != inner {
                        return Err(Error::Shape(
                            "Ragged nested sequence cannot be converted to a tensor".to_string(),
                        ));
                    }
                }
                shape.extend(inner);
            }
            Ok(shape)
        }
    }
}

/// Flatten a nested value to `f64` elements in row-major order.
pub(crate) fn value_flatten(value: &TensorValue, out: &mut Vec<f64>) {
    match value {
        TensorValue::Num(x) => out.push(*x),
        TensorValue::Bool(b) => out.push(if *b { 1.0 } else { 0.0 }),
        TensorValue::List(items) => {
            for item in items {
                value_flatten(item, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_shape_nested() {
        let v = TensorValue::from(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(value_shape(&v).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_value_shape_empty_list() {
        let v = TensorValue::List(vec![]);
        assert_eq!(value_shape(&v).unwrap(), vec![0]);
    }

    #[test]
    fn test_value_shape_ragged_fails() {
        let v = TensorValue::List(vec![
            TensorValue::from(vec![1.0, 2.0]),
            TensorValue::from(vec![3.0]),
        ]);
        assert!(matches!(value_shape(&v), Err(Error::Shape(_))));
    }

    #[test]
    fn test_dtype_from_name() {
        assert_eq!(DType::from_name("float").unwrap(), DType::Float);
        assert_eq!(DType::from_name("int").unwrap(), DType::Int);
        assert_eq!(DType::from_name("bool").unwrap(), DType::Bool);
        assert!(matches!(DType::from_name("long"), Err(Error::InvalidDType(_))));
    }

    #[test]
    fn test_precision_tokens() {
        assert_eq!(Precision::B32.as_str(), "32b");
        assert_eq!(Precision::B64.as_str(), "64b");
    }

    #[test]
    fn test_scalar_tensor_shape() {
        let t = Tensor::from_parts(vec![], TensorData::F64(vec![1.5])).unwrap();
        assert!(t.is_scalar());
        assert_eq!(t.shape(), &[] as &[usize]);
        assert_eq!(t.scalar_f64().unwrap(), 1.5);
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        let r = Tensor::from_parts(vec![2, 2], TensorData::F64(vec![1.0, 2.0]));
        assert!(matches!(r, Err(Error::Shape(_))));
    }
}
