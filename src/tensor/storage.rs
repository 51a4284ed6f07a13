//! Tensor Buffers
//!
//! Fixed-shape, owned storage for the values that cross the weight-map
//! boundary and for per-call working buffers.
//!
//! # Layout
//!
//! ```text
//! Shape::matrix(rows, hidden)
//!
//!   row 0:  h0 h1 h2 ... h(hidden-1)   <- hidden axis is fastest-varying
//!   row 1:  h0 h1 h2 ...
//!   ...
//! ```
//!
//! A BERT dictionary `[hidden, table_size]` stored column-major is the same
//! bytes as `Shape::matrix(table_size, hidden)` here: one contiguous hidden
//! vector per id. Output tensors `[positions, hidden]` follow the same rule.
//!
//! # Data Types
//!
//! Weights may arrive in reduced precision and are widened when a table is
//! materialized:
//! - `F32`: Full precision (4 bytes per element)
//! - `F16`: Half precision (2 bytes per element)
//! - `BF16`: Brain float (2 bytes per element)
//!
//! Buffers free their storage exactly once, on drop.

use half::{bf16, f16};
use ndarray::{Array2, ArrayView2};
use std::fmt;

use crate::error::{EmbeddingError, EmbeddingResult};

// =============================================================================
// Data Types
// =============================================================================

/// Precision a checkpoint stored a weight table in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    F32,
    F16,
    BF16,
}

impl Dtype {
    /// Bytes per element as stored, before widening.
    pub fn element_size(&self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F16 | Dtype::BF16 => 2,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::F32 => write!(f, "f32"),
            Dtype::F16 => write!(f, "f16"),
            Dtype::BF16 => write!(f, "bf16"),
        }
    }
}

// =============================================================================
// Shape
// =============================================================================

/// Ordered dimension sizes, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    pub fn vector(len: usize) -> Self {
        Self(vec![len])
    }

    /// `rows` hidden vectors of `hidden` elements each.
    pub fn matrix(rows: usize, hidden: usize) -> Self {
        Self(vec![rows, hidden])
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

// =============================================================================
// Tensor Buffer
// =============================================================================

/// Owned, fixed-shape storage.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBuffer<T> {
    shape: Shape,
    data: Vec<T>,
}

impl<T: Clone + Default> TensorBuffer<T> {
    /// Allocate storage for `shape`, filled with `T::default()`.
    pub fn zeroed(shape: Shape) -> Self {
        let data = vec![T::default(); shape.numel()];
        Self { shape, data }
    }
}

impl<T: Clone> TensorBuffer<T> {
    /// Allocate and bulk-copy from `src`.
    pub fn copy_from(shape: Shape, src: &[T]) -> EmbeddingResult<Self> {
        check_len(&shape, src.len())?;
        Ok(Self {
            shape,
            data: src.to_vec(),
        })
    }
}

impl<T> TensorBuffer<T> {
    /// Take ownership of `data` without copying.
    pub fn wrap(shape: Shape, data: Vec<T>) -> EmbeddingResult<Self> {
        check_len(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Mutable hidden vectors, one per row. Rank-2 only.
    pub fn rows_mut(&mut self) -> EmbeddingResult<std::slice::ChunksExactMut<'_, T>> {
        let [_, hidden] = self.matrix_dims()?;
        // chunks_exact_mut panics on zero; an empty hidden axis has no rows to yield anyway
        Ok(self.data.chunks_exact_mut(hidden.max(1)))
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Borrow as an `[rows, hidden]` matrix view.
    pub fn matrix_view(&self) -> EmbeddingResult<ArrayView2<'_, T>> {
        let [rows, hidden] = self.matrix_dims()?;
        ArrayView2::from_shape((rows, hidden), self.data.as_slice()).map_err(|_| self.rank_error())
    }

    /// Convert into an owned `[rows, hidden]` matrix without copying.
    pub fn into_matrix(self) -> EmbeddingResult<Array2<T>> {
        let [rows, hidden] = self.matrix_dims()?;
        let err = self.rank_error();
        Array2::from_shape_vec((rows, hidden), self.data).map_err(|_| err)
    }

    fn matrix_dims(&self) -> EmbeddingResult<[usize; 2]> {
        match self.shape.dims() {
            &[rows, hidden] => Ok([rows, hidden]),
            _ => Err(self.rank_error()),
        }
    }

    fn rank_error(&self) -> EmbeddingError {
        EmbeddingError::ShapeMismatch {
            name: "matrix".to_string(),
            expected: vec![self.shape.numel(), 1],
            actual: self.shape.dims().to_vec(),
        }
    }
}

fn check_len(shape: &Shape, len: usize) -> EmbeddingResult<()> {
    if shape.numel() != len {
        return Err(EmbeddingError::ShapeMismatch {
            name: "buffer".to_string(),
            expected: shape.dims().to_vec(),
            actual: vec![len],
        });
    }
    Ok(())
}

// =============================================================================
// Typed Storage
// =============================================================================

/// A weight tensor in whichever precision the checkpoint stored it.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorStorage {
    F32(TensorBuffer<f32>),
    F16(TensorBuffer<f16>),
    BF16(TensorBuffer<bf16>),
}

impl TensorStorage {
    pub fn dtype(&self) -> Dtype {
        match self {
            TensorStorage::F32(_) => Dtype::F32,
            TensorStorage::F16(_) => Dtype::F16,
            TensorStorage::BF16(_) => Dtype::BF16,
        }
    }

    pub fn shape(&self) -> &Shape {
        match self {
            TensorStorage::F32(b) => b.shape(),
            TensorStorage::F16(b) => b.shape(),
            TensorStorage::BF16(b) => b.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().numel()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.len() * self.dtype().element_size()
    }

    /// Wrap f32 data.
    pub fn from_f32(shape: Shape, data: Vec<f32>) -> EmbeddingResult<Self> {
        TensorBuffer::wrap(shape, data).map(TensorStorage::F32)
    }

    /// Narrow f32 data to f16.
    pub fn from_f32_as_f16(shape: Shape, data: Vec<f32>) -> EmbeddingResult<Self> {
        let narrowed: Vec<f16> = data.into_iter().map(f16::from_f32).collect();
        TensorBuffer::wrap(shape, narrowed).map(TensorStorage::F16)
    }

    /// Narrow f32 data to bf16.
    pub fn from_f32_as_bf16(shape: Shape, data: Vec<f32>) -> EmbeddingResult<Self> {
        let narrowed: Vec<bf16> = data.into_iter().map(bf16::from_f32).collect();
        TensorBuffer::wrap(shape, narrowed).map(TensorStorage::BF16)
    }

    /// Widen to an f32 buffer of the same shape. F32 storage is copied verbatim.
    pub fn to_f32(&self) -> TensorBuffer<f32> {
        let (shape, data): (&Shape, Vec<f32>) = match self {
            TensorStorage::F32(b) => return b.clone(),
            TensorStorage::F16(b) => (b.shape(), b.as_slice().iter().map(|x| x.to_f32()).collect()),
            TensorStorage::BF16(b) => (b.shape(), b.as_slice().iter().map(|x| x.to_f32()).collect()),
        };
        TensorBuffer {
            shape: shape.clone(),
            data,
        }
    }

    /// Get as f32 slice (only valid for F32 storage).
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        match self {
            TensorStorage::F32(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(Dtype::F32.element_size(), 4);
        assert_eq!(Dtype::F16.element_size(), 2);
        assert_eq!(Dtype::BF16.element_size(), 2);

        let reduced = TensorStorage::from_f32_as_f16(Shape::matrix(3, 4), vec![0.5; 12]).unwrap();
        assert_eq!(reduced.size_bytes(), 24);
        let full = TensorStorage::from_f32(Shape::matrix(3, 4), vec![0.5; 12]).unwrap();
        assert_eq!(full.size_bytes(), 48);
    }

    #[test]
    fn test_zeroed_buffer() {
        let buf: TensorBuffer<f32> = TensorBuffer::zeroed(Shape::matrix(3, 4));
        assert_eq!(buf.len(), 12);
        assert!(buf.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_copy_from_rejects_wrong_length() {
        let err = TensorBuffer::copy_from(Shape::matrix(2, 2), &[1.0f32, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, EmbeddingError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_wrap_keeps_allocation() {
        let data = vec![1i64, 2, 3];
        let ptr = data.as_ptr();
        let buf = TensorBuffer::wrap(Shape::vector(3), data).unwrap();
        assert_eq!(buf.as_slice().as_ptr(), ptr);
    }

    #[test]
    fn test_matrix_hidden_axis_is_contiguous() {
        let buf = TensorBuffer::copy_from(Shape::matrix(2, 3), &[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap();
        let view = buf.matrix_view().unwrap();
        assert_eq!(view.row(1).to_vec(), vec![3.0, 4.0, 5.0]);

        let m = buf.into_matrix().unwrap();
        assert_eq!(m.dim(), (2, 3));
        assert_eq!(m[[0, 2]], 2.0);
    }

    #[test]
    fn test_vector_is_not_a_matrix() {
        let buf = TensorBuffer::copy_from(Shape::vector(4), &[0.0f32; 4]).unwrap();
        assert!(buf.matrix_view().is_err());
    }

    #[test]
    fn test_rows_mut() {
        let mut buf: TensorBuffer<f32> = TensorBuffer::zeroed(Shape::matrix(2, 2));
        for (i, row) in buf.rows_mut().unwrap().enumerate() {
            row.fill(i as f32);
        }
        assert_eq!(buf.as_slice(), &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_f32_storage() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let storage = TensorStorage::from_f32(Shape::matrix(2, 2), data.clone()).unwrap();

        assert_eq!(storage.dtype(), Dtype::F32);
        assert_eq!(storage.len(), 4);
        assert_eq!(storage.to_f32().into_vec(), data);
        assert_eq!(storage.as_f32_slice(), Some(&data[..]));
    }

    #[test]
    fn test_f16_storage() {
        let data = vec![1.0, 2.0, 3.0, 4.5];
        let storage = TensorStorage::from_f32_as_f16(Shape::vector(4), data.clone()).unwrap();

        assert_eq!(storage.dtype(), Dtype::F16);
        assert!(storage.as_f32_slice().is_none());
        // Small integers and halves are exact in f16
        assert_eq!(storage.to_f32().into_vec(), data);
    }

    #[test]
    fn test_bf16_storage_keeps_shape() {
        let storage = TensorStorage::from_f32_as_bf16(Shape::matrix(1, 3), vec![0.5, -2.0, 8.0]).unwrap();
        let widened = storage.to_f32();
        assert_eq!(widened.shape(), &Shape::matrix(1, 3));
        assert_eq!(widened.as_slice(), &[0.5, -2.0, 8.0]);
    }
}
