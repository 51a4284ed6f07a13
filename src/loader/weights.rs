use ndarray::{Array1, Array2};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::tensor::{Shape, TensorStorage};

/// Named weight tensors handed over by whatever loaded the checkpoint.
///
/// The embedding stage only borrows the map while building its tables; every
/// table owns an f32 copy afterwards.
#[derive(Debug, Clone, Default)]
pub struct WeightMap {
    tensors: HashMap<String, TensorStorage>,
}

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorStorage) -> Option<TensorStorage> {
        self.tensors.insert(name.into(), tensor)
    }

    /// Insert f32 data with the given shape.
    pub fn insert_f32(
        &mut self,
        name: impl Into<String>,
        shape: &[usize],
        data: Vec<f32>,
    ) -> EmbeddingResult<()> {
        let name = name.into();
        let tensor = TensorStorage::from_f32(Shape::new(shape), data).map_err(|e| rename(e, &name))?;
        self.tensors.insert(name, tensor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TensorStorage> {
        self.tensors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn get_tensor_shape(&self, name: &str) -> Option<&[usize]> {
        self.tensors.get(name).map(|t| t.shape().dims())
    }

    /// First tensor present under any of `names`, tried in order.
    ///
    /// A miss reports the first (canonical) name.
    pub fn resolve<'a>(&self, names: &[&'a str]) -> EmbeddingResult<(&'a str, &TensorStorage)> {
        names
            .iter()
            .find_map(|&name| self.tensors.get(name).map(|t| (name, t)))
            .ok_or_else(|| EmbeddingError::MissingWeight {
                name: names.first().copied().unwrap_or_default().to_string(),
            })
    }

    /// Materialize a `[rows, cols]` f32 matrix.
    ///
    /// Flat tensors are accepted when the element count matches; rank-2
    /// tensors must match the shape exactly so a transposed table is caught.
    pub fn matrix(&self, names: &[&str], rows: usize, cols: usize) -> EmbeddingResult<Array2<f32>> {
        let (name, tensor) = self.resolve(names)?;
        let dims = tensor.shape().dims();
        let shape_ok = match dims {
            &[r, c] => r == rows && c == cols,
            _ => tensor.len() == rows * cols,
        };
        if !shape_ok {
            return Err(EmbeddingError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![rows, cols],
                actual: dims.to_vec(),
            });
        }

        debug!(
            name,
            dtype = %tensor.dtype(),
            bytes = tensor.size_bytes(),
            "materializing f32 table"
        );
        let data = tensor.to_f32().into_vec();
        Array2::from_shape_vec((rows, cols), data).map_err(|_| EmbeddingError::ShapeMismatch {
            name: name.to_string(),
            expected: vec![rows, cols],
            actual: dims.to_vec(),
        })
    }

    /// Materialize a length-`len` f32 vector.
    pub fn vector(&self, names: &[&str], len: usize) -> EmbeddingResult<Array1<f32>> {
        let (name, tensor) = self.resolve(names)?;
        if tensor.len() != len {
            return Err(EmbeddingError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![len],
                actual: tensor.shape().dims().to_vec(),
            });
        }
        Ok(Array1::from_vec(tensor.to_f32().into_vec()))
    }
}

impl FromIterator<(String, TensorStorage)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (String, TensorStorage)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

fn rename(err: EmbeddingError, name: &str) -> EmbeddingError {
    match err {
        EmbeddingError::ShapeMismatch { expected, actual, .. } => EmbeddingError::ShapeMismatch {
            name: name.to_string(),
            expected,
            actual,
        },
        other => other,
    }
}
