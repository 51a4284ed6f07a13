use crate::error::{EmbeddingError, EmbeddingResult};
use crate::tensor::{Shape, Tensor2, TensorBuffer};
use ndarray::Array2;

/// Optional renormalization of looked-up vectors.
///
/// `max_norm == 0.0` disables it, which is how every BERT table is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddingOptions {
    pub max_norm: f32,
    /// p of the p-norm compared against `max_norm`
    pub norm_type: f32,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            max_norm: 0.0,
            norm_type: 2.0,
        }
    }
}

/// Embedding lookup table
pub struct Embedding {
    name: String,
    table: Array2<f32>, // [table_size, hidden_size]
    padding_idx: Option<usize>,
    options: EmbeddingOptions,
}

impl Embedding {
    /// `padding_idx: None` means no id is suppressed, including 0.
    pub fn new(name: impl Into<String>, table: Array2<f32>, padding_idx: Option<usize>) -> Self {
        Self {
            name: name.into(),
            table,
            padding_idx,
            options: EmbeddingOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EmbeddingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Array2<f32> {
        &self.table
    }

    pub fn table_size(&self) -> usize {
        self.table.nrows()
    }

    pub fn hidden_size(&self) -> usize {
        self.table.ncols()
    }

    pub fn padding_idx(&self) -> Option<usize> {
        self.padding_idx
    }

    fn is_padding(&self, id: i64) -> bool {
        self.padding_idx.is_some_and(|p| i64::try_from(p) == Ok(id))
    }

    /// Forward pass: one output row per id.
    ///
    /// ids: [N] -> [N, hidden_size]. A padding id yields the zero vector;
    /// any other id must be inside the table.
    pub fn forward(&self, ids: &[i64]) -> EmbeddingResult<Tensor2> {
        let mut out = TensorBuffer::<f32>::zeroed(Shape::matrix(ids.len(), self.hidden_size()));

        for (&id, row) in ids.iter().zip(out.rows_mut()?) {
            if self.is_padding(id) {
                continue;
            }
            let idx = usize::try_from(id)
                .ok()
                .filter(|&i| i < self.table_size())
                .ok_or_else(|| EmbeddingError::InvalidIndex {
                    table: self.name.clone(),
                    index: id,
                    table_size: self.table_size(),
                })?;

            for (dst, &src) in row.iter_mut().zip(self.table.row(idx)) {
                *dst = src;
            }
            if self.options.max_norm > 0.0 {
                renorm(row, self.options);
            }
        }

        out.into_matrix()
    }
}

/// Scale `row` down so its p-norm does not exceed `max_norm`.
fn renorm(row: &mut [f32], options: EmbeddingOptions) {
    let p = options.norm_type;
    let norm = row.iter().map(|v| v.abs().powf(p)).sum::<f32>().powf(1.0 / p);
    if norm > options.max_norm {
        let scale = options.max_norm / (norm + 1e-7);
        row.iter_mut().for_each(|v| *v *= scale);
    }
}
