//! Error types for the embedding stage.

use thiserror::Error;

/// Every failure the embedding stage can report.
///
/// | Category | Variants |
/// |----------|----------|
/// | Construction | MissingWeight, ShapeMismatch, InvalidConfig |
/// | Call | InvalidIndex, SequenceTooLong |
/// | Kernel | IncompatibleShapes |
///
/// Nothing here is transient: the computation is pure, so none of these are
/// worth retrying with the same inputs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbeddingError {
    /// A required weight key is absent from the weight map.
    #[error("Missing weight: {name}")]
    MissingWeight { name: String },

    /// A tensor's shape does not match what the config implies.
    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// An id outside its table that is not the padding index.
    #[error("Invalid index {index} for {table} table of size {table_size}")]
    InvalidIndex {
        table: String,
        index: i64,
        table_size: usize,
    },

    /// Broadcast add on matrices that are neither equal-shaped nor row-broadcastable.
    #[error("Incompatible shapes for broadcast add: {lhs:?} and {rhs:?}")]
    IncompatibleShapes { lhs: [usize; 2], rhs: [usize; 2] },

    /// More ids than `max_position_embeddings`.
    #[error("Sequence too long: {len} ids exceeds max {max}")]
    SequenceTooLong { len: usize, max: usize },

    #[error("Invalid config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
