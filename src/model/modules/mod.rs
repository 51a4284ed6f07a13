mod dropout;
mod embedding;
mod layernorm;

pub use dropout::{ChaChaBernoulli, Dropout, MaskStrategy};
pub use embedding::{Embedding, EmbeddingOptions};
pub use layernorm::LayerNorm;
