pub mod error;
pub mod kernels;
pub mod loader;
pub mod model;
pub mod tensor;

pub use error::{EmbeddingError, EmbeddingResult};
pub use loader::{Config, WeightMap};
pub use model::{BertEmbeddings, ChaChaBernoulli, MaskStrategy, Phase};
pub use tensor::{Dtype, Shape, Tensor2, TensorBuffer, TensorStorage};
