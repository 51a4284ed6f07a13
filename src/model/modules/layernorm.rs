use crate::error::{EmbeddingError, EmbeddingResult};
use crate::kernels::{self, Activation};
use crate::tensor::{Tensor1, Tensor2};

/// LayerNorm over the hidden axis with a fused output activation.
///
/// BERT's embedding block runs GELU directly on the normalized sum here
/// rather than leaving the output linear.
pub struct LayerNorm {
    pub gamma: Tensor1, // [hidden_size]
    pub beta: Tensor1,  // [hidden_size]
    pub eps: f32,
    pub activation: Activation,
}

impl LayerNorm {
    pub fn new(gamma: Tensor1, beta: Tensor1, eps: f32) -> EmbeddingResult<Self> {
        if gamma.len() != beta.len() {
            return Err(EmbeddingError::ShapeMismatch {
                name: "beta".to_string(),
                expected: vec![gamma.len()],
                actual: vec![beta.len()],
            });
        }
        Ok(Self {
            gamma,
            beta,
            eps,
            activation: Activation::Identity,
        })
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn hidden_size(&self) -> usize {
        self.gamma.len()
    }

    /// Forward pass: x [positions, hidden] -> [positions, hidden]
    pub fn forward(&self, x: &Tensor2) -> EmbeddingResult<Tensor2> {
        kernels::layer_norm(
            &x.view(),
            &self.gamma.view(),
            &self.beta.view(),
            self.eps,
            self.activation,
        )
    }
}
