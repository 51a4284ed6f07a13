use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, EmbeddingResult};

mod weights;
#[cfg(test)]
mod tests;

pub use weights::WeightMap;

/// Hyperparameters of the embedding stage.
///
/// Field names follow a Hugging Face BERT `config.json`, so a parsed
/// `config.json` deserializes directly; unknown keys (attention heads, layer
/// counts, ...) are ignored and absent keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub hidden_size: usize,
    pub vocab_size: usize,
    pub max_position_embeddings: usize,
    pub type_vocab_size: usize,
    pub pad_token_id: usize,
    #[serde(alias = "norm_eps")]
    pub layer_norm_eps: f32,
    #[serde(alias = "dropout_rate")]
    pub hidden_dropout_prob: f32,
    pub position_embedding_type: String,
    /// sqrt(2/pi) in the tanh GELU approximation
    pub gelu_alpha: f32,
    /// Cubic coefficient in the tanh GELU approximation
    pub gelu_beta: f32,
    /// Seed for the Training-phase dropout mask
    pub dropout_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hidden_size: 128,
            vocab_size: 30522,
            max_position_embeddings: 512,
            type_vocab_size: 2,
            pad_token_id: 0,
            layer_norm_eps: 1e-12,
            hidden_dropout_prob: 0.1,
            position_embedding_type: "absolute".to_string(),
            gelu_alpha: 0.797_884_6,
            gelu_beta: 0.044_715,
            dropout_seed: 0,
        }
    }
}

impl Config {
    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> EmbeddingResult<Self> {
        serde_json::from_str(json).map_err(|e| EmbeddingError::InvalidConfig {
            field: "<document>",
            reason: e.to_string(),
        })
    }

    /// Reject configurations the embedding stage cannot run with.
    pub fn validate(&self) -> EmbeddingResult<()> {
        for (field, value) in [
            ("hidden_size", self.hidden_size),
            ("vocab_size", self.vocab_size),
            ("max_position_embeddings", self.max_position_embeddings),
            ("type_vocab_size", self.type_vocab_size),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        if self.pad_token_id >= self.vocab_size {
            return Err(invalid(
                "pad_token_id",
                format!("{} is outside vocabulary of {}", self.pad_token_id, self.vocab_size),
            ));
        }

        if self.pad_token_id >= self.max_position_embeddings {
            return Err(invalid(
                "pad_token_id",
                format!(
                    "{} is outside position table of {}",
                    self.pad_token_id, self.max_position_embeddings
                ),
            ));
        }

        if !self.layer_norm_eps.is_finite() || self.layer_norm_eps <= 0.0 {
            return Err(invalid(
                "layer_norm_eps",
                format!("{} must be finite and positive", self.layer_norm_eps),
            ));
        }

        if !(0.0..=1.0).contains(&self.hidden_dropout_prob) {
            return Err(invalid(
                "hidden_dropout_prob",
                format!("{} is outside [0, 1]", self.hidden_dropout_prob),
            ));
        }

        if self.position_embedding_type != "absolute" {
            return Err(invalid(
                "position_embedding_type",
                format!("`{}` is not supported, only `absolute`", self.position_embedding_type),
            ));
        }

        if !self.gelu_alpha.is_finite() || !self.gelu_beta.is_finite() {
            return Err(invalid("gelu_alpha", "activation constants must be finite"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> EmbeddingError {
    EmbeddingError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}
