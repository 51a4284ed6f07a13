use crate::error::{EmbeddingError, EmbeddingResult};
use crate::kernels::{self, Activation};
use crate::loader::{Config, WeightMap};
use crate::tensor::Tensor2;
use std::sync::Arc;
use tracing::{debug, trace};

pub mod modules;
pub use modules::{ChaChaBernoulli, Dropout, Embedding, EmbeddingOptions, LayerNorm, MaskStrategy};

pub const WORD_EMBEDDINGS: &[&str] = &[
    "bert.embeddings.word_embeddings.weight",
    "embeddings.word_embeddings.weight",
];
pub const POSITION_EMBEDDINGS: &[&str] = &[
    "bert.embeddings.position_embeddings.weight",
    "embeddings.position_embeddings.weight",
];
pub const TOKEN_TYPE_EMBEDDINGS: &[&str] = &[
    "bert.embeddings.token_type_embeddings.weight",
    "embeddings.token_type_embeddings.weight",
];
pub const LAYER_NORM_GAMMA: &[&str] = &[
    "bert.embeddings.LayerNorm.gamma",
    "bert.embeddings.LayerNorm.weight",
    "embeddings.LayerNorm.gamma",
    "embeddings.LayerNorm.weight",
];
pub const LAYER_NORM_BETA: &[&str] = &[
    "bert.embeddings.LayerNorm.beta",
    "bert.embeddings.LayerNorm.bias",
    "embeddings.LayerNorm.beta",
    "embeddings.LayerNorm.bias",
];

/// Whether layer norm and dropout run after the embedding sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Inference,
    Training,
}

/// BERT input-embedding stage: word + position + token-type lookups.
///
/// Every call allocates its own working buffers, so one instance can serve
/// concurrent callers.
pub struct BertEmbeddings {
    pub config: Config,
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    layer_norm: LayerNorm,
    dropout: Dropout,
}

impl BertEmbeddings {
    /// Build every table from `weights`. Fails if a key is missing or a shape
    /// disagrees with `config`.
    pub fn load(config: Config, weights: &WeightMap) -> EmbeddingResult<Self> {
        config.validate()?;
        let hidden = config.hidden_size;

        let word_embeddings = Embedding::new(
            "word",
            weights.matrix(WORD_EMBEDDINGS, config.vocab_size, hidden)?,
            Some(config.pad_token_id),
        );
        let position_embeddings = Embedding::new(
            "position",
            weights.matrix(POSITION_EMBEDDINGS, config.max_position_embeddings, hidden)?,
            None,
        );
        let token_type_embeddings = Embedding::new(
            "token_type",
            weights.matrix(TOKEN_TYPE_EMBEDDINGS, config.type_vocab_size, hidden)?,
            None,
        );
        for table in [&word_embeddings, &position_embeddings, &token_type_embeddings] {
            debug!(
                table = table.name(),
                rows = table.table_size(),
                hidden,
                padding_idx = ?table.padding_idx(),
                "built embedding table"
            );
        }

        let layer_norm = LayerNorm::new(
            weights.vector(LAYER_NORM_GAMMA, hidden)?,
            weights.vector(LAYER_NORM_BETA, hidden)?,
            config.layer_norm_eps,
        )?
        .with_activation(Activation::GeluTanh {
            alpha: config.gelu_alpha,
            beta: config.gelu_beta,
        });

        let dropout = Dropout::new(config.hidden_dropout_prob, config.dropout_seed);
        debug!(
            eps = config.layer_norm_eps,
            dropout = config.hidden_dropout_prob,
            "built embedding layer norm and dropout"
        );

        Ok(Self {
            config,
            word_embeddings,
            position_embeddings,
            token_type_embeddings,
            layer_norm,
            dropout,
        })
    }

    /// Replace the Training-phase dropout mask source.
    pub fn with_mask_strategy(mut self, strategy: Arc<dyn MaskStrategy>) -> Self {
        self.dropout = self.dropout.with_strategy(strategy);
        self
    }

    /// `[max_position_embeddings, hidden_size]`, the shape of every `embed` result.
    pub fn output_shape(&self) -> [usize; 2] {
        [self.config.max_position_embeddings, self.config.hidden_size]
    }

    pub fn word_embeddings(&self) -> &Embedding {
        &self.word_embeddings
    }

    pub fn position_embeddings(&self) -> &Embedding {
        &self.position_embeddings
    }

    pub fn token_type_embeddings(&self) -> &Embedding {
        &self.token_type_embeddings
    }

    pub fn layer_norm(&self) -> &LayerNorm {
        &self.layer_norm
    }

    pub fn dropout(&self) -> &Dropout {
        &self.dropout
    }

    /// Embed one sequence.
    ///
    /// The result is always `[max_position_embeddings, hidden_size]`: ids are
    /// right-padded with `pad_token_id` and the output is NOT truncated back
    /// to `input_ids.len()`. Rows past the input hold the padding embedding
    /// (zero word vector + position 0 + token type 0); callers that want only
    /// the real positions slice the first `input_ids.len()` rows themselves.
    ///
    /// - `position_ids` defaults to `0..input_ids.len()`, then padded.
    /// - `token_type_ids` defaults to all zeros; shorter inputs are padded with 0.
    pub fn embed(
        &self,
        input_ids: &[i64],
        token_type_ids: Option<&[i64]>,
        position_ids: Option<&[i64]>,
        phase: Phase,
    ) -> EmbeddingResult<Tensor2> {
        let max_len = self.config.max_position_embeddings;
        let pad = self.config.pad_token_id as i64;
        trace!(len = input_ids.len(), ?phase, "embedding sequence");

        let word_ids = pad_ids(input_ids, max_len, pad)?;
        let position_ids = match position_ids {
            Some(ids) => pad_ids(ids, max_len, pad)?,
            None => pad_ids(&(0..input_ids.len() as i64).collect::<Vec<_>>(), max_len, pad)?,
        };
        let token_type_ids = match token_type_ids {
            Some(ids) => pad_ids(ids, max_len, 0)?,
            None => vec![0; max_len],
        };

        let words = self.word_embeddings.forward(&word_ids)?;
        let positions = self.position_embeddings.forward(&position_ids)?;
        let token_types = self.token_type_embeddings.forward(&token_type_ids)?;

        let sum = kernels::broadcast_add(&words.view(), &positions.view())?;
        let sum = kernels::broadcast_add(&sum.view(), &token_types.view())?;

        match phase {
            Phase::Inference => Ok(sum),
            Phase::Training => {
                let normed = self.layer_norm.forward(&sum)?;
                self.dropout.forward(normed)
            }
        }
    }
}

/// Right-pad `ids` to `len` with `pad`.
fn pad_ids(ids: &[i64], len: usize, pad: i64) -> EmbeddingResult<Vec<i64>> {
    if ids.len() > len {
        return Err(EmbeddingError::SequenceTooLong {
            len: ids.len(),
            max: len,
        });
    }
    let mut padded = Vec::with_capacity(len);
    padded.extend_from_slice(ids);
    padded.resize(len, pad);
    Ok(padded)
}
