//! Dropout with a pluggable, seed-reproducible mask.

use crate::error::EmbeddingResult;
use crate::kernels;
use crate::tensor::Tensor2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::Arc;

/// Source of dropout keep masks.
///
/// Implementations must be deterministic in `(len, rate, seed)` so a
/// Training-phase call can be replayed.
pub trait MaskStrategy: Send + Sync + fmt::Debug {
    /// One keep flag per element, row-major.
    fn keep_mask(&self, len: usize, rate: f32, seed: u64) -> Vec<bool>;
}

/// Bernoulli mask from a ChaCha8 stream.
///
/// Draws one uniform `f32` in `[0, 1)` per element and drops the element when
/// the draw is below `rate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaChaBernoulli;

impl MaskStrategy for ChaChaBernoulli {
    fn keep_mask(&self, len: usize, rate: f32, seed: u64) -> Vec<bool> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen::<f32>() >= rate).collect()
    }
}

/// Inverted dropout at a fixed rate.
#[derive(Clone)]
pub struct Dropout {
    pub rate: f32,
    pub seed: u64,
    strategy: Arc<dyn MaskStrategy>,
}

impl Dropout {
    pub fn new(rate: f32, seed: u64) -> Self {
        Self {
            rate,
            seed,
            strategy: Arc::new(ChaChaBernoulli),
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn MaskStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> &dyn MaskStrategy {
        self.strategy.as_ref()
    }

    /// Forward pass. Rate 0 returns `x` untouched without drawing a mask.
    ///
    /// Fails if the strategy returns a mask whose length differs from `x`.
    pub fn forward(&self, mut x: Tensor2) -> EmbeddingResult<Tensor2> {
        if self.rate <= 0.0 {
            return Ok(x);
        }
        let keep = self.strategy.keep_mask(x.len(), self.rate, self.seed);
        kernels::apply_dropout_mask(&mut x, &keep, self.rate)?;
        Ok(x)
    }
}

impl fmt::Debug for Dropout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dropout")
            .field("rate", &self.rate)
            .field("seed", &self.seed)
            .field("strategy", &self.strategy)
            .finish()
    }
}
