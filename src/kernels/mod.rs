use crate::error::{EmbeddingError, EmbeddingResult};
use crate::tensor::{Tensor2, TensorView1, TensorView2};
use ndarray::{ArrayView1, ArrayViewMut1, Zip};


/// Elementwise activation fused into the layer-norm output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// Plain layer norm.
    Identity,
    /// 0.5 * x * (1 + tanh(alpha * (x + beta * x^3)))
    GeluTanh { alpha: f32, beta: f32 },
}

impl Activation {
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        match *self {
            Activation::Identity => x,
            Activation::GeluTanh { alpha, beta } => gelu_tanh(x, alpha, beta),
        }
    }
}

/// GELU, tanh approximation with explicit constants.
#[inline]
pub fn gelu_tanh(x: f32, alpha: f32, beta: f32) -> f32 {
    0.5 * x * (1.0 + (alpha * (x + beta * x * x * x)).tanh())
}

/// c = a + b over `[rows, hidden]` matrices.
///
/// Equal shapes add elementwise. A single-row operand is broadcast across
/// every row of the other. The result is always a fresh matrix.
pub fn broadcast_add(a: &TensorView2, b: &TensorView2) -> EmbeddingResult<Tensor2> {
    let (a_rows, a_cols) = a.dim();
    let (b_rows, b_cols) = b.dim();
    let incompatible = || EmbeddingError::IncompatibleShapes {
        lhs: [a_rows, a_cols],
        rhs: [b_rows, b_cols],
    };

    if a_cols != b_cols {
        return Err(incompatible());
    }

    // Larger operand first; ties keep argument order
    let (big, small) = if a_rows >= b_rows {
        (a.view(), b.view())
    } else {
        (b.view(), a.view())
    };
    if small.nrows() != big.nrows() && small.nrows() != 1 {
        return Err(incompatible());
    }

    // broadcast() only fails when shapes are incompatible, which is ruled out above
    let small = small.broadcast(big.raw_dim()).ok_or_else(incompatible)?;
    Ok(&big + &small)
}

/// Normalize one hidden vector into `out`, then apply `activation`.
fn layer_norm_row(
    x: ArrayView1<f32>,
    mut out: ArrayViewMut1<f32>,
    gamma: &TensorView1,
    beta: &TensorView1,
    eps: f32,
    activation: Activation,
) {
    // f64 accumulation keeps the mean of a constant row exact, so v - mean is 0
    let n = x.len() as f64;
    let mean = (x.iter().map(|&v| v as f64).sum::<f64>() / n) as f32;
    let var = x
        .iter()
        .map(|&v| {
            let d = (v - mean) as f64;
            d * d
        })
        .sum::<f64>()
        / n;
    let denom = (var + eps as f64).sqrt() as f32;

    Zip::from(&mut out)
        .and(&x)
        .and(gamma)
        .and(beta)
        .for_each(|o, &v, &g, &b| {
            let norm = g * (v - mean) / denom + b;
            *o = activation.apply(norm);
        });
}

/// Layer norm over the hidden axis of every row of `x`, fused with `activation`.
///
/// x: [positions, hidden], gamma/beta: [hidden] -> [positions, hidden]
pub fn layer_norm(
    x: &TensorView2,
    gamma: &TensorView1,
    beta: &TensorView1,
    eps: f32,
    activation: Activation,
) -> EmbeddingResult<Tensor2> {
    let hidden = x.ncols();
    for (name, len) in [("gamma", gamma.len()), ("beta", beta.len())] {
        if len != hidden {
            return Err(EmbeddingError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![hidden],
                actual: vec![len],
            });
        }
    }

    let mut out = Tensor2::zeros(x.raw_dim());
    let rows = Zip::from(out.rows_mut()).and(x.rows());

    #[cfg(feature = "parallel")]
    rows.par_for_each(|o, r| layer_norm_row(r, o, gamma, beta, eps, activation));

    #[cfg(not(feature = "parallel"))]
    rows.for_each(|o, r| layer_norm_row(r, o, gamma, beta, eps, activation));

    Ok(out)
}

/// Inverted dropout with a precomputed keep mask (row-major, one flag per element).
///
/// Kept elements are scaled by 1 / (1 - rate); dropped ones become zero.
pub fn apply_dropout_mask(x: &mut Tensor2, keep: &[bool], rate: f32) -> EmbeddingResult<()> {
    if keep.len() != x.len() {
        return Err(EmbeddingError::ShapeMismatch {
            name: "dropout_mask".to_string(),
            expected: vec![x.len()],
            actual: vec![keep.len()],
        });
    }
    if rate <= 0.0 {
        return Ok(());
    }
    if rate >= 1.0 {
        x.fill(0.0);
        return Ok(());
    }

    let scale = 1.0 / (1.0 - rate);
    for (v, &k) in x.iter_mut().zip(keep) {
        *v = if k { *v * scale } else { 0.0 };
    }
    Ok(())
}
