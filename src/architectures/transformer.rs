//! Transformer encoder: multi-head self-attention and a GELU feedforward block,
//! each wrapped in a residual connection followed by layer normalisation.

use candle_core::{Module, Tensor, D};
use candle_nn::{LayerNorm, Linear, VarBuilder};

#[derive(Debug, Clone, Copy)]
pub struct TransformerConfig {
    pub d_model: usize,
    pub num_heads: usize,
    pub ff_dim: usize,
    pub num_layers: usize,
    pub layer_norm_eps: f64,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            d_model: 16,
            num_heads: 4,
            ff_dim: 32,
            num_layers: 2,
            layer_norm_eps: 1e-5,
        }
    }
}

pub struct MultiHeadAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    num_heads: usize,
    head_dim: usize,
}

impl MultiHeadAttention {
    pub fn new(d_model: usize, num_heads: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        if num_heads == 0 || d_model % num_heads != 0 {
            candle_core::bail!("d_model {d_model} is not divisible into {num_heads} heads");
        }
        Ok(Self {
            query: candle_nn::linear(d_model, d_model, vb.pp("query"))?,
            key: candle_nn::linear(d_model, d_model, vb.pp("key"))?,
            value: candle_nn::linear(d_model, d_model, vb.pp("value"))?,
            output: candle_nn::linear(d_model, d_model, vb.pp("output"))?,
            num_heads,
            head_dim: d_model / num_heads,
        })
    }

    /// `(batch, seq, d_model)` to `(batch, heads, seq, head_dim)`.
    fn split_heads(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, seq_len, _) = x.dims3()?;
        x.reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    /// Softmax attention weights, `(batch, heads, seq, seq)`.
    pub fn attention_weights(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let q = self.split_heads(&self.query.forward(xs)?)?;
        let k = self.split_heads(&self.key.forward(xs)?)?;
        let scores = q.matmul(&k.t()?)?;
        let scores = (scores / (self.head_dim as f64).sqrt())?;
        candle_nn::ops::softmax(&scores, D::Minus1)
    }
}

impl Module for MultiHeadAttention {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, seq_len, d_model) = xs.dims3()?;
        let weights = self.attention_weights(xs)?;
        let v = self.split_heads(&self.value.forward(xs)?)?;
        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, d_model))?;
        self.output.forward(&context)
    }
}

pub struct EncoderLayer {
    attention: MultiHeadAttention,
    norm1: LayerNorm,
    ff_in: Linear,
    ff_out: Linear,
    norm2: LayerNorm,
}

impl EncoderLayer {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            attention: MultiHeadAttention::new(config.d_model, config.num_heads, vb.pp("attention"))?,
            norm1: candle_nn::layer_norm(config.d_model, config.layer_norm_eps, vb.pp("norm1"))?,
            ff_in: candle_nn::linear(config.d_model, config.ff_dim, vb.pp("ff_in"))?,
            ff_out: candle_nn::linear(config.ff_dim, config.d_model, vb.pp("ff_out"))?,
            norm2: candle_nn::layer_norm(config.d_model, config.layer_norm_eps, vb.pp("norm2"))?,
        })
    }
}

impl Module for EncoderLayer {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let attended = (xs + self.attention.forward(xs)?)?;
        let x = self.norm1.forward(&attended)?;
        let ff = self.ff_out.forward(&self.ff_in.forward(&x)?.gelu()?)?;
        self.norm2.forward(&(x + ff)?)
    }
}

/// Stack of encoder layers; shape-preserving over `(batch, seq, d_model)`.
pub struct TransformerEncoder {
    layers: Vec<EncoderLayer>,
}

impl TransformerEncoder {
    pub fn new(config: TransformerConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let layers = (0..config.num_layers)
            .map(|i| EncoderLayer::new(&config, vb.pp(format!("layer{i}"))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { layers })
    }
}

impl Module for TransformerEncoder {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut x = xs.clone();
        for layer in &self.layers {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }
}
