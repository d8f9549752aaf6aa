// autoencoder.rs
// Purpose: MLP encoder/decoder trained to reconstruct its input

use super::feedforward::FeedForward;
use candle_core::{Module, Tensor};
use candle_nn::VarBuilder;

pub struct Autoencoder {
    encoder: FeedForward,
    decoder: FeedForward,
}

impl Autoencoder {
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        latent_dim: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            encoder: FeedForward::new(&[input_dim, hidden_dim, latent_dim], vb.pp("encoder"))?,
            decoder: FeedForward::new(&[latent_dim, hidden_dim, input_dim], vb.pp("decoder"))?,
        })
    }

    pub fn encode(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.encoder.forward(xs)
    }

    pub fn decode(&self, latent: &Tensor) -> candle_core::Result<Tensor> {
        self.decoder.forward(latent)
    }

    /// Mean squared error between the input and its reconstruction.
    pub fn reconstruction_loss(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        candle_nn::loss::mse(&self.forward(xs)?, xs)
    }
}

impl Module for Autoencoder {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.decode(&self.encode(xs)?)
    }
}
