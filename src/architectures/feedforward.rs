// feedforward.rs
// Purpose: Fully connected network with ReLU between hidden layers

use candle_core::{Module, Tensor};
use candle_nn::{Linear, VarBuilder};

pub struct FeedForward {
    layers: Vec<Linear>,
}

impl FeedForward {
    /// `widths` lists every layer size, input first and output last.
    pub fn new(widths: &[usize], vb: VarBuilder) -> candle_core::Result<Self> {
        if widths.len() < 2 {
            candle_core::bail!("a feedforward network needs an input and an output width");
        }
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, pair)| candle_nn::linear(pair[0], pair[1], vb.pp(format!("layer{i}"))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { layers })
    }
}

impl Module for FeedForward {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut x = xs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if i < last {
                x = x.relu()?;
            }
        }
        Ok(x)
    }
}
