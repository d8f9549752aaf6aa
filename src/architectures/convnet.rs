// convnet.rs
// Purpose: Two conv/pool stages and a linear classifier for 28x28 images

use candle_core::{Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder};

pub const IMAGE_SIZE: usize = 28;
const CHANNELS: [usize; 2] = [8, 16];

pub struct ConvNet {
    conv1: Conv2d,
    conv2: Conv2d,
    classifier: Linear,
}

impl ConvNet {
    pub fn new(in_channels: usize, classes: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let same = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        // Each pool halves the side: 28 -> 14 -> 7.
        let side = IMAGE_SIZE / 4;
        Ok(Self {
            conv1: candle_nn::conv2d(in_channels, CHANNELS[0], 3, same, vb.pp("conv1"))?,
            conv2: candle_nn::conv2d(CHANNELS[0], CHANNELS[1], 3, same, vb.pp("conv2"))?,
            classifier: candle_nn::linear(CHANNELS[1] * side * side, classes, vb.pp("classifier"))?,
        })
    }
}

impl Module for ConvNet {
    /// `(batch, channels, 28, 28)` to `(batch, classes)` logits.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.conv1.forward(xs)?.relu()?.max_pool2d(2)?;
        let x = self.conv2.forward(&x)?.relu()?.max_pool2d(2)?;
        self.classifier.forward(&x.flatten_from(1)?)
    }
}
