//! Generative adversarial pair on flat vectors.
//!
//! Generator and discriminator live in separate `VarMap`s with their own
//! AdamW optimizers, so each half of a training step only moves its own
//! network even though gradients flow through both.

use super::feedforward::FeedForward;
use crate::errors::{RaftError, RaftResult};
use crate::params;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use candle_nn::loss::binary_cross_entropy_with_logit;

#[derive(Debug, Clone, Copy)]
pub struct GanConfig {
    pub latent_dim: usize,
    pub hidden_dim: usize,
    pub data_dim: usize,
    pub learning_rate: f64,
}

impl Default for GanConfig {
    fn default() -> Self {
        Self {
            latent_dim: 4,
            hidden_dim: 16,
            data_dim: 8,
            learning_rate: 2e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GanStep {
    pub discriminator_loss: f32,
    pub generator_loss: f32,
    pub generated_shape: Vec<usize>,
}

pub struct Gan {
    generator_vars: VarMap,
    discriminator_vars: VarMap,
    generator: FeedForward,
    discriminator: FeedForward,
    generator_opt: AdamW,
    discriminator_opt: AdamW,
}

fn optimizer(varmap: &VarMap, lr: f64) -> candle_core::Result<AdamW> {
    AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr,
            beta1: 0.5,
            ..Default::default()
        },
    )
}

impl Gan {
    pub fn new(config: GanConfig, device: &Device, seed: u64) -> RaftResult<Self> {
        let generator_vars = VarMap::new();
        let discriminator_vars = VarMap::new();
        let gen_vb = VarBuilder::from_varmap(&generator_vars, DType::F32, device);
        let disc_vb = VarBuilder::from_varmap(&discriminator_vars, DType::F32, device);

        let generator = FeedForward::new(
            &[config.latent_dim, config.hidden_dim, config.data_dim],
            gen_vb.pp("generator"),
        )
        .map_err(|e| RaftError::tensor("building generator", e))?;
        let discriminator = FeedForward::new(
            &[config.data_dim, config.hidden_dim, 1],
            disc_vb.pp("discriminator"),
        )
        .map_err(|e| RaftError::tensor("building discriminator", e))?;
        params::seed_parameters(&generator_vars, seed)?;
        params::seed_parameters(&discriminator_vars, seed.wrapping_add(1))?;

        let generator_opt = optimizer(&generator_vars, config.learning_rate)?;
        let discriminator_opt = optimizer(&discriminator_vars, config.learning_rate)?;

        Ok(Self {
            generator_vars,
            discriminator_vars,
            generator,
            discriminator,
            generator_opt,
            discriminator_opt,
        })
    }

    pub fn parameter_count(&self) -> RaftResult<usize> {
        Ok(params::parameter_count(&self.generator_vars)?
            + params::parameter_count(&self.discriminator_vars)?)
    }

    /// `(batch, latent)` noise to `(batch, data)` samples in `(-1, 1)`.
    pub fn generate(&self, noise: &Tensor) -> RaftResult<Tensor> {
        Ok(self.generator.forward(noise)?.tanh()?)
    }

    /// Raw discriminator logits, `(batch, 1)`.
    pub fn discriminate(&self, samples: &Tensor) -> RaftResult<Tensor> {
        Ok(self.discriminator.forward(samples)?)
    }

    /// One discriminator update on real vs generated data, then one generator
    /// update towards fooling the refreshed discriminator.
    pub fn train_step(&mut self, real: &Tensor, noise: &Tensor) -> RaftResult<GanStep> {
        let batch = real.dim(0)?;
        if noise.dim(0)? != batch {
            return Err(RaftError::validation(
                "noise",
                format!("batch {} does not match real batch {batch}", noise.dim(0)?),
            ));
        }
        let ones = Tensor::ones((batch, 1), DType::F32, real.device())?;
        let zeros = Tensor::zeros((batch, 1), DType::F32, real.device())?;

        let fake = self.generate(noise)?;
        let real_loss = binary_cross_entropy_with_logit(&self.discriminate(real)?, &ones)?;
        let fake_loss = binary_cross_entropy_with_logit(&self.discriminate(&fake)?, &zeros)?;
        let discriminator_loss = (real_loss + fake_loss)?;
        self.discriminator_opt.backward_step(&discriminator_loss)?;

        let fake = self.generate(noise)?;
        let generator_loss = binary_cross_entropy_with_logit(&self.discriminate(&fake)?, &ones)?;
        self.generator_opt.backward_step(&generator_loss)?;

        Ok(GanStep {
            discriminator_loss: discriminator_loss.to_scalar::<f32>()?,
            generator_loss: generator_loss.to_scalar::<f32>()?,
            generated_shape: fake.dims().to_vec(),
        })
    }
}
