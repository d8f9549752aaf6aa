//! A tour of common network architectures assembled from candle layers.
//!
//! Each submodule defines one model; [`demo`] builds it with seeded weights,
//! pushes a random batch through it and, where a loss makes sense, takes a
//! few optimisation steps so the tutorial shows a working training signal.

pub mod autoencoder;
pub mod convnet;
pub mod feedforward;
pub mod gan;
pub mod recurrent;
pub mod transformer;

use crate::errors::{RaftError, RaftResult};
use crate::params;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchitectureKind {
    FeedForward,
    Convolutional,
    Recurrent,
    Lstm,
    Transformer,
    Autoencoder,
    Gan,
}

impl ArchitectureKind {
    pub fn all() -> [ArchitectureKind; 7] {
        [
            ArchitectureKind::FeedForward,
            ArchitectureKind::Convolutional,
            ArchitectureKind::Recurrent,
            ArchitectureKind::Lstm,
            ArchitectureKind::Transformer,
            ArchitectureKind::Autoencoder,
            ArchitectureKind::Gan,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArchitectureKind::FeedForward => "feedforward",
            ArchitectureKind::Convolutional => "convolutional",
            ArchitectureKind::Recurrent => "recurrent",
            ArchitectureKind::Lstm => "lstm",
            ArchitectureKind::Transformer => "transformer",
            ArchitectureKind::Autoencoder => "autoencoder",
            ArchitectureKind::Gan => "gan",
        }
    }
}

impl fmt::Display for ArchitectureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArchitectureKind {
    type Err = RaftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let alias = match wanted.as_str() {
            "mlp" | "ffn" => "feedforward",
            "cnn" | "conv" => "convolutional",
            "rnn" => "recurrent",
            other => other,
        };
        ArchitectureKind::all()
            .into_iter()
            .find(|k| k.name() == alias)
            .ok_or_else(|| RaftError::validation("architecture", format!("unknown kind '{s}'")))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchitectureReport {
    pub kind: ArchitectureKind,
    pub parameters: usize,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    /// Losses of the demo training steps, empty when the demo only runs inference.
    pub losses: Vec<f32>,
}

/// Uniform(-1, 1) tensor from a seeded generator.
pub fn random_tensor(shape: &[usize], rng: &mut StdRng, device: &Device) -> RaftResult<Tensor> {
    let count: usize = shape.iter().product();
    let values: Vec<f32> = (0..count).map(|_| rng.random_range(-1.0f32..1.0)).collect();
    Ok(Tensor::from_vec(values, shape, device)?)
}

fn random_labels(batch: usize, classes: usize, rng: &mut StdRng, device: &Device) -> RaftResult<Tensor> {
    let labels: Vec<u32> = (0..batch).map(|_| rng.random_range(0..classes as u32)).collect();
    Ok(Tensor::new(labels.as_slice(), device)?)
}

fn new_varmap(device: &Device) -> (VarMap, VarBuilder<'static>) {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    (varmap, vb)
}

fn adamw(varmap: &VarMap, lr: f64) -> RaftResult<AdamW> {
    Ok(AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr,
            ..Default::default()
        },
    )?)
}

/// Classifier demo shared by the supervised architectures: forward, then a few
/// cross-entropy steps against random labels.
fn classify_demo<M: Module>(
    kind: ArchitectureKind,
    model: &M,
    varmap: &VarMap,
    input: &Tensor,
    classes: usize,
    steps: usize,
    rng: &mut StdRng,
) -> RaftResult<ArchitectureReport> {
    let output = model.forward(input)?;
    let labels = random_labels(input.dims()[0], classes, rng, input.device())?;
    let mut optimizer = adamw(varmap, 1e-2)?;
    let mut losses = Vec::with_capacity(steps);
    for _ in 0..steps {
        let logits = model.forward(input)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &labels)?;
        losses.push(loss.to_scalar::<f32>()?);
        optimizer.backward_step(&loss)?;
    }
    Ok(ArchitectureReport {
        kind,
        parameters: params::parameter_count(varmap)?,
        input_shape: input.dims().to_vec(),
        output_shape: output.dims().to_vec(),
        losses,
    })
}

const DEMO_STEPS: usize = 3;

/// Build, run and briefly train one architecture on random data.
pub fn demo(kind: ArchitectureKind, device: &Device, seed: u64) -> RaftResult<ArchitectureReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (varmap, vb) = new_varmap(device);
    let report = match kind {
        ArchitectureKind::FeedForward => {
            let model = feedforward::FeedForward::new(&[16, 32, 3], vb)?;
            params::seed_parameters(&varmap, seed)?;
            let input = random_tensor(&[4, 16], &mut rng, device)?;
            classify_demo(kind, &model, &varmap, &input, 3, DEMO_STEPS, &mut rng)?
        }
        ArchitectureKind::Convolutional => {
            let model = convnet::ConvNet::new(1, 10, vb)?;
            params::seed_parameters(&varmap, seed)?;
            let input = random_tensor(&[2, 1, 28, 28], &mut rng, device)?;
            classify_demo(kind, &model, &varmap, &input, 10, DEMO_STEPS, &mut rng)?
        }
        ArchitectureKind::Recurrent => {
            let model = recurrent::SimpleRnn::new(8, 16, 2, vb)?;
            params::seed_parameters(&varmap, seed)?;
            let input = random_tensor(&[2, 5, 8], &mut rng, device)?;
            classify_demo(kind, &model, &varmap, &input, 2, DEMO_STEPS, &mut rng)?
        }
        ArchitectureKind::Lstm => {
            let model = recurrent::LstmClassifier::new(8, 16, 2, vb)?;
            params::seed_parameters(&varmap, seed)?;
            let input = random_tensor(&[2, 5, 8], &mut rng, device)?;
            classify_demo(kind, &model, &varmap, &input, 2, DEMO_STEPS, &mut rng)?
        }
        ArchitectureKind::Transformer => {
            let model = transformer::TransformerEncoder::new(
                transformer::TransformerConfig::default(),
                vb,
            )?;
            params::seed_parameters(&varmap, seed)?;
            let input = random_tensor(&[2, 6, 16], &mut rng, device)?;
            let output = model.forward(&input)?;
            ArchitectureReport {
                kind,
                parameters: params::parameter_count(&varmap)?,
                input_shape: input.dims().to_vec(),
                output_shape: output.dims().to_vec(),
                losses: Vec::new(),
            }
        }
        ArchitectureKind::Autoencoder => {
            let model = autoencoder::Autoencoder::new(16, 8, 4, vb)?;
            params::seed_parameters(&varmap, seed)?;
            let input = random_tensor(&[4, 16], &mut rng, device)?;
            let output = model.forward(&input)?;
            let mut optimizer = adamw(&varmap, 1e-2)?;
            let mut losses = Vec::with_capacity(DEMO_STEPS);
            for _ in 0..DEMO_STEPS {
                let loss = model.reconstruction_loss(&input)?;
                losses.push(loss.to_scalar::<f32>()?);
                optimizer.backward_step(&loss)?;
            }
            ArchitectureReport {
                kind,
                parameters: params::parameter_count(&varmap)?,
                input_shape: input.dims().to_vec(),
                output_shape: output.dims().to_vec(),
                losses,
            }
        }
        // Two networks with their own parameters and optimizers.
        ArchitectureKind::Gan => return gan_demo(device, seed, &mut rng),
    };
    tracing::debug!(kind = %report.kind, parameters = report.parameters, "architecture demo");
    Ok(report)
}

/// Alternating discriminator/generator steps; losses are recorded in that order.
fn gan_demo(device: &Device, seed: u64, rng: &mut StdRng) -> RaftResult<ArchitectureReport> {
    const BATCH: usize = 8;
    let config = gan::GanConfig::default();
    let mut gan = gan::Gan::new(config, device, seed)?;
    let real = random_tensor(&[BATCH, config.data_dim], rng, device)?;

    let mut losses = Vec::with_capacity(DEMO_STEPS * 2);
    let mut generated_shape = Vec::new();
    for _ in 0..DEMO_STEPS {
        let noise = random_tensor(&[BATCH, config.latent_dim], rng, device)?;
        let step = gan.train_step(&real, &noise)?;
        losses.push(step.discriminator_loss);
        losses.push(step.generator_loss);
        generated_shape = step.generated_shape;
    }
    let report = ArchitectureReport {
        kind: ArchitectureKind::Gan,
        parameters: gan.parameter_count()?,
        input_shape: vec![BATCH, config.latent_dim],
        output_shape: generated_shape,
        losses,
    };
    tracing::debug!(kind = %report.kind, parameters = report.parameters, "architecture demo");
    Ok(report)
}
