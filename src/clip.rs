//! Image/text similarity scoring.
//!
//! [`DualEncoder`] is a compact CLIP-style model built in-crate (trainable,
//! randomly initialised); [`PretrainedClip`] wraps candle-transformers' CLIP
//! for released ViT-B/32 weights. Both expose the same [`ImageTextScorer`]
//! interface: per-caption logits, cosine similarity scaled by the learned
//! temperature.

use crate::errors::{RaftError, RaftResult};
use crate::params;
use crate::tokenizer::TextTokenizer;
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Conv2d, Conv2dConfig, Embedding, Init, Linear, VarBuilder, VarMap};
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use std::cmp::Ordering;
use std::path::Path;
use tokenizers::Tokenizer;

/// Initial CLIP temperature, ln(1 / 0.07).
const LOGIT_SCALE_INIT: f64 = 2.659_260_036_932_778;

pub trait ImageTextScorer {
    /// Scaled similarity between one `(3, H, W)` image and each caption.
    fn logits(&self, image: &Tensor, captions: &[String]) -> RaftResult<Vec<f32>>;

    fn similarity(&self, image: &Tensor, caption: &str) -> RaftResult<f32> {
        self.logits(image, &[caption.to_string()])?
            .first()
            .copied()
            .ok_or_else(|| RaftError::internal("no similarity returned"))
    }

    /// Softmax over the captions, most probable first.
    fn rank_captions(&self, image: &Tensor, captions: &[String]) -> RaftResult<Vec<(String, f32)>> {
        let logits = self.logits(image, captions)?;
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exp.iter().sum();

        let mut ranked: Vec<(String, f32)> = captions
            .iter()
            .cloned()
            .zip(exp.into_iter().map(|e| e / total))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(ranked)
    }
}

fn check_inputs(image: &Tensor, captions: &[String]) -> RaftResult<()> {
    if captions.is_empty() {
        return Err(RaftError::validation("captions", "at least one caption is required"));
    }
    match image.dims() {
        [3, h, w] if *h > 0 && *w > 0 => Ok(()),
        dims => Err(RaftError::validation(
            "image",
            format!("expected a (3, H, W) tensor, got {dims:?}"),
        )),
    }
}

fn l2_normalize(x: &Tensor) -> candle_core::Result<Tensor> {
    let norm = x.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
    x.broadcast_div(&norm)
}

/// Read a `(3, H, W)` float image stored with numpy's `.npy` format.
pub fn load_image_npy(path: &Path, device: &Device) -> RaftResult<Tensor> {
    if !path.exists() {
        return Err(RaftError::not_found("image", path.display().to_string()));
    }
    let image = Tensor::read_npy(path)
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_device(device))
        .map_err(|e| RaftError::tensor(format!("reading {}", path.display()), e))?;
    Ok(image)
}

#[derive(Debug, Clone, Copy)]
pub struct DualEncoderConfig {
    pub channels: usize,
    pub embed_dim: usize,
    pub projection_dim: usize,
}

impl Default for DualEncoderConfig {
    fn default() -> Self {
        Self {
            channels: 16,
            embed_dim: 32,
            projection_dim: 32,
        }
    }
}

/// Convolutional image tower and bag-of-words text tower projected into a
/// shared space.
pub struct DualEncoder {
    varmap: VarMap,
    conv1: Conv2d,
    conv2: Conv2d,
    image_proj: Linear,
    embedding: Embedding,
    text_proj: Linear,
    logit_scale: Tensor,
    tokenizer: TextTokenizer,
    device: Device,
}

impl DualEncoder {
    pub fn new(
        tokenizer: TextTokenizer,
        config: DualEncoderConfig,
        device: Device,
        seed: u64,
    ) -> RaftResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let build = || -> candle_core::Result<_> {
            Ok((
                candle_nn::conv2d(3, config.channels, 3, conv_cfg, vb.pp("image.conv1"))?,
                candle_nn::conv2d(config.channels, config.channels * 2, 3, conv_cfg, vb.pp("image.conv2"))?,
                candle_nn::linear(config.channels * 2, config.projection_dim, vb.pp("image.proj"))?,
                candle_nn::embedding(tokenizer.vocab_size(), config.embed_dim, vb.pp("text.embedding"))?,
                candle_nn::linear(config.embed_dim, config.projection_dim, vb.pp("text.proj"))?,
            ))
        };
        let (conv1, conv2, image_proj, embedding, text_proj) =
            build().map_err(|e| RaftError::tensor("building dual encoder", e))?;
        params::seed_parameters(&varmap, seed)?;

        // Registered after seeding so the temperature keeps its CLIP init.
        let logit_scale = vb
            .get_with_hints(1, "logit_scale", Init::Const(LOGIT_SCALE_INIT))
            .map_err(|e| RaftError::tensor("building dual encoder", e))?;

        Ok(Self {
            varmap,
            conv1,
            conv2,
            image_proj,
            embedding,
            text_proj,
            logit_scale,
            tokenizer,
            device,
        })
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// `(batch, 3, H, W)` images to normalised `(batch, projection)` features.
    pub fn image_features(&self, images: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.conv1.forward(images)?.relu()?;
        let x = x.max_pool2d(2)?;
        let x = self.conv2.forward(&x)?.relu()?;
        let pooled = x.flatten_from(2)?.mean(2)?;
        l2_normalize(&self.image_proj.forward(&pooled)?)
    }

    pub fn text_features(&self, captions: &[String]) -> RaftResult<Tensor> {
        let (ids, mask) = self.tokenizer.batch(captions, &self.device)?;
        let embedded = self.embedding.forward(&ids)?;
        let summed = embedded.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
        let pooled = summed.broadcast_div(&mask.sum_keepdim(1)?)?;
        Ok(l2_normalize(&self.text_proj.forward(&pooled)?)?)
    }
}

impl ImageTextScorer for DualEncoder {
    fn logits(&self, image: &Tensor, captions: &[String]) -> RaftResult<Vec<f32>> {
        check_inputs(image, captions)?;
        let image = image.to_device(&self.device)?.unsqueeze(0)?;
        let image_features = self.image_features(&image)?;
        let text_features = self.text_features(captions)?;
        let scale = self.logit_scale.exp()?;
        let logits = image_features
            .matmul(&text_features.t()?)?
            .broadcast_mul(&scale)?
            .squeeze(0)?;
        Ok(logits.to_vec1::<f32>()?)
    }
}

/// Released CLIP ViT-B/32 weights through candle-transformers.
pub struct PretrainedClip {
    model: ClipModel,
    tokenizer: Tokenizer,
    image_size: usize,
    device: Device,
}

impl PretrainedClip {
    pub fn load(weights: &Path, tokenizer: &Path, device: Device) -> RaftResult<Self> {
        for (what, path) in [("clip weights", weights), ("clip tokenizer", tokenizer)] {
            if !path.exists() {
                return Err(RaftError::not_found(what, path.display().to_string()));
            }
        }
        let tensors = candle_core::safetensors::load(weights, &device)
            .map_err(|e| RaftError::tensor(format!("reading {}", weights.display()), e))?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let config = ClipConfig::vit_base_patch32();
        let model = ClipModel::new(vb, &config)
            .map_err(|e| RaftError::tensor("building CLIP model", e))?;
        let tokenizer = Tokenizer::from_file(tokenizer)
            .map_err(|e| RaftError::tokenizer(format!("{}: {e}", tokenizer.display())))?;

        Ok(Self {
            model,
            tokenizer,
            image_size: config.image_size,
            device,
        })
    }

    /// Token ids padded with the end-of-text token, as CLIP expects.
    fn tokenize(&self, captions: &[String]) -> RaftResult<Tensor> {
        let pad_id = self
            .tokenizer
            .token_to_id("<|endoftext|>")
            .ok_or_else(|| RaftError::tokenizer("CLIP vocabulary lacks <|endoftext|>"))?;

        let mut rows = Vec::with_capacity(captions.len());
        for caption in captions {
            let encoding = self
                .tokenizer
                .encode(caption.as_str(), true)
                .map_err(|e| RaftError::tokenizer(format!("encode failed: {e}")))?;
            rows.push(encoding.get_ids().to_vec());
        }
        let max_len = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(max_len, pad_id);
                Tensor::new(row.as_slice(), &self.device)
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Tensor::stack(&rows, 0)?)
    }
}

impl ImageTextScorer for PretrainedClip {
    fn logits(&self, image: &Tensor, captions: &[String]) -> RaftResult<Vec<f32>> {
        check_inputs(image, captions)?;
        let (_, h, w) = image.dims3()?;
        if h != self.image_size || w != self.image_size {
            return Err(RaftError::validation(
                "image",
                format!("CLIP expects {0}x{0} pixels, got {h}x{w}", self.image_size),
            ));
        }
        let pixels = image.to_device(&self.device)?.unsqueeze(0)?;
        let input_ids = self.tokenize(captions)?;
        let (_, logits_per_image) = self.model.forward(&pixels, &input_ids)?;
        Ok(logits_per_image.squeeze(0)?.to_vec1::<f32>()?)
    }
}
