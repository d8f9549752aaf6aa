//! Reward scorer: a small sequence classifier whose positive-class
//! probability is used as the preference score of a text.

use crate::checkpoint::{self, CheckpointManifest, ModelKind, TOKENIZER_FILE};
use crate::config::RewardSettings;
use crate::dataset::PreferenceExample;
use crate::errors::{RaftError, RaftResult};
use crate::params;
use crate::ranker::Scorer;
use crate::tokenizer::TextTokenizer;
use candle_core::{DType, Device, IndexOp, Module, Tensor, D};
use candle_nn::{AdamW, Embedding, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use std::path::Path;
use tracing::{debug, info};

const NUM_LABELS: usize = 2;
const POSITIVE_LABEL: usize = 1;

/// Embedding, masked mean pooling, then a two-layer head producing one logit
/// per label.
pub struct SequenceClassifier {
    embedding: Embedding,
    hidden: Linear,
    head: Linear,
}

impl SequenceClassifier {
    pub fn new(
        vocab_size: usize,
        embed_dim: usize,
        hidden_dim: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            embedding: candle_nn::embedding(vocab_size, embed_dim, vb.pp("embedding"))?,
            hidden: candle_nn::linear(embed_dim, hidden_dim, vb.pp("hidden"))?,
            head: candle_nn::linear(hidden_dim, NUM_LABELS, vb.pp("head"))?,
        })
    }

    /// `ids` and `mask` are `(batch, seq)`; returns `(batch, 2)` logits.
    pub fn forward(&self, ids: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
        let embedded = self.embedding.forward(ids)?;
        let summed = embedded.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
        let counts = mask.sum_keepdim(1)?;
        let pooled = summed.broadcast_div(&counts)?;
        let hidden = self.hidden.forward(&pooled)?.relu()?;
        self.head.forward(&hidden)
    }
}

pub struct RewardModel {
    varmap: VarMap,
    classifier: SequenceClassifier,
    tokenizer: TextTokenizer,
    settings: RewardSettings,
    device: Device,
}

impl RewardModel {
    /// Fresh classifier with seeded weights.
    pub fn new(
        tokenizer: TextTokenizer,
        settings: RewardSettings,
        device: Device,
        seed: u64,
    ) -> RaftResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let classifier = SequenceClassifier::new(
            tokenizer.vocab_size(),
            settings.embed_dim,
            settings.hidden_dim,
            vb,
        )
        .map_err(|e| RaftError::tensor("building reward classifier", e))?;
        params::seed_parameters(&varmap, seed)?;

        Ok(Self {
            varmap,
            classifier,
            tokenizer,
            settings,
            device,
        })
    }

    pub fn tokenizer(&self) -> &TextTokenizer {
        &self.tokenizer
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    fn logits<S: AsRef<str>>(&self, texts: &[S]) -> RaftResult<Tensor> {
        let (ids, mask) = self.tokenizer.batch(texts, &self.device)?;
        self.classifier
            .forward(&ids, &mask)
            .map_err(|e| RaftError::tensor("reward forward pass", e))
    }

    /// Positive-class probability for every text, in input order.
    pub fn score_batch<S: AsRef<str>>(&self, texts: &[S]) -> RaftResult<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let logits = self.logits(texts)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        Ok(probs.i((.., POSITIVE_LABEL))?.to_vec1::<f32>()?)
    }

    /// Preference score in `[0, 1]`. Pure in `(text, weights)`.
    pub fn score(&self, text: &str) -> RaftResult<f32> {
        let scores = self.score_batch(&[text])?;
        scores
            .first()
            .copied()
            .ok_or_else(|| RaftError::internal("reward model returned no score"))
    }

    /// Full-batch cross-entropy training. Returns the loss of every epoch,
    /// measured before that epoch's optimizer step.
    pub fn train(&mut self, examples: &[PreferenceExample], epochs: usize) -> RaftResult<Vec<f32>> {
        if examples.is_empty() {
            return Err(RaftError::validation("examples", "cannot train on an empty dataset"));
        }
        if let Some(bad) = examples.iter().find(|e| e.label as usize >= NUM_LABELS) {
            return Err(RaftError::validation(
                "label",
                format!("expected 0 or 1, got {}", bad.label),
            ));
        }

        let texts: Vec<String> = examples.iter().map(PreferenceExample::text).collect();
        let labels: Vec<u32> = examples.iter().map(|e| e.label).collect();
        let (ids, mask) = self.tokenizer.batch(&texts, &self.device)?;
        let labels = Tensor::new(labels.as_slice(), &self.device)?;

        let mut optimizer = AdamW::new(
            self.varmap.all_vars(),
            ParamsAdamW {
                lr: self.settings.learning_rate,
                ..Default::default()
            },
        )?;

        let mut losses = Vec::with_capacity(epochs);
        for epoch in 1..=epochs {
            let logits = self.classifier.forward(&ids, &mask)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &labels)?;
            let loss_value = loss.to_scalar::<f32>()?;
            optimizer.backward_step(&loss)?;
            debug!(epoch, loss = loss_value, "reward classifier epoch");
            losses.push(loss_value);
        }

        if let Some(last) = losses.last() {
            info!(epochs, final_loss = *last, "Reward classifier trained");
        }
        Ok(losses)
    }

    fn manifest(&self) -> CheckpointManifest {
        CheckpointManifest::new(
            ModelKind::RewardClassifier,
            self.tokenizer.vocab_size(),
            self.settings.embed_dim,
            self.settings.hidden_dim,
        )
    }

    pub fn save(&self, dir: &Path) -> RaftResult<CheckpointManifest> {
        let manifest = checkpoint::save(&self.varmap, dir, self.manifest())?;
        self.tokenizer.save(dir.join(TOKENIZER_FILE))?;
        Ok(manifest)
    }

    /// Rebuild a classifier from a checkpoint directory. Dimensions come
    /// from the manifest; optimisation settings from `settings`.
    pub fn load(dir: &Path, settings: RewardSettings, device: Device) -> RaftResult<Self> {
        let manifest = checkpoint::read_manifest(dir)?;
        if manifest.kind != ModelKind::RewardClassifier {
            return Err(RaftError::checkpoint(
                dir.display().to_string(),
                format!("expected a reward classifier, found {:?}", manifest.kind),
            ));
        }
        let tokenizer = TextTokenizer::from_file(dir.join(TOKENIZER_FILE))?;
        let settings = RewardSettings {
            embed_dim: manifest.embed_dim,
            hidden_dim: manifest.hidden_dim,
            ..settings
        };
        let mut model = Self::new(tokenizer, settings, device, 0)?;
        checkpoint::load(&mut model.varmap, dir)?;
        Ok(model)
    }
}

impl Scorer for RewardModel {
    fn score(&self, text: &str) -> RaftResult<f32> {
        RewardModel::score(self, text)
    }

    fn score_batch(&self, texts: &[String]) -> RaftResult<Vec<f32>> {
        RewardModel::score_batch(self, texts)
    }
}
