//! Candidate generation for the RAFT loop.
//!
//! [`PolicyModel`] is the generative language model that the loop fine-tunes;
//! [`PlaceholderGenerator`] returns fixed placeholder completions with no model
//! behind them.

use crate::checkpoint::{self, CheckpointManifest, ModelKind, TOKENIZER_FILE};
use crate::config::PolicySettings;
use crate::errors::{RaftError, RaftResult};
use crate::params;
use crate::tokenizer::TextTokenizer;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::rnn::{LSTMConfig, LSTMState, LSTM, RNN};
use candle_nn::{Embedding, Linear, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Produces `count` candidate completions for a prompt.
pub trait SampleGenerator {
    fn generate(&mut self, prompt: &str, count: usize) -> RaftResult<Vec<String>>;
}

/// Fixed strings standing in for real generations.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderGenerator;

impl SampleGenerator for PlaceholderGenerator {
    fn generate(&mut self, prompt: &str, count: usize) -> RaftResult<Vec<String>> {
        Ok((1..=count)
            .map(|i| format!("Sample response {i} to: {prompt}"))
            .collect())
    }
}

/// Embedding, single-layer LSTM and a vocabulary head.
pub struct LanguageModel {
    embedding: Embedding,
    lstm: LSTM,
    head: Linear,
}

impl LanguageModel {
    pub fn new(
        vocab_size: usize,
        embed_dim: usize,
        hidden_dim: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            embedding: candle_nn::embedding(vocab_size, embed_dim, vb.pp("embedding"))?,
            lstm: candle_nn::lstm(embed_dim, hidden_dim, LSTMConfig::default(), vb.pp("lstm"))?,
            head: candle_nn::linear(hidden_dim, vocab_size, vb.pp("head"))?,
        })
    }

    /// `(1, seq)` ids to `(1, seq, vocab)` next-token logits.
    pub fn forward(&self, ids: &Tensor) -> candle_core::Result<Tensor> {
        let embedded = self.embedding.forward(ids)?;
        let states = self.lstm.seq(&embedded)?;
        let hidden: Vec<Tensor> = states.iter().map(|s| s.h().clone()).collect();
        let hidden = Tensor::stack(&hidden, 1)?;
        self.head.forward(&hidden)
    }

    /// Advance the recurrent state by one token and return `(1, vocab)` logits.
    fn step(&self, id: u32, state: &LSTMState, device: &Device) -> candle_core::Result<(Tensor, LSTMState)> {
        let input = self.embedding.forward(&Tensor::new(&[id], device)?)?;
        let state = self.lstm.step(&input, state)?;
        let logits = self.head.forward(state.h())?;
        Ok((logits, state))
    }

    fn zero_state(&self) -> candle_core::Result<LSTMState> {
        self.lstm.zero_state(1)
    }
}

pub struct PolicyModel {
    varmap: VarMap,
    model: LanguageModel,
    tokenizer: TextTokenizer,
    settings: PolicySettings,
    device: Device,
    rng: StdRng,
    max_new_tokens: usize,
    temperature: f64,
}

impl PolicyModel {
    pub fn new(
        tokenizer: TextTokenizer,
        settings: PolicySettings,
        device: Device,
        seed: u64,
    ) -> RaftResult<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = LanguageModel::new(
            tokenizer.vocab_size(),
            settings.embed_dim,
            settings.hidden_dim,
            vb,
        )
        .map_err(|e| RaftError::tensor("building policy language model", e))?;
        params::seed_parameters(&varmap, seed)?;

        Ok(Self {
            varmap,
            model,
            tokenizer,
            settings,
            device,
            rng: StdRng::seed_from_u64(seed),
            max_new_tokens: 12,
            temperature: 1.0,
        })
    }

    pub fn with_sampling(mut self, max_new_tokens: usize, temperature: f64) -> Self {
        self.max_new_tokens = max_new_tokens;
        self.temperature = temperature;
        self
    }

    pub fn tokenizer(&self) -> &TextTokenizer {
        &self.tokenizer
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// `[BOS] prompt response [EOS]` ids and the length of the `[BOS] prompt` prefix.
    pub fn training_tokens(&self, prompt: &str, response: &str) -> RaftResult<(Vec<u32>, usize)> {
        let mut tokens = vec![self.tokenizer.bos_id()];
        tokens.extend(self.tokenizer.encode(prompt)?);
        let prompt_len = tokens.len();
        tokens.extend(self.tokenizer.encode(response)?);
        tokens.push(self.tokenizer.eos_id());
        Ok((tokens, prompt_len))
    }

    /// Mean next-token negative log-likelihood over the response positions.
    /// The result stays on the autograd graph.
    pub fn sequence_nll(&self, tokens: &[u32], prompt_len: usize) -> RaftResult<Tensor> {
        if tokens.len() < 2 || prompt_len == 0 || prompt_len >= tokens.len() {
            return Err(RaftError::validation(
                "tokens",
                format!(
                    "need a non-empty response after the prompt (len {}, prompt {})",
                    tokens.len(),
                    prompt_len
                ),
            ));
        }
        let inputs = Tensor::new(&tokens[..tokens.len() - 1], &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&inputs)?.squeeze(0)?;

        // Position i predicts token i + 1; the response starts at prompt_len.
        let start = prompt_len - 1;
        let len = tokens.len() - 1 - start;
        let logits = logits.narrow(0, start, len)?;
        let targets = Tensor::new(&tokens[prompt_len..], &self.device)?;
        Ok(candle_nn::loss::cross_entropy(&logits, &targets)?)
    }

    fn sample_token(&mut self, logits: &Tensor) -> RaftResult<u32> {
        let logits = logits.squeeze(0)?.to_vec1::<f32>()?;
        let temp = self.temperature.max(0.05);

        let scaled: Vec<f64> = logits
            .iter()
            .enumerate()
            .map(|(id, &v)| {
                if self.tokenizer.is_unsampleable(id as u32) {
                    f64::NEG_INFINITY
                } else {
                    v as f64 / temp
                }
            })
            .collect();
        let max_logit = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = scaled.iter().map(|v| (v - max_logit).exp()).collect();
        let mass: f64 = weights.iter().sum();
        if mass.is_nan() || mass <= 0.0 {
            return Ok(self.tokenizer.eos_id());
        }

        let r = self.rng.random::<f64>() * mass;
        let mut cumulative = 0.0;
        let mut last_valid = self.tokenizer.eos_id();
        for (id, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_valid = id as u32;
            if r <= cumulative {
                return Ok(id as u32);
            }
        }
        Ok(last_valid)
    }

    /// Autoregressive sampling from `[BOS] prompt`, stopping at `[EOS]` or
    /// after `max_new_tokens`.
    pub fn sample_completion(&mut self, prompt: &str) -> RaftResult<String> {
        let mut context = vec![self.tokenizer.bos_id()];
        context.extend(self.tokenizer.encode(prompt)?);

        let mut state = self.model.zero_state()?;
        let mut logits = None;
        for id in &context {
            let (next_logits, next_state) = self.model.step(*id, &state, &self.device)?;
            logits = Some(next_logits);
            state = next_state;
        }

        let mut generated = Vec::new();
        for _ in 0..self.max_new_tokens {
            let Some(current) = logits.take() else { break };
            let next = self.sample_token(&current)?;
            if next == self.tokenizer.eos_id() {
                break;
            }
            generated.push(next);
            let (next_logits, next_state) = self.model.step(next, &state, &self.device)?;
            logits = Some(next_logits);
            state = next_state;
        }

        self.tokenizer.decode(&generated)
    }

    fn manifest(&self) -> CheckpointManifest {
        CheckpointManifest::new(
            ModelKind::PolicyLm,
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

    pub fn load(dir: &Path, device: Device, seed: u64) -> RaftResult<Self> {
        let manifest = checkpoint::read_manifest(dir)?;
        if manifest.kind != ModelKind::PolicyLm {
            return Err(RaftError::checkpoint(
                dir.display().to_string(),
                format!("expected a policy language model, found {:?}", manifest.kind),
            ));
        }
        let tokenizer = TextTokenizer::from_file(dir.join(TOKENIZER_FILE))?;
        let settings = PolicySettings {
            embed_dim: manifest.embed_dim,
            hidden_dim: manifest.hidden_dim,
        };
        let mut policy = Self::new(tokenizer, settings, device, seed)?;
        checkpoint::load(&mut policy.varmap, dir)?;
        Ok(policy)
    }
}

impl SampleGenerator for PolicyModel {
    fn generate(&mut self, prompt: &str, count: usize) -> RaftResult<Vec<String>> {
        (0..count).map(|_| self.sample_completion(prompt)).collect()
    }
}
