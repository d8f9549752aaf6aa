// finetune.rs
// Purpose: Update the policy in place on the top-ranked completions

use crate::errors::RaftResult;
use crate::generator::PolicyModel;
use crate::ranker::ScoredSample;
use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct FineTuneSettings {
    pub epochs: usize,
    pub learning_rate: f64,
}

pub struct FineTuner {
    settings: FineTuneSettings,
}

impl FineTuner {
    pub fn new(settings: FineTuneSettings) -> Self {
        Self { settings }
    }

    /// One AdamW step per epoch on the mean response NLL of `samples`.
    /// Returns the loss observed at each epoch; an empty sample list trains nothing.
    pub fn run(
        &self,
        policy: &PolicyModel,
        prompt: &str,
        samples: &[ScoredSample],
    ) -> RaftResult<Vec<f32>> {
        if samples.is_empty() || self.settings.epochs == 0 {
            return Ok(Vec::new());
        }

        let sequences = samples
            .iter()
            .map(|s| policy.training_tokens(prompt, &s.text))
            .collect::<RaftResult<Vec<_>>>()?;

        let mut optimizer = AdamW::new(
            policy.varmap().all_vars(),
            ParamsAdamW {
                lr: self.settings.learning_rate,
                ..Default::default()
            },
        )?;

        let mut losses = Vec::with_capacity(self.settings.epochs);
        for epoch in 1..=self.settings.epochs {
            let per_sample = sequences
                .iter()
                .map(|(tokens, prompt_len)| policy.sequence_nll(tokens, *prompt_len))
                .collect::<RaftResult<Vec<_>>>()?;
            let loss = Tensor::stack(&per_sample, 0)?.mean_all()?;
            let loss_value = loss.to_scalar::<f32>()?;
            optimizer.backward_step(&loss)?;
            debug!(epoch, loss = loss_value, samples = samples.len(), "policy fine-tune epoch");
            losses.push(loss_value);
        }
        Ok(losses)
    }
}
