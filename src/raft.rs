//! raft.rs
//! Reward rAnked FineTuning driver: generate, rank by reward, fine-tune on the
//! top-K, repeated a fixed number of times with no early stopping.

use crate::config::{LoopSettings, SamplingMode};
use crate::errors::RaftResult;
use crate::finetune::{FineTuneSettings, FineTuner};
use crate::generator::{PlaceholderGenerator, PolicyModel, SampleGenerator};
use crate::ranker::{self, ScoredSample, Scorer};
use crate::run_log::{IterationRecord, RunLog};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftReport {
    pub run_id: String,
    pub prompt: String,
    pub iterations: Vec<IterationRecord>,
}

impl RaftReport {
    /// Best score seen in each iteration, in order.
    pub fn best_scores(&self) -> Vec<f32> {
        self.iterations
            .iter()
            .filter_map(|r| r.scores.map(|s| s.best))
            .collect()
    }
}

pub struct RaftTrainer<S: Scorer> {
    policy: PolicyModel,
    reward: S,
    settings: LoopSettings,
    run_log: RunLog,
}

impl<S: Scorer> RaftTrainer<S> {
    /// Fails when `settings` could not drive a run, e.g. a `top_k` of zero.
    pub fn new(policy: PolicyModel, reward: S, settings: LoopSettings) -> RaftResult<Self> {
        settings.validate()?;
        let policy = policy.with_sampling(settings.max_new_tokens, settings.temperature);
        Ok(Self {
            policy,
            reward,
            settings,
            run_log: RunLog::discard(),
        })
    }

    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = run_log;
        self
    }

    pub fn policy(&self) -> &PolicyModel {
        &self.policy
    }

    pub fn reward(&self) -> &S {
        &self.reward
    }

    pub fn into_policy(self) -> PolicyModel {
        self.policy
    }

    fn candidates(&mut self, prompt: &str) -> RaftResult<Vec<String>> {
        let count = self.settings.candidates;
        match self.settings.sampling {
            SamplingMode::Policy => self.policy.generate(prompt, count),
            SamplingMode::Placeholder => PlaceholderGenerator.generate(prompt, count),
        }
    }

    fn score_texts(&self, prompt: &str, samples: Vec<String>) -> RaftResult<Vec<ScoredSample>> {
        // The reward model judges the completion in the context of its prompt.
        let prompted = PromptedScorer {
            prompt,
            inner: &self.reward,
        };
        ranker::rank(samples, &prompted)
    }

    /// Run exactly `iterations` generate/rank/fine-tune rounds.
    pub fn run(&mut self, prompt: &str) -> RaftResult<RaftReport> {
        let run_id = Uuid::new_v4().to_string();
        let tuner = FineTuner::new(FineTuneSettings {
            epochs: self.settings.finetune_epochs,
            learning_rate: self.settings.learning_rate,
        });

        info!(
            %run_id,
            iterations = self.settings.iterations,
            candidates = self.settings.candidates,
            top_k = self.settings.top_k,
            sampling = ?self.settings.sampling,
            "Starting RAFT run"
        );

        let mut iterations = Vec::with_capacity(self.settings.iterations);
        for iteration in 1..=self.settings.iterations {
            let samples = self.candidates(prompt)?;
            let ranked = self.score_texts(prompt, samples)?;
            let best = ranker::top_k(&ranked, self.settings.top_k);
            if best.iter().all(|s| s.text.trim().is_empty()) {
                warn!(iteration, "top-ranked completions are empty, training on end-of-sequence only");
            }

            let losses = tuner.run(&self.policy, prompt, &best)?;
            let summary = ranker::summarize(&ranked);

            let record = IterationRecord {
                run_id: run_id.clone(),
                iteration,
                candidates: ranked.len(),
                scores: summary,
                top_k: best.into_iter().map(|s| s.text).collect(),
                finetune_losses: losses,
                timestamp: Utc::now(),
            };
            if let Some(s) = &record.scores {
                info!(
                    iteration,
                    best = s.best,
                    mean = s.mean,
                    final_loss = record.finetune_losses.last().copied().unwrap_or_default(),
                    "RAFT iteration complete"
                );
            }
            self.run_log.emit(&record)?;
            iterations.push(record);
        }

        Ok(RaftReport {
            run_id,
            prompt: prompt.to_string(),
            iterations,
        })
    }
}

struct PromptedScorer<'a, S: Scorer> {
    prompt: &'a str,
    inner: &'a S,
}

impl<S: Scorer> Scorer for PromptedScorer<'_, S> {
    fn score(&self, text: &str) -> RaftResult<f32> {
        self.inner
            .score(&crate::dataset::join_prompt(self.prompt, text))
    }

    fn score_batch(&self, texts: &[String]) -> RaftResult<Vec<f32>> {
        let joined: Vec<String> = texts
            .iter()
            .map(|t| crate::dataset::join_prompt(self.prompt, t))
            .collect();
        self.inner.score_batch(&joined)
    }
}
