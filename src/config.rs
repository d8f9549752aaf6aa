// config.rs
// Purpose: Runtime configuration for the RAFT lab (models, loop sizes, logging, checkpoints)

use crate::errors::{RaftError, RaftResult};
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaftConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub raft: LoopSettings,
    #[serde(default)]
    pub reward: RewardSettings,
    #[serde(default)]
    pub policy: PolicySettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub checkpoint: CheckpointSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    pub seed: u64,
    /// "cpu" or "cuda:N"
    pub device: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            device: "cpu".to_string(),
        }
    }
}

/// Where candidate completions come from during a RAFT iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Autoregressive sampling from the policy language model
    Policy,
    /// Fixed placeholder strings, no model involved
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSettings {
    pub iterations: usize,
    pub candidates: usize,
    pub top_k: usize,
    pub finetune_epochs: usize,
    pub learning_rate: f64,
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub sampling: SamplingMode,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            iterations: 3,
            candidates: 8,
            top_k: 2,
            finetune_epochs: 3,
            learning_rate: 5e-3,
            max_new_tokens: 12,
            temperature: 1.0,
            sampling: SamplingMode::Policy,
        }
    }
}

impl LoopSettings {
    /// Reject settings the iteration driver cannot run with.
    pub fn validate(&self) -> RaftResult<()> {
        if self.candidates == 0 {
            return Err(RaftError::config("raft.candidates must be at least 1"));
        }
        if self.top_k == 0 || self.top_k > self.candidates {
            return Err(RaftError::config(format!(
                "raft.top_k must be in 1..={}, got {}",
                self.candidates, self.top_k
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(RaftError::config("raft.learning_rate must be positive"));
        }
        if self.temperature <= 0.0 {
            return Err(RaftError::config("raft.temperature must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardSettings {
    pub embed_dim: usize,
    pub hidden_dim: usize,
    pub epochs: usize,
    pub learning_rate: f64,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            embed_dim: 32,
            hidden_dim: 32,
            epochs: 20,
            learning_rate: 1e-2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    pub embed_dim: usize,
    pub hidden_dim: usize,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            embed_dim: 32,
            hidden_dim: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing EnvFilter directive, overridden by RUST_LOG
    pub filter: String,
    pub json: bool,
    /// JSON-lines file receiving one record per RAFT iteration; `-` writes to stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_log: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            run_log: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSettings {
    pub dir: PathBuf,
    pub save_policy: bool,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("checkpoints"),
            save_policy: false,
        }
    }
}

impl RaftConfig {
    /// Reject settings the training loop cannot run with.
    pub fn validate(&self) -> RaftResult<()> {
        self.raft.validate()?;
        if self.reward.learning_rate <= 0.0 {
            return Err(RaftError::config("reward.learning_rate must be positive"));
        }
        let dims = [
            self.reward.embed_dim,
            self.reward.hidden_dim,
            self.policy.embed_dim,
            self.policy.hidden_dim,
        ];
        if dims.contains(&0) {
            return Err(RaftError::config("model dimensions must be non-zero"));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> RaftResult<String> {
        toml::to_string_pretty(self).map_err(|e| RaftError::config(e.to_string()))
    }
}

impl RuntimeSettings {
    /// Resolve the configured device, falling back to CPU when CUDA is unavailable.
    pub fn device(&self) -> Device {
        parse_device(&self.device)
    }
}

pub fn parse_device(device: &str) -> Device {
    if let Some(rest) = device.strip_prefix("cuda") {
        let ordinal = rest
            .strip_prefix(':')
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        match Device::new_cuda(ordinal) {
            Ok(dev) => dev,
            Err(e) => {
                tracing::warn!("CUDA device {ordinal} unavailable ({e}), using CPU");
                Device::Cpu
            }
        }
    } else {
        Device::Cpu
    }
}
