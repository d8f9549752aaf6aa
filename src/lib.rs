//! Library root for the `raft_lab` crate
//! Reward-ranked fine-tuning, image/text scoring and an architecture tour on candle

// Core error handling
pub mod errors;

// Configuration & logging
pub mod config;
pub mod config_loader;
pub mod run_log;
pub mod telemetry;

// Text and data
pub mod dataset;
pub mod tokenizer;

// Model plumbing
pub mod checkpoint;
pub mod params;

// RAFT components
pub mod finetune;
pub mod generator;
pub mod raft;
pub mod ranker;
pub mod reward_model;

// Multimodal scoring
pub mod clip;

// Architecture tour
pub mod architectures;

// Command line
pub mod cli;


pub use config::RaftConfig;
pub use errors::{RaftError, RaftResult};
pub use generator::{PlaceholderGenerator, PolicyModel, SampleGenerator};
pub use raft::{RaftReport, RaftTrainer};
pub use ranker::{ScoredSample, Scorer};
pub use reward_model::RewardModel;
pub use tokenizer::TextTokenizer;
