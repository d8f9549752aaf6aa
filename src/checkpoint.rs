//! Checkpoint persistence: safetensors weights plus a JSON manifest.
//!
//! A checkpoint directory holds `model.safetensors`, `manifest.json` and,
//! for text models, `tokenizer.json`. The manifest records the SHA-256 of the
//! weights file so a load can refuse tampered or truncated weights.

use crate::errors::{RaftError, RaftResult};
use candle_nn::VarMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RewardClassifier,
    PolicyLm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub kind: ModelKind,
    pub model_file: String,
    pub sha256: String,
    pub version: String,
    pub vocab_size: usize,
    pub embed_dim: usize,
    pub hidden_dim: usize,
    pub timestamp: DateTime<Utc>,
}

impl CheckpointManifest {
    /// Manifest for a model about to be saved; the hash is filled in by [`save`].
    pub fn new(kind: ModelKind, vocab_size: usize, embed_dim: usize, hidden_dim: usize) -> Self {
        Self {
            kind,
            model_file: WEIGHTS_FILE.to_string(),
            sha256: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vocab_size,
            embed_dim,
            hidden_dim,
            timestamp: Utc::now(),
        }
    }
}

pub fn hash_file(path: &Path) -> RaftResult<String> {
    let data = fs::read(path)
        .map_err(|e| RaftError::io(format!("hashing {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn weights_path(dir: &Path) -> PathBuf {
    dir.join(WEIGHTS_FILE)
}

/// Write the weights and a manifest carrying their hash.
pub fn save(
    varmap: &VarMap,
    dir: &Path,
    mut manifest: CheckpointManifest,
) -> RaftResult<CheckpointManifest> {
    fs::create_dir_all(dir)
        .map_err(|e| RaftError::io(format!("creating {}", dir.display()), e))?;

    let weights = weights_path(dir);
    varmap
        .save(&weights)
        .map_err(|e| RaftError::tensor(format!("saving {}", weights.display()), e))?;

    manifest.model_file = WEIGHTS_FILE.to_string();
    manifest.sha256 = hash_file(&weights)?;

    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    fs::write(dir.join(MANIFEST_FILE), manifest_json)
        .map_err(|e| RaftError::io("writing checkpoint manifest", e))?;

    tracing::info!(path = %dir.display(), kind = ?manifest.kind, sha256 = %manifest.sha256, "Saved checkpoint");
    Ok(manifest)
}

pub fn read_manifest(dir: &Path) -> RaftResult<CheckpointManifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(RaftError::not_found("checkpoint manifest", path.display().to_string()));
    }
    let content = fs::read_to_string(&path)
        .map_err(|e| RaftError::io(format!("reading {}", path.display()), e))?;
    serde_json::from_str(&content)
        .map_err(|e| RaftError::serialization(format!("parsing {}", path.display()), e))
}

/// Check the weights file against the manifest hash.
pub fn verify(dir: &Path) -> RaftResult<CheckpointManifest> {
    let manifest = read_manifest(dir)?;
    let weights = dir.join(&manifest.model_file);
    if !weights.exists() {
        return Err(RaftError::not_found("checkpoint weights", weights.display().to_string()));
    }
    let actual = hash_file(&weights)?;
    if actual != manifest.sha256 {
        return Err(RaftError::checkpoint(
            weights.display().to_string(),
            format!("sha256 mismatch: manifest {}, file {}", manifest.sha256, actual),
        ));
    }
    Ok(manifest)
}

/// Load verified weights into the variables already registered in `varmap`.
pub fn load(varmap: &mut VarMap, dir: &Path) -> RaftResult<CheckpointManifest> {
    let manifest = verify(dir)?;
    let weights = dir.join(&manifest.model_file);
    varmap
        .load(&weights)
        .map_err(|e| RaftError::tensor(format!("loading {}", weights.display()), e))?;
    tracing::info!(path = %dir.display(), kind = ?manifest.kind, "Loaded checkpoint");
    Ok(manifest)
}
