//! Word-level tokenizer shared by the reward model and the policy.
//!
//! The tokenizer is a `tokenizers` WordLevel model (lowercase normalizer,
//! whitespace split) assembled from a corpus, so it can be saved next to a
//! checkpoint as a regular `tokenizer.json`.

use crate::errors::{RaftError, RaftResult};
use candle_core::{Device, Tensor};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use tokenizers::Tokenizer;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const BOS_TOKEN: &str = "[BOS]";
pub const EOS_TOKEN: &str = "[EOS]";

const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, BOS_TOKEN, EOS_TOKEN];

#[derive(Clone)]
pub struct TextTokenizer {
    inner: Tokenizer,
    pad_id: u32,
    unk_id: u32,
    bos_id: u32,
    eos_id: u32,
}

impl TextTokenizer {
    /// Build a vocabulary from every whitespace-separated word in `texts`.
    /// Special tokens take ids 0..4, words follow in sorted order.
    pub fn from_corpus<S: AsRef<str>>(texts: &[S]) -> RaftResult<Self> {
        let words: BTreeSet<String> = texts
            .iter()
            .flat_map(|t| {
                t.as_ref()
                    .split_whitespace()
                    .map(|w| w.chars().flat_map(char::to_lowercase).collect::<String>())
                    .collect::<Vec<_>>()
            })
            .filter(|w| !SPECIAL_TOKENS.contains(&w.as_str()))
            .collect();

        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert((*token).to_string(), serde_json::json!(id));
        }
        for (offset, word) in words.iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(SPECIAL_TOKENS.len() + offset));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, token)| {
                serde_json::json!({
                    "id": id,
                    "content": token,
                    "single_word": false,
                    "lstrip": false,
                    "rstrip": false,
                    "normalized": false,
                    "special": true
                })
            })
            .collect();

        let definition = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": { "type": "Lowercase" },
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let inner = Tokenizer::from_str(&definition.to_string())
            .map_err(|e| RaftError::tokenizer(format!("failed to build vocabulary: {e}")))?;
        Self::from_tokenizer(inner)
    }

    /// Load a tokenizer previously written with [`TextTokenizer::save`].
    pub fn from_file(path: impl AsRef<Path>) -> RaftResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RaftError::not_found("tokenizer", path.display().to_string()));
        }
        let inner = Tokenizer::from_file(path)
            .map_err(|e| RaftError::tokenizer(format!("{}: {e}", path.display())))?;
        Self::from_tokenizer(inner)
    }

    fn from_tokenizer(inner: Tokenizer) -> RaftResult<Self> {
        let id = |token: &str| {
            inner
                .token_to_id(token)
                .ok_or_else(|| RaftError::tokenizer(format!("vocabulary lacks {token}")))
        };
        Ok(Self {
            pad_id: id(PAD_TOKEN)?,
            unk_id: id(UNK_TOKEN)?,
            bos_id: id(BOS_TOKEN)?,
            eos_id: id(EOS_TOKEN)?,
            inner,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RaftResult<()> {
        let path = path.as_ref();
        self.inner
            .save(path, true)
            .map_err(|e| RaftError::tokenizer(format!("{}: {e}", path.display())))
    }

    pub fn encode(&self, text: &str) -> RaftResult<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| RaftError::tokenizer(format!("encode failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode ids back to text, dropping special tokens.
    pub fn decode(&self, ids: &[u32]) -> RaftResult<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| RaftError::tokenizer(format!("decode failed: {e}")))
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }

    pub fn bos_id(&self) -> u32 {
        self.bos_id
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    /// Encode `texts` into a right-padded `(batch, max_len)` id matrix and a
    /// matching f32 mask. A text with no tokens becomes a single `[UNK]`.
    pub fn batch<S: AsRef<str>>(&self, texts: &[S], device: &Device) -> RaftResult<(Tensor, Tensor)> {
        let mut seqs = Vec::with_capacity(texts.len());
        for text in texts {
            let mut ids = self.encode(text.as_ref())?;
            if ids.is_empty() {
                ids.push(self.unk_id);
            }
            seqs.push(ids);
        }
        let max_len = seqs.iter().map(Vec::len).max().unwrap_or(1);

        let mut ids = Vec::with_capacity(seqs.len() * max_len);
        let mut mask = Vec::with_capacity(seqs.len() * max_len);
        for seq in &seqs {
            for pos in 0..max_len {
                match seq.get(pos) {
                    Some(id) => {
                        ids.push(*id);
                        mask.push(1f32);
                    }
                    None => {
                        ids.push(self.pad_id);
                        mask.push(0f32);
                    }
                }
            }
        }

        let shape = (seqs.len(), max_len);
        let ids = Tensor::from_vec(ids, shape, device)?;
        let mask = Tensor::from_vec(mask, shape, device)?;
        Ok((ids, mask))
    }

    /// Ids the policy must never emit while sampling.
    pub fn is_unsampleable(&self, id: u32) -> bool {
        id == self.pad_id || id == self.unk_id || id == self.bos_id
    }
}
