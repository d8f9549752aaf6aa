// ranker.rs
// Purpose: Order candidate samples by reward, best first

use crate::errors::{RaftError, RaftResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Anything that maps a text to a scalar preference score.
pub trait Scorer {
    fn score(&self, text: &str) -> RaftResult<f32>;

    fn score_batch(&self, texts: &[String]) -> RaftResult<Vec<f32>> {
        texts.iter().map(|t| self.score(t)).collect()
    }
}

impl<F> Scorer for F
where
    F: Fn(&str) -> f32,
{
    fn score(&self, text: &str) -> RaftResult<f32> {
        Ok(self(text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSample {
    pub text: String,
    pub score: f32,
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Score every sample and return them sorted by score, highest first.
/// The sort is stable, so equal scores keep their input order; NaN scores go last.
pub fn rank<S: Scorer + ?Sized>(samples: Vec<String>, scorer: &S) -> RaftResult<Vec<ScoredSample>> {
    let scores = scorer.score_batch(&samples)?;
    if scores.len() != samples.len() {
        return Err(RaftError::internal(format!(
            "scorer returned {} scores for {} samples",
            scores.len(),
            samples.len()
        )));
    }
    let mut ranked: Vec<ScoredSample> = samples
        .into_iter()
        .zip(scores)
        .map(|(text, score)| ScoredSample { text, score })
        .collect();
    ranked.sort_by(|a, b| descending(a.score, b.score));
    Ok(ranked)
}

/// The first `k` entries of an already ranked list.
pub fn top_k(ranked: &[ScoredSample], k: usize) -> Vec<ScoredSample> {
    ranked.iter().take(k).cloned().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub best: f32,
    pub mean: f32,
    pub worst: f32,
}

/// Best/mean/worst over a ranked list, `None` when it is empty.
pub fn summarize(ranked: &[ScoredSample]) -> Option<ScoreSummary> {
    let first = ranked.first()?;
    let last = ranked.last()?;
    let mean = ranked.iter().map(|s| s.score).sum::<f32>() / ranked.len() as f32;
    Some(ScoreSummary {
        best: first.score,
        mean,
        worst: last.score,
    })
}
