// tests/ranker.rs
use crate::errors::RaftError;
use crate::ranker::{rank, summarize, top_k, ScoredSample, Scorer};

fn length_scorer(text: &str) -> f32 {
    text.len() as f32
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
pub fn rank_orders_scores_descending() {
    let ranked = rank(texts(&["bb", "a", "dddd", "ccc"]), &length_scorer).unwrap();
    let scores: Vec<f32> = ranked.iter().map(|s| s.score).collect();
    assert_eq!(scores, vec![4.0, 3.0, 2.0, 1.0]);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
pub fn rank_is_a_permutation_of_the_input() {
    let input = texts(&["one", "three", "five", "seven", "eleven"]);
    let ranked = rank(input.clone(), &length_scorer).unwrap();

    let mut expected = input;
    let mut got: Vec<String> = ranked.into_iter().map(|s| s.text).collect();
    expected.sort();
    got.sort();
    assert_eq!(expected, got);
}

#[test]
pub fn ties_keep_input_order() {
    let constant = |_: &str| 0.5f32;
    let ranked = rank(texts(&["first", "second", "third"]), &constant).unwrap();
    let order: Vec<&str> = ranked.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[test]
pub fn nan_scores_sink_to_the_bottom() {
    let scorer = |t: &str| if t == "broken" { f32::NAN } else { t.len() as f32 };
    let ranked = rank(texts(&["broken", "ok", "fine!"]), &scorer).unwrap();
    assert_eq!(ranked.last().unwrap().text, "broken");
    assert_eq!(ranked[0].text, "fine!");
}

#[test]
pub fn empty_input_ranks_to_empty_output() {
    let ranked = rank(Vec::new(), &length_scorer).unwrap();
    assert!(ranked.is_empty());
    assert!(summarize(&ranked).is_none());
}

#[test]
pub fn top_k_truncates_and_tolerates_large_k() {
    let ranked = rank(texts(&["aaa", "a", "aa"]), &length_scorer).unwrap();
    let best = top_k(&ranked, 2);
    assert_eq!(best.len(), 2);
    assert_eq!(best[0].text, "aaa");
    assert_eq!(top_k(&ranked, 10).len(), 3);
}

#[test]
pub fn summary_reports_best_mean_worst() {
    let ranked = vec![
        ScoredSample { text: "x".into(), score: 0.9 },
        ScoredSample { text: "y".into(), score: 0.5 },
        ScoredSample { text: "z".into(), score: 0.1 },
    ];
    let summary = summarize(&ranked).unwrap();
    assert_eq!(summary.best, 0.9);
    assert_eq!(summary.worst, 0.1);
    assert!((summary.mean - 0.5).abs() < 1e-6);
}

struct Failing;

impl Scorer for Failing {
    fn score(&self, _text: &str) -> crate::errors::RaftResult<f32> {
        Err(RaftError::internal("scorer offline"))
    }
}

#[test]
pub fn scorer_errors_propagate() {
    let result = rank(texts(&["anything"]), &Failing);
    assert!(result.is_err());
}

/// Batch scoring that loses the last text.
struct Truncating;

impl Scorer for Truncating {
    fn score(&self, text: &str) -> crate::errors::RaftResult<f32> {
        Ok(text.len() as f32)
    }

    fn score_batch(&self, texts: &[String]) -> crate::errors::RaftResult<Vec<f32>> {
        Ok(texts.iter().skip(1).map(|t| t.len() as f32).collect())
    }
}

#[test]
pub fn short_score_batches_are_rejected() {
    let err = rank(texts(&["a", "bb", "ccc"]), &Truncating).unwrap_err();
    assert!(matches!(err, RaftError::Internal { .. }), "{err}");
}
