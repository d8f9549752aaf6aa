// tests/generator.rs
use super::test_utils::{policy, policy_settings, tokenizer, PROMPT, SEED};
use crate::errors::RaftError;
use crate::generator::{PlaceholderGenerator, PolicyModel, SampleGenerator};
use candle_core::Device;

#[test]
pub fn placeholder_generator_returns_numbered_strings() {
    let samples = PlaceholderGenerator.generate("Say hi", 3).unwrap();
    assert_eq!(
        samples,
        vec![
            "Sample response 1 to: Say hi",
            "Sample response 2 to: Say hi",
            "Sample response 3 to: Say hi",
        ]
    );
}

#[test]
pub fn zero_count_generates_nothing() {
    assert!(PlaceholderGenerator.generate("x", 0).unwrap().is_empty());
    assert!(policy().generate(PROMPT, 0).unwrap().is_empty());
}

#[test]
pub fn policy_generates_requested_count() {
    let mut model = policy();
    let samples = model.generate(PROMPT, 5).unwrap();
    assert_eq!(samples.len(), 5);
}

#[test]
pub fn completions_respect_the_token_limit() {
    let mut model = PolicyModel::new(tokenizer(), policy_settings(), Device::Cpu, SEED)
        .unwrap()
        .with_sampling(3, 1.0);
    for sample in model.generate(PROMPT, 4).unwrap() {
        assert!(sample.split_whitespace().count() <= 3, "too long: {sample}");
        assert!(!sample.contains("[PAD]") && !sample.contains("[BOS]"));
    }
}

#[test]
pub fn same_seed_samples_the_same_completions() {
    let mut a = policy();
    let mut b = policy();
    assert_eq!(a.generate(PROMPT, 3).unwrap(), b.generate(PROMPT, 3).unwrap());
}

#[test]
pub fn training_tokens_frame_the_response() {
    let model = policy();
    let tok = model.tokenizer();
    let (tokens, prompt_len) = model.training_tokens("make tea", "boil water").unwrap();
    assert_eq!(tokens[0], tok.bos_id());
    assert_eq!(*tokens.last().unwrap(), tok.eos_id());
    assert_eq!(prompt_len, 3);
    assert_eq!(tokens.len(), 6);
}

#[test]
pub fn sequence_nll_is_a_positive_scalar() {
    let model = policy();
    let (tokens, prompt_len) = model.training_tokens(PROMPT, "boil water").unwrap();
    let nll = model.sequence_nll(&tokens, prompt_len).unwrap();
    assert_eq!(nll.dims(), &[] as &[usize]);
    let value = nll.to_scalar::<f32>().unwrap();
    assert!(value.is_finite() && value > 0.0);
}

#[test]
pub fn sequence_nll_needs_a_response() {
    let model = policy();
    let tokens = vec![model.tokenizer().bos_id()];
    let err = model.sequence_nll(&tokens, 1).unwrap_err();
    assert!(matches!(err, RaftError::Validation { .. }));
}
