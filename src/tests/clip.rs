// tests/clip.rs
use super::test_utils::SEED;
use crate::architectures::random_tensor;
use crate::clip::{load_image_npy, DualEncoder, DualEncoderConfig, ImageTextScorer, PretrainedClip};
use crate::errors::RaftError;
use crate::tokenizer::TextTokenizer;
use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

fn captions() -> Vec<String> {
    vec![
        "a photo of a cat".to_string(),
        "a photo of a dog".to_string(),
        "a diagram of a plant".to_string(),
    ]
}

fn encoder() -> DualEncoder {
    let tokenizer = TextTokenizer::from_corpus(&captions()).unwrap();
    DualEncoder::new(tokenizer, DualEncoderConfig::default(), Device::Cpu, SEED).unwrap()
}

fn image(side: usize) -> Tensor {
    let mut rng = StdRng::seed_from_u64(SEED);
    random_tensor(&[3, side, side], &mut rng, &Device::Cpu).unwrap()
}

#[test]
pub fn one_logit_per_caption() {
    let logits = encoder().logits(&image(16), &captions()).unwrap();
    assert_eq!(logits.len(), 3);
    assert!(logits.iter().all(|l| l.is_finite()));
}

#[test]
pub fn similarity_is_bounded_by_the_temperature() {
    // Cosine similarity lies in [-1, 1] before scaling by exp(logit_scale) = 1 / 0.07.
    let bound = 1.0 / 0.07 + 1e-3;
    let score = encoder().similarity(&image(16), "a photo of a cat").unwrap();
    assert!(score.abs() <= bound);
}

#[test]
pub fn caption_ranking_is_a_distribution() {
    let ranked = encoder().rank_captions(&image(16), &captions()).unwrap();
    assert_eq!(ranked.len(), 3);
    let total: f32 = ranked.iter().map(|(_, p)| p).sum();
    assert!((total - 1.0).abs() < 1e-5);
    assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
}

#[test]
pub fn scoring_is_deterministic() {
    let model = encoder();
    let img = image(12);
    assert_eq!(
        model.logits(&img, &captions()).unwrap(),
        model.logits(&img, &captions()).unwrap()
    );
}

#[test]
pub fn empty_caption_list_is_rejected() {
    let err = encoder().logits(&image(16), &[]).unwrap_err();
    assert!(matches!(err, RaftError::Validation { .. }));
}

#[test]
pub fn images_must_be_channel_first_rgb() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let gray = random_tensor(&[1, 16, 16], &mut rng, &Device::Cpu).unwrap();
    let err = encoder().logits(&gray, &captions()).unwrap_err();
    assert!(matches!(err, RaftError::Validation { .. }));
}

#[test]
pub fn npy_images_load_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image.npy");
    let original = image(8);
    original.write_npy(&path).unwrap();

    let loaded = load_image_npy(&path, &Device::Cpu).unwrap();
    assert_eq!(loaded.dims(), &[3, 8, 8]);
    let diff = (loaded - original)
        .unwrap()
        .abs()
        .unwrap()
        .sum_all()
        .unwrap()
        .to_scalar::<f32>()
        .unwrap();
    assert_eq!(diff, 0.0);
}

#[test]
pub fn missing_image_is_not_found() {
    let err = load_image_npy(std::path::Path::new("/nope/image.npy"), &Device::Cpu).unwrap_err();
    assert!(matches!(err, RaftError::NotFound { .. }));
}

#[test]
pub fn pretrained_clip_requires_its_files() {
    let dir = TempDir::new().unwrap();
    let err = PretrainedClip::load(
        &dir.path().join("model.safetensors"),
        &dir.path().join("tokenizer.json"),
        Device::Cpu,
    )
    .err()
    .unwrap();
    assert!(matches!(err, RaftError::NotFound { .. }));
}
