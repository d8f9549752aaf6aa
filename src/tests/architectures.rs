// tests/architectures.rs
use super::test_utils::SEED;
use crate::architectures::convnet::ConvNet;
use crate::architectures::gan::{Gan, GanConfig};
use crate::architectures::transformer::{MultiHeadAttention, TransformerConfig, TransformerEncoder};
use crate::architectures::{demo, random_tensor, ArchitectureKind};
use crate::errors::RaftError;
use crate::params;
use candle_core::{DType, Device, D};
use candle_nn::{VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
pub fn every_architecture_runs() {
    for kind in ArchitectureKind::all() {
        let report = demo(kind, &Device::Cpu, SEED).unwrap();
        assert_eq!(report.kind, kind);
        assert!(report.parameters > 0, "{kind} has no parameters");
        assert!(report.losses.iter().all(|l| l.is_finite()), "{kind}: {:?}", report.losses);
    }
}

#[test]
pub fn demo_shapes_match_the_models() {
    let shape = |kind| demo(kind, &Device::Cpu, SEED).unwrap().output_shape;
    assert_eq!(shape(ArchitectureKind::FeedForward), vec![4, 3]);
    assert_eq!(shape(ArchitectureKind::Convolutional), vec![2, 10]);
    assert_eq!(shape(ArchitectureKind::Recurrent), vec![2, 2]);
    assert_eq!(shape(ArchitectureKind::Lstm), vec![2, 2]);
    assert_eq!(shape(ArchitectureKind::Transformer), vec![2, 6, 16]);
    assert_eq!(shape(ArchitectureKind::Autoencoder), vec![4, 16]);
    assert_eq!(shape(ArchitectureKind::Gan), vec![8, GanConfig::default().data_dim]);
}

#[test]
pub fn demos_are_reproducible() {
    let a = demo(ArchitectureKind::Lstm, &Device::Cpu, SEED).unwrap();
    let b = demo(ArchitectureKind::Lstm, &Device::Cpu, SEED).unwrap();
    assert_eq!(a.losses, b.losses);
}

#[test]
pub fn gan_reports_both_losses_per_step() {
    let report = demo(ArchitectureKind::Gan, &Device::Cpu, SEED).unwrap();
    assert_eq!(report.losses.len(), 6);
    assert!(report.losses.iter().all(|l| *l > 0.0));
}

#[test]
pub fn kinds_parse_from_names_and_aliases() {
    for kind in ArchitectureKind::all() {
        assert_eq!(kind.name().parse::<ArchitectureKind>().unwrap(), kind);
    }
    assert_eq!("CNN".parse::<ArchitectureKind>().unwrap(), ArchitectureKind::Convolutional);
    assert_eq!("mlp".parse::<ArchitectureKind>().unwrap(), ArchitectureKind::FeedForward);
    assert_eq!("rnn".parse::<ArchitectureKind>().unwrap(), ArchitectureKind::Recurrent);
    let err = "capsule".parse::<ArchitectureKind>().unwrap_err();
    assert!(matches!(err, RaftError::Validation { .. }));
}

#[test]
pub fn attention_rows_sum_to_one() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let config = TransformerConfig::default();
    let attention = MultiHeadAttention::new(config.d_model, config.num_heads, vb).unwrap();

    let mut rng = StdRng::seed_from_u64(SEED);
    let xs = random_tensor(&[2, 5, config.d_model], &mut rng, &Device::Cpu).unwrap();
    let weights = attention.attention_weights(&xs).unwrap();
    assert_eq!(weights.dims(), &[2, config.num_heads, 5, 5]);

    let sums = weights.sum(D::Minus1).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
}

#[test]
pub fn attention_rejects_uneven_heads() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    assert!(MultiHeadAttention::new(10, 4, vb).is_err());
}

#[test]
pub fn gan_step_checks_batch_sizes() {
    let config = GanConfig::default();
    let mut gan = Gan::new(config, &Device::Cpu, SEED).unwrap();
    let mut rng = StdRng::seed_from_u64(SEED);
    let real = random_tensor(&[4, config.data_dim], &mut rng, &Device::Cpu).unwrap();
    let noise = random_tensor(&[3, config.latent_dim], &mut rng, &Device::Cpu).unwrap();
    let err = gan.train_step(&real, &noise).err().unwrap();
    assert!(matches!(err, RaftError::Validation { .. }));
}

#[test]
pub fn generated_samples_stay_in_range() {
    let config = GanConfig::default();
    let gan = Gan::new(config, &Device::Cpu, SEED).unwrap();
    let mut rng = StdRng::seed_from_u64(SEED);
    let noise = random_tensor(&[5, config.latent_dim], &mut rng, &Device::Cpu).unwrap();
    let samples = gan.generate(&noise).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(samples.iter().all(|v| v.abs() <= 1.0));
}

#[test]
pub fn seeding_keeps_layer_norm_identity() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let config = TransformerConfig::default();
    let _encoder = TransformerEncoder::new(config, vb).unwrap();
    params::seed_parameters(&varmap, SEED).unwrap();

    let snapshot = params::snapshot(&varmap).unwrap();
    let norms: Vec<_> = snapshot.iter().filter(|(name, _)| name.contains(".norm")).collect();
    assert_eq!(norms.len(), config.num_layers * 4);
    for (name, values) in norms {
        let expected = if name.ends_with(".weight") { 1.0 } else { 0.0 };
        assert!(values.iter().all(|v| *v == expected), "{name} was reseeded");
    }
    // The attention projections around them are still random.
    assert!(snapshot
        .iter()
        .filter(|(name, _)| name.contains("attention"))
        .flat_map(|(_, values)| values.iter())
        .any(|v| *v != 0.0));
}

#[test]
pub fn conv_kernels_are_bounded_by_their_full_fan_in() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let _model = ConvNet::new(1, 10, vb).unwrap();
    params::seed_parameters(&varmap, SEED).unwrap();

    let snapshot = params::snapshot(&varmap).unwrap();
    let (_, kernel) = snapshot.iter().find(|(name, _)| name == "conv2.weight").unwrap();
    // (16, 8, 3, 3) kernel: fan_in is 8 * 3 * 3.
    let bound = 1.0 / (72.0f32).sqrt();
    assert!(kernel.iter().all(|w| w.abs() <= bound));
    assert!(kernel.iter().any(|w| w.abs() > bound / 2.0));
}
