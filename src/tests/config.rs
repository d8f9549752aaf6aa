// tests/config.rs
use crate::config::{parse_device, RaftConfig, SamplingMode};
use crate::config_loader::{figment, load_config};
use crate::errors::RaftError;
use candle_core::Device;
use figment::Jail;
use std::path::Path;

#[test]
pub fn defaults_are_valid() {
    let config = RaftConfig::default();
    config.validate().unwrap();
    assert_eq!(config.raft.iterations, 3);
    assert_eq!(config.raft.sampling, SamplingMode::Policy);
    assert_eq!(config.runtime.seed, 42);
}

#[test]
pub fn defaults_apply_without_a_file() {
    Jail::expect_with(|_jail| {
        let config = load_config(None).map_err(|e| e.to_string())?;
        assert_eq!(config.raft.top_k, RaftConfig::default().raft.top_k);
        Ok(())
    });
}

#[test]
pub fn toml_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "lab.toml",
            r#"
                [raft]
                iterations = 5
                sampling = "placeholder"

                [runtime]
                seed = 9
            "#,
        )?;
        let config = load_config(Some(Path::new("lab.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.raft.iterations, 5);
        assert_eq!(config.raft.sampling, SamplingMode::Placeholder);
        assert_eq!(config.runtime.seed, 9);
        // Untouched keys keep their defaults.
        assert_eq!(config.raft.candidates, 8);
        Ok(())
    });
}

#[test]
pub fn environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("raft.toml", "[raft]\ntop_k = 2\n")?;
        jail.set_env("RAFT_RAFT__TOP_K", "4");
        jail.set_env("RAFT_LOGGING__FILTER", "debug");
        let config = load_config(None).map_err(|e| e.to_string())?;
        assert_eq!(config.raft.top_k, 4);
        assert_eq!(config.logging.filter, "debug");
        Ok(())
    });
}

#[test]
pub fn invalid_layered_values_fail_validation() {
    Jail::expect_with(|jail| {
        jail.set_env("RAFT_RAFT__TOP_K", "0");
        let err = load_config(None).unwrap_err();
        assert!(matches!(err, RaftError::Config { .. }));
        Ok(())
    });
}

#[test]
pub fn malformed_values_are_config_errors() {
    Jail::expect_with(|jail| {
        jail.set_env("RAFT_RAFT__ITERATIONS", "many");
        let err = load_config(None).unwrap_err();
        assert!(matches!(err, RaftError::Config { .. }));
        Ok(())
    });
}

#[test]
pub fn top_k_must_not_exceed_candidates() {
    let mut config = RaftConfig::default();
    config.raft.top_k = config.raft.candidates + 1;
    assert!(config.validate().is_err());
}

#[test]
pub fn zero_iterations_is_allowed() {
    let mut config = RaftConfig::default();
    config.raft.iterations = 0;
    config.validate().unwrap();
}

#[test]
pub fn rendered_toml_reloads_to_the_same_settings() {
    let mut config = RaftConfig::default();
    config.raft.temperature = 0.7;
    let rendered = config.to_toml().unwrap();

    Jail::expect_with(|jail| {
        jail.create_file("raft.toml", &rendered)?;
        let reloaded = figment(None)
            .extract::<RaftConfig>()
            .map_err(|e| e.to_string())?;
        assert_eq!(reloaded.raft.temperature, 0.7);
        assert_eq!(reloaded.checkpoint.dir, config.checkpoint.dir);
        Ok(())
    });
}

#[test]
pub fn cpu_device_parses() {
    assert!(matches!(parse_device("cpu"), Device::Cpu));
}

#[test]
pub fn fixture_config_is_valid() {
    let config = super::test_utils::small_config();
    config.validate().unwrap();
    assert!(config.raft.top_k <= config.raft.candidates);
}
