// tests/raft.rs
use super::test_utils::{loop_settings, policy, reward_model, PROMPT};
use crate::config::SamplingMode;
use crate::errors::RaftError;
use crate::finetune::{FineTuneSettings, FineTuner};
use crate::params;
use crate::raft::RaftTrainer;
use crate::ranker::ScoredSample;
use crate::run_log::{read_records, RunLog, RunLogTarget};
use std::path::Path;
use tempfile::TempDir;

#[test]
pub fn runs_exactly_the_requested_iterations() {
    for iterations in [0, 1, 3] {
        let mut trainer = RaftTrainer::new(
            policy(),
            reward_model(),
            loop_settings(iterations, SamplingMode::Placeholder),
        )
        .unwrap();
        let report = trainer.run(PROMPT).unwrap();
        assert_eq!(report.iterations.len(), iterations);
        let numbers: Vec<usize> = report.iterations.iter().map(|r| r.iteration).collect();
        assert_eq!(numbers, (1..=iterations).collect::<Vec<_>>());
    }
}

#[test]
pub fn each_iteration_keeps_top_k_of_the_candidates() {
    let settings = loop_settings(2, SamplingMode::Policy);
    let mut trainer = RaftTrainer::new(policy(), reward_model(), settings.clone()).unwrap();
    let report = trainer.run(PROMPT).unwrap();

    for record in &report.iterations {
        assert_eq!(record.candidates, settings.candidates);
        assert_eq!(record.top_k.len(), settings.top_k);
        assert_eq!(record.finetune_losses.len(), settings.finetune_epochs);
        let scores = record.scores.unwrap();
        assert!(scores.best >= scores.mean && scores.mean >= scores.worst);
    }
    assert_eq!(report.best_scores().len(), 2);
}

#[test]
pub fn fine_tuning_moves_the_policy() {
    let mut trainer = RaftTrainer::new(
        policy(),
        reward_model(),
        loop_settings(1, SamplingMode::Placeholder),
    )
    .unwrap();
    let before = params::snapshot(trainer.policy().varmap()).unwrap();
    trainer.run(PROMPT).unwrap();
    let after = params::snapshot(trainer.policy().varmap()).unwrap();
    assert_ne!(before, after);
}

#[test]
pub fn zero_iterations_leave_the_policy_untouched() {
    let mut trainer = RaftTrainer::new(
        policy(),
        reward_model(),
        loop_settings(0, SamplingMode::Policy),
    )
    .unwrap();
    let before = params::snapshot(trainer.policy().varmap()).unwrap();
    trainer.run(PROMPT).unwrap();
    assert_eq!(before, params::snapshot(trainer.policy().varmap()).unwrap());
}

#[test]
pub fn closures_can_stand_in_for_the_reward_model() {
    let longest = |text: &str| text.len() as f32;
    let mut trainer = RaftTrainer::new(policy(), longest, loop_settings(1, SamplingMode::Placeholder)).unwrap();
    let report = trainer.run(PROMPT).unwrap();
    let top = &report.iterations[0].top_k;
    // Placeholder candidates all have the same length, so the tie keeps generation order.
    assert_eq!(top[0], format!("Sample response 1 to: {PROMPT}"));
}

#[test]
pub fn run_log_receives_one_record_per_iteration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.jsonl");
    let mut trainer = RaftTrainer::new(
        policy(),
        reward_model(),
        loop_settings(3, SamplingMode::Placeholder),
    )
    .unwrap()
    .with_run_log(RunLog::to_file(&path));
    let report = trainer.run(PROMPT).unwrap();

    let records = read_records(&path).unwrap();
    assert_eq!(records, report.iterations);
    assert!(records.iter().all(|r| r.run_id == report.run_id));
}

#[test]
pub fn run_log_setting_selects_the_target() {
    let stdout = RunLog::from_setting(Some(Path::new("-")));
    assert!(matches!(stdout.target, RunLogTarget::Stdout));
    let file = RunLog::from_setting(Some(Path::new("runs/log.jsonl")));
    assert!(matches!(file.target, RunLogTarget::File(ref p) if p == Path::new("runs/log.jsonl")));
    assert!(matches!(RunLog::from_setting(None).target, RunLogTarget::Discard));

    let mut trainer = RaftTrainer::new(
        policy(),
        reward_model(),
        loop_settings(1, SamplingMode::Placeholder),
    )
    .unwrap()
    .with_run_log(stdout);
    assert_eq!(trainer.run(PROMPT).unwrap().iterations.len(), 1);
}

#[test]
pub fn trainer_rejects_unusable_loop_settings() {
    let mut no_top_k = loop_settings(1, SamplingMode::Placeholder);
    no_top_k.top_k = 0;
    let err = RaftTrainer::new(policy(), reward_model(), no_top_k).err().unwrap();
    assert!(matches!(err, RaftError::Config { .. }), "{err}");

    let mut too_many = loop_settings(1, SamplingMode::Placeholder);
    too_many.top_k = too_many.candidates + 1;
    assert!(RaftTrainer::new(policy(), reward_model(), too_many).is_err());

    let mut frozen = loop_settings(1, SamplingMode::Policy);
    frozen.temperature = 0.0;
    assert!(RaftTrainer::new(policy(), reward_model(), frozen).is_err());
}

#[test]
pub fn fine_tuner_lowers_loss_on_repeated_samples() {
    let model = policy();
    let samples = vec![ScoredSample {
        text: "boil water and steep".to_string(),
        score: 1.0,
    }];
    let tuner = FineTuner::new(FineTuneSettings {
        epochs: 6,
        learning_rate: 1e-2,
    });
    let losses = tuner.run(&model, PROMPT, &samples).unwrap();
    assert_eq!(losses.len(), 6);
    assert!(losses.last().unwrap() < losses.first().unwrap());
}

#[test]
pub fn fine_tuner_ignores_empty_selections() {
    let model = policy();
    let tuner = FineTuner::new(FineTuneSettings {
        epochs: 3,
        learning_rate: 1e-2,
    });
    assert!(tuner.run(&model, PROMPT, &[]).unwrap().is_empty());
}
