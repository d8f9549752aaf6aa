use crate::architectures::{self, ArchitectureKind};
use crate::checkpoint;
use crate::clip::{self, DualEncoder, DualEncoderConfig, ImageTextScorer, PretrainedClip};
use crate::config::{RaftConfig, SamplingMode};
use crate::dataset::{self, PreferenceExample};
use crate::errors::RaftResult;
use crate::generator::PolicyModel;
use crate::raft::{RaftReport, RaftTrainer};
use crate::reward_model::RewardModel;
use crate::run_log::RunLog;
use crate::tokenizer::TextTokenizer;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level CLI interface for the RAFT lab
#[derive(Parser)]
#[command(
    name = "raft_lab",
    version,
    about = "Reward-ranked fine-tuning, image/text scoring and an architecture tour"
)]
pub struct Cli {
    /// Configuration file (defaults to raft.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a reward model, then run generate/rank/fine-tune rounds on a prompt
    Raft {
        #[arg(short, long)]
        prompt: String,
        /// Overrides raft.iterations
        #[arg(short, long)]
        iterations: Option<usize>,
        /// JSON-lines preference dataset (defaults to the built-in examples)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Use fixed placeholder completions instead of sampling the policy
        #[arg(long)]
        placeholder: bool,
        /// Save the reward model and tuned policy under this directory
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Score a text with a reward model
    Score {
        #[arg(short, long)]
        text: String,
        /// Reward checkpoint directory; a fresh model is trained when omitted
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Rank captions against an image stored as a (3, H, W) .npy array
    ClipScore {
        #[arg(long)]
        image: PathBuf,
        #[arg(long = "caption", required = true)]
        captions: Vec<String>,
        /// CLIP ViT-B/32 safetensors weights
        #[arg(long, requires = "tokenizer")]
        weights: Option<PathBuf>,
        /// CLIP tokenizer.json
        #[arg(long, requires = "weights")]
        tokenizer: Option<PathBuf>,
    },

    /// Build and exercise the tutorial architectures
    Zoo {
        /// Only this architecture (feedforward, convolutional, recurrent, lstm, transformer, autoencoder, gan)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Check a checkpoint's weights against its manifest hash
    VerifyCheckpoint {
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

fn load_examples(data: Option<&Path>) -> RaftResult<Vec<PreferenceExample>> {
    match data {
        Some(path) => dataset::load_jsonl(path),
        None => Ok(dataset::default_examples()),
    }
}

/// Tokenizer over the dataset plus any extra texts (the prompt, typically),
/// then a reward classifier trained for `reward.epochs`.
pub fn train_reward_model(
    config: &RaftConfig,
    examples: &[PreferenceExample],
    extra_texts: &[&str],
) -> RaftResult<RewardModel> {
    let mut texts = dataset::corpus(examples);
    texts.extend(extra_texts.iter().map(|t| t.to_string()));
    let tokenizer = TextTokenizer::from_corpus(&texts)?;

    let mut reward = RewardModel::new(
        tokenizer,
        config.reward.clone(),
        config.runtime.device(),
        config.runtime.seed,
    )?;
    let losses = reward.train(examples, config.reward.epochs)?;
    if let (Some(first), Some(last)) = (losses.first(), losses.last()) {
        info!(epochs = losses.len(), first, last, "reward model trained");
    }
    Ok(reward)
}

fn run_raft(
    config: &RaftConfig,
    prompt: &str,
    iterations: Option<usize>,
    data: Option<&Path>,
    placeholder: bool,
    save: Option<&Path>,
) -> anyhow::Result<RaftReport> {
    let examples = load_examples(data).context("loading preference data")?;
    let reward = train_reward_model(config, &examples, &[prompt]).context("training reward model")?;

    let mut settings = config.raft.clone();
    if let Some(n) = iterations {
        settings.iterations = n;
    }
    if placeholder {
        settings.sampling = SamplingMode::Placeholder;
    }

    let policy = PolicyModel::new(
        reward.tokenizer().clone(),
        config.policy.clone(),
        config.runtime.device(),
        config.runtime.seed,
    )?;
    let run_log = RunLog::from_setting(config.logging.run_log.as_deref());

    let save_dir = save
        .map(Path::to_path_buf)
        .or_else(|| config.checkpoint.save_policy.then(|| config.checkpoint.dir.clone()));
    // The reward model is frozen during the run, so it can be written up front.
    if let Some(dir) = &save_dir {
        let manifest = reward.save(&dir.join("reward"))?;
        println!("✅ Reward model saved to {} (sha256 {})", dir.join("reward").display(), manifest.sha256);
    }

    let mut trainer = RaftTrainer::new(policy, reward, settings)?.with_run_log(run_log);
    let report = trainer.run(prompt).context("RAFT run failed")?;

    if let Some(dir) = save_dir {
        let policy = trainer.into_policy();
        let manifest = policy.save(&dir.join("policy"))?;
        println!("✅ Policy saved to {} (sha256 {})", dir.join("policy").display(), manifest.sha256);
    }
    Ok(report)
}

fn print_report(report: &RaftReport) {
    println!("RAFT run {} on prompt {:?}", report.run_id, report.prompt);
    for record in &report.iterations {
        let (best, mean) = record
            .scores
            .map(|s| (s.best, s.mean))
            .unwrap_or((f32::NAN, f32::NAN));
        let loss = record.finetune_losses.last().copied().unwrap_or(f32::NAN);
        println!(
            "  iteration {}: best {:.4}, mean {:.4}, final loss {:.4}",
            record.iteration, best, mean, loss
        );
        if let Some(top) = record.top_k.first() {
            println!("    top: {top}");
        }
    }
}

fn clip_scores(
    config: &RaftConfig,
    image: &Path,
    captions: &[String],
    weights: Option<&Path>,
    tokenizer: Option<&Path>,
) -> anyhow::Result<Vec<(String, f32)>> {
    let device = config.runtime.device();
    let pixels = clip::load_image_npy(image, &device)?;
    let ranked = match (weights, tokenizer) {
        (Some(weights), Some(tokenizer)) => {
            let model = PretrainedClip::load(weights, tokenizer, device)
                .context("loading pretrained CLIP")?;
            model.rank_captions(&pixels, captions)?
        }
        _ => {
            tracing::warn!("no CLIP weights given, scoring with an untrained dual encoder");
            let tokenizer = TextTokenizer::from_corpus(captions)?;
            let model = DualEncoder::new(
                tokenizer,
                DualEncoderConfig::default(),
                device,
                config.runtime.seed,
            )?;
            model.rank_captions(&pixels, captions)?
        }
    };
    Ok(ranked)
}

/// Dispatch CLI commands to their respective handlers
pub fn dispatch(cli: Cli, config: RaftConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Raft {
            prompt,
            iterations,
            data,
            placeholder,
            save,
        } => {
            let report = run_raft(
                &config,
                &prompt,
                iterations,
                data.as_deref(),
                placeholder,
                save.as_deref(),
            )?;
            print_report(&report);
        }
        Commands::Score {
            text,
            checkpoint,
            data,
        } => {
            let reward = match checkpoint {
                Some(dir) => RewardModel::load(&dir, config.reward.clone(), config.runtime.device())
                    .with_context(|| format!("loading reward model from {}", dir.display()))?,
                None => {
                    let examples = load_examples(data.as_deref())?;
                    train_reward_model(&config, &examples, &[])?
                }
            };
            let score = reward.score(&text)?;
            println!("{score:.6}\t{text}");
        }
        Commands::ClipScore {
            image,
            captions,
            weights,
            tokenizer,
        } => {
            let ranked = clip_scores(
                &config,
                &image,
                &captions,
                weights.as_deref(),
                tokenizer.as_deref(),
            )?;
            for (caption, prob) in ranked {
                println!("{prob:.4}\t{caption}");
            }
        }
        Commands::Zoo { kind } => {
            let kinds = match kind {
                Some(name) => vec![name.parse::<ArchitectureKind>()?],
                None => ArchitectureKind::all().to_vec(),
            };
            let device = config.runtime.device();
            for kind in kinds {
                let report = architectures::demo(kind, &device, config.runtime.seed)
                    .with_context(|| format!("{kind} demo failed"))?;
                let losses: Vec<String> = report.losses.iter().map(|l| format!("{l:.4}")).collect();
                println!(
                    "{:<14} params {:>7}  {:?} -> {:?}  losses [{}]",
                    report.kind.name(),
                    report.parameters,
                    report.input_shape,
                    report.output_shape,
                    losses.join(", ")
                );
            }
        }
        Commands::VerifyCheckpoint { dir } => {
            let manifest = checkpoint::verify(&dir)?;
            println!("✅ {} matches its manifest", dir.display());
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}
