// trainer.rs
// Train the reward classifier on a preference dataset and export a checkpoint with its manifest

use anyhow::Context;
use clap::Parser;
use raft_lab::config_loader::load_config;
use raft_lab::dataset;
use raft_lab::reward_model::RewardModel;
use raft_lab::telemetry::init_tracing;
use raft_lab::tokenizer::TextTokenizer;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Reward classifier trainer", long_about = None)]
struct Args {
    /// JSON-lines dataset with prompt, response and label fields
    #[clap(short, long)]
    data: Option<PathBuf>,

    /// Checkpoint directory (model.safetensors, manifest.json, tokenizer.json)
    #[clap(short, long, default_value = "checkpoints/reward")]
    output: PathBuf,

    /// Overrides reward.epochs
    #[clap(short, long)]
    epochs: Option<usize>,

    #[clap(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref()).context("loading configuration")?;
    if let Some(epochs) = args.epochs {
        config.reward.epochs = epochs;
    }
    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("⚠️ Logging unavailable: {e}");
    }

    let examples = match &args.data {
        Some(path) => dataset::load_jsonl(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => dataset::default_examples(),
    };
    println!("Loaded {} preference examples.", examples.len());

    let tokenizer = TextTokenizer::from_corpus(&dataset::corpus(&examples))?;
    println!("Vocabulary size: {}", tokenizer.vocab_size());

    let mut model = RewardModel::new(
        tokenizer,
        config.reward.clone(),
        config.runtime.device(),
        config.runtime.seed,
    )?;

    println!("Starting training...");
    let losses = model.train(&examples, config.reward.epochs)?;
    for (epoch, loss) in losses.iter().enumerate() {
        println!("Epoch {}/{}, Loss: {:.6}", epoch + 1, losses.len(), loss);
    }
    println!("Training complete.");

    let manifest = model
        .save(&args.output)
        .with_context(|| format!("saving checkpoint to {}", args.output.display()))?;
    println!("✅ Model exported to: {}", args.output.join(&manifest.model_file).display());
    println!("✅ Manifest created: {}", args.output.join(raft_lab::checkpoint::MANIFEST_FILE).display());
    println!("   SHA256: {}", manifest.sha256);

    Ok(())
}
