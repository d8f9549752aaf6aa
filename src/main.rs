// raft_lab - main.rs
// Bootstrap runner: parse arguments, layer configuration, install logging, dispatch

use clap::Parser;
use raft_lab::cli::{dispatch, Cli};
use raft_lab::config_loader::load_config;
use raft_lab::telemetry::init_tracing;
use std::process::exit;

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Failed to load config: {e}");
            exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("⚠️ Logging unavailable: {e}");
    }

    if let Err(e) = dispatch(cli, config) {
        eprintln!("❌ {e:#}");
        exit(1);
    }
}
