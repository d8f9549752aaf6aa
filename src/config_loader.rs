use crate::config::RaftConfig;
use crate::errors::RaftResult;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "raft.toml";

/// Layered configuration: built-in defaults, then the TOML file, then
/// `RAFT_`-prefixed environment variables (`__` separates sections, e.g.
/// `RAFT_RAFT__TOP_K=4`).
pub fn figment(path: Option<&Path>) -> Figment {
    let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    Figment::from(Serialized::defaults(RaftConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed("RAFT_").split("__"))
}

pub fn load_config(path: Option<&Path>) -> RaftResult<RaftConfig> {
    let config: RaftConfig = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}
