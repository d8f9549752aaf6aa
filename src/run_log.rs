// run_log.rs
// Purpose: Append one JSON record per RAFT iteration to a file, stdout, or nowhere

use crate::errors::{RaftError, RaftResult};
use crate::ranker::ScoreSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    pub run_id: String,
    pub iteration: usize,
    pub candidates: usize,
    pub scores: Option<ScoreSummary>,
    pub top_k: Vec<String>,
    pub finetune_losses: Vec<f32>,
    pub timestamp: DateTime<Utc>,
}

pub enum RunLogTarget {
    Stdout,
    File(PathBuf),
    Discard,
}

pub struct RunLog {
    pub target: RunLogTarget,
}

impl RunLog {
    pub fn new(target: RunLogTarget) -> Self {
        Self { target }
    }

    pub fn discard() -> Self {
        Self::new(RunLogTarget::Discard)
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self::new(RunLogTarget::File(path.into()))
    }

    /// Target named by `logging.run_log`: `-` is stdout, any other path a file.
    pub fn from_setting(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path == Path::new("-") => Self::new(RunLogTarget::Stdout),
            Some(path) => Self::to_file(path),
            None => Self::discard(),
        }
    }

    pub fn emit(&self, record: &IterationRecord) -> RaftResult<()> {
        match &self.target {
            RunLogTarget::Stdout => {
                println!("{}", serde_json::to_string(record)?);
            }
            RunLogTarget::File(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| RaftError::io(format!("opening run log {}", path.display()), e))?;
                writeln!(file, "{}", serde_json::to_string(record)?)
                    .map_err(|e| RaftError::io("writing run log record", e))?;
            }
            RunLogTarget::Discard => {}
        }
        Ok(())
    }
}

/// Read back every record of a JSON-lines run log.
pub fn read_records(path: &Path) -> RaftResult<Vec<IterationRecord>> {
    let content = fs::read_to_string(path)
        .map_err(|e| RaftError::io(format!("reading run log {}", path.display()), e))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(RaftError::from))
        .collect()
}
