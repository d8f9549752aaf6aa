// dataset.rs
// Purpose: (prompt, response, label) preference triples used to train the reward classifier

use crate::errors::{RaftError, RaftResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Label 1 marks a preferred response, 0 a rejected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceExample {
    pub prompt: String,
    pub response: String,
    pub label: u32,
}

impl PreferenceExample {
    pub fn new(prompt: &str, response: &str, label: u32) -> Self {
        Self {
            prompt: prompt.to_string(),
            response: response.to_string(),
            label,
        }
    }

    /// The text the classifier sees.
    pub fn text(&self) -> String {
        join_prompt(&self.prompt, &self.response)
    }
}

pub fn join_prompt(prompt: &str, response: &str) -> String {
    format!("{prompt} {response}")
}

/// The built-in walkthrough dataset.
pub fn default_examples() -> Vec<PreferenceExample> {
    vec![
        PreferenceExample::new(
            "How do I make tea?",
            "Boil water, steep the tea leaves for three minutes and serve warm.",
            1,
        ),
        PreferenceExample::new(
            "How do I make tea?",
            "I do not know, figure it out yourself.",
            0,
        ),
        PreferenceExample::new(
            "What is the capital of France?",
            "The capital of France is Paris.",
            1,
        ),
        PreferenceExample::new(
            "What is the capital of France?",
            "France is a country, nobody cares about capitals.",
            0,
        ),
        PreferenceExample::new(
            "Can you help me write an email?",
            "Sure, tell me who the email is for and what you want to say.",
            1,
        ),
        PreferenceExample::new(
            "Can you help me write an email?",
            "No. Write it yourself.",
            0,
        ),
        PreferenceExample::new(
            "Explain photosynthesis.",
            "Plants use sunlight, water and carbon dioxide to make sugar and release oxygen.",
            1,
        ),
        PreferenceExample::new(
            "Explain photosynthesis.",
            "It is boring, I will not explain it.",
            0,
        ),
    ]
}

/// Read a JSON-lines dataset. Blank lines are skipped.
pub fn load_jsonl(path: impl AsRef<Path>) -> RaftResult<Vec<PreferenceExample>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RaftError::not_found("dataset", path.display().to_string()));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| RaftError::io(format!("reading dataset {}", path.display()), e))?;

    let mut examples = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let example: PreferenceExample = serde_json::from_str(line).map_err(|e| {
            RaftError::serialization(format!("{} line {}", path.display(), idx + 1), e)
        })?;
        if example.label > 1 {
            return Err(RaftError::validation(
                format!("label (line {})", idx + 1),
                format!("expected 0 or 1, got {}", example.label),
            ));
        }
        examples.push(example);
    }

    if examples.is_empty() {
        return Err(RaftError::validation("dataset", "no examples found"));
    }
    Ok(examples)
}

/// Every text in the dataset, prompts included, for vocabulary construction.
pub fn corpus(examples: &[PreferenceExample]) -> Vec<String> {
    examples
        .iter()
        .flat_map(|e| [e.prompt.clone(), e.response.clone()])
        .collect()
}
