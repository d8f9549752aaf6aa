//! Error handling for the RAFT lab
//!
//! Every library operation returns [`RaftResult`]. Binaries wrap these in
//! `anyhow` with context at the call site.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum RaftError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tensor operation failed: {operation} - {source}")]
    Tensor {
        operation: String,
        #[source]
        source: candle_core::Error,
    },

    #[error("Tokenizer error: {message}")]
    Tokenizer { message: String },

    #[error("Checkpoint error: {path} - {message}")]
    Checkpoint { path: String, message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {resource} - {id}")]
    NotFound { resource: String, id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type RaftResult<T> = Result<T, RaftError>;

impl RaftError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a tensor error tagged with the failing operation
    pub fn tensor(operation: impl Into<String>, source: candle_core::Error) -> Self {
        Self::Tensor {
            operation: operation.into(),
            source,
        }
    }

    /// Create a tokenizer error
    pub fn tokenizer(message: impl Into<String>) -> Self {
        Self::Tokenizer {
            message: message.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Checkpoint {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convert from candle errors
impl From<candle_core::Error> for RaftError {
    fn from(err: candle_core::Error) -> Self {
        RaftError::tensor("candle_operation", err)
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for RaftError {
    fn from(err: serde_json::Error) -> Self {
        RaftError::serialization("json_operation", err)
    }
}

/// Convert from std::io errors
impl From<std::io::Error> for RaftError {
    fn from(err: std::io::Error) -> Self {
        RaftError::io("io_operation", err)
    }
}

/// Convert from figment extraction errors
impl From<figment::Error> for RaftError {
    fn from(err: figment::Error) -> Self {
        RaftError::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = RaftError::config("top_k must be positive");
        assert!(config_err.to_string().contains("Configuration error"));

        let ckpt_err = RaftError::checkpoint("ckpt/model.safetensors", "hash mismatch");
        assert!(ckpt_err.to_string().contains("hash mismatch"));
        assert!(ckpt_err.to_string().contains("ckpt/model.safetensors"));
    }

    #[test]
    fn test_error_chaining() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let raft_err = RaftError::io("reading dataset", io_err);

        assert!(raft_err.source().is_some());
        assert!(raft_err.to_string().contains("I/O operation failed"));
    }

    #[test]
    fn test_candle_error_converts() {
        let err: RaftError = candle_core::Error::Msg("shape mismatch".into()).into();
        assert!(matches!(err, RaftError::Tensor { .. }));
        assert!(err.to_string().contains("shape mismatch"));
    }
}
