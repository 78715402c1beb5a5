//! Error taxonomy shared by every engine operation.
//!
//! Callers match on [`Error`] to tell "the system is broken" apart from
//! "the caller asked for something invalid". An absent collection at query
//! time is deliberately not represented here: retrieval reports it as an
//! empty result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The vector store could not be reached or did not report ready.
    #[error("vector store unreachable at {endpoint}: {reason}")]
    Connectivity { endpoint: String, reason: String },

    /// An embedding or reranking model failed to initialise.
    #[error("failed to load {kind} model '{model}': {reason}")]
    ModelLoad {
        kind: ModelKind,
        model: String,
        reason: String,
    },

    /// Invalid call parameters, rejected before any I/O.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// A loaded model produced unusable output.
    #[error("model inference failed: {0}")]
    Inference(String),

    /// The store answered, but with an error.
    #[error("vector store request failed: {0}")]
    Store(String),
}

/// Which model slot an [`Error::ModelLoad`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Embedding,
    Reranking,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Embedding => f.write_str("embedding"),
            ModelKind::Reranking => f.write_str("reranking"),
        }
    }
}

impl Error {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connectivity { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check a collection name against the store's class-name rule:
/// an ASCII uppercase letter followed by ASCII alphanumerics or `_`.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_uppercase() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "collection name '{}' must start with an uppercase ASCII letter and contain only [A-Za-z0-9_]",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert!(validate_collection_name("Docs").is_ok());
        assert!(validate_collection_name("Team_Notes2").is_ok());
        assert!(validate_collection_name("docs").unwrap_err().is_validation());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("Docs-v2").is_err());
    }

    #[test]
    fn test_messages_are_distinguishable() {
        let conn = Error::Connectivity {
            endpoint: "http://localhost:8080".into(),
            reason: "connection refused".into(),
        };
        assert!(conn.is_connectivity());
        assert!(conn.to_string().contains("unreachable"));

        let load = Error::ModelLoad {
            kind: ModelKind::Reranking,
            model: "bge-reranker-base".into(),
            reason: "weights missing".into(),
        };
        assert!(!load.is_connectivity());
        assert_eq!(
            load.to_string(),
            "failed to load reranking model 'bge-reranker-base': weights missing"
        );
    }
}
