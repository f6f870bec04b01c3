use std::path::PathBuf;

/// Errors raised while loading schemas or checking payloads against them.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("cannot load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("schema for {verb} does not compile: {reason}")]
    Compile { verb: String, reason: String },

    /// The payload broke one or more schema rules.
    #[error("{verb} payload rejected: {}", .violations.join("; "))]
    Rejected {
        verb: String,
        violations: Vec<String>,
    },

    #[error("schema source is not JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Only raised when schemas are required for every verb.
    #[error("no schema registered for {0}")]
    NoSchema(String),
}

impl SchemaError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
