/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Frame-level error on either stream.
    #[error("frame error: {0}")]
    Frame(#[from] guibridge_frame::FrameError),

    /// An outbound message could not be serialized.
    #[error("marshal error: {0}")]
    Marshal(#[from] serde_json::Error),

    /// The event path has shut down.
    #[error("event channel closed")]
    Closed,

    /// The GUI toolkit refused an operation.
    #[error("toolkit error: {0}")]
    Toolkit(String),

    /// Schema registry error.
    #[cfg(feature = "schema")]
    #[error("schema error: {0}")]
    Schema(#[from] guibridge_schema::SchemaError),

    /// `start` was called on a bridge that already ran.
    #[error("bridge already started")]
    AlreadyStarted,

    /// A worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// A per-command failure. Its `Display` text is the `error` string of the
/// failure Response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// A referenced window, widget or parent id is not registered.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The widget lacks the capability the verb needs.
    #[error("Widget does not support {0}")]
    Unsupported(&'static str),

    /// A payload field is missing or has the wrong type.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Any other failure reported by a handler or the toolkit.
    #[error("{0}")]
    Failed(String),
}

impl From<BridgeError> for HandlerError {
    fn from(err: BridgeError) -> Self {
        Self::Failed(err.to_string())
    }
}
