//! Routing of inbound Commands to verb handlers.
//!
//! The dispatcher owns the "exactly one Response per Command" rule: handlers
//! return a [`Reply`] or a [`HandlerError`] and never write to the channel,
//! so every outcome, including a handler panic, becomes one Response.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use guibridge_frame::{FrameError, ReadFrame};
use serde_json::{Map, Value};

use crate::error::HandlerError;
use crate::handlers;
use crate::lifecycle::Bridge;
use crate::protocol::{Command, Response};

pub type HandlerResult = Result<Reply, HandlerError>;

/// A verb implementation.
pub trait Handler: Send + Sync {
    fn handle(&self, bridge: &Bridge, command: &Command) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&Bridge, &Command) -> HandlerResult + Send + Sync,
{
    fn handle(&self, bridge: &Bridge, command: &Command) -> HandlerResult {
        self(bridge, command)
    }
}

/// What happens after the Response is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FollowUp {
    #[default]
    Continue,
    /// Send the Response as the final frame and stop the toolkit.
    Shutdown,
}

/// Successful handler outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub result: Option<Map<String, Value>>,
    pub follow_up: FollowUp,
}

impl Reply {
    /// Success with no result body.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_result(result: Map<String, Value>) -> Self {
        Self {
            result: Some(result),
            follow_up: FollowUp::Continue,
        }
    }

    /// Success with a JSON result.
    ///
    /// Objects become the result body, `null` means no body, and any other
    /// value is wrapped as `{"value": ...}`.
    pub fn json(value: Value) -> Self {
        match value {
            Value::Object(result) => Self::with_result(result),
            Value::Null => Self::ok(),
            other => {
                let mut result = Map::new();
                result.insert("value".to_string(), other);
                Self::with_result(result)
            }
        }
    }

    /// Success that ends the session.
    pub fn shutdown() -> Self {
        Self {
            result: None,
            follow_up: FollowUp::Shutdown,
        }
    }
}

/// Verb to handler routing table.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table of built-in window, widget, dialog and inspection verbs.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        handlers::register_builtin(&mut table);
        table
    }

    /// Add or replace the handler for `verb`. Returns the replaced handler.
    pub fn register<H>(&mut self, verb: impl Into<String>, handler: H) -> Option<Arc<dyn Handler>>
    where
        H: Handler + 'static,
    {
        self.handlers.insert(verb.into(), Arc::new(handler))
    }

    pub fn get(&self, verb: &str) -> Option<&dyn Handler> {
        self.handlers.get(verb).map(|handler| handler.as_ref())
    }

    pub fn contains(&self, verb: &str) -> bool {
        self.handlers.contains_key(verb)
    }

    /// Registered verbs, sorted.
    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("verbs", &self.verbs())
            .finish()
    }
}

/// What to do with an inbound frame that fails its checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorruptFramePolicy {
    /// Stop reading; the stream cannot be trusted.
    #[default]
    Close,
    /// Drop the frame and resume at the next declared frame boundary.
    Skip,
}

/// Why the inbound loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// A quit Command or quit request ended the session.
    Quit,
    /// The host closed the inbound stream.
    Closed,
    /// A corrupt frame arrived under [`CorruptFramePolicy::Close`].
    Corrupt,
    /// The inbound stream failed.
    Failed(String),
}

/// Route one Command and produce its Response.
pub fn dispatch(bridge: &Bridge, command: &Command) -> (Response, FollowUp) {
    bridge.count_command();
    let id = command.id.as_str();
    let verb = command.verb.as_str();

    let Some(handler) = bridge.handlers().get(verb) else {
        tracing::warn!(id, verb, "unknown message type");
        return (
            Response::failure(id, format!("Unknown message type: {verb}")),
            FollowUp::Continue,
        );
    };

    #[cfg(feature = "schema")]
    if let Some(schemas) = bridge.schemas() {
        let payload = Value::Object(command.payload.clone());
        if let Err(err) = schemas.validate(verb, &payload) {
            tracing::debug!(id, verb, error = %err, "payload rejected by schema");
            return (
                Response::failure(id, format!("schema validation error: {err}")),
                FollowUp::Continue,
            );
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(bridge, command))) {
        Ok(Ok(reply)) => {
            tracing::debug!(id, verb, "command handled");
            let response = Response {
                id: command.id.clone(),
                success: true,
                result: reply.result,
                error: None,
            };
            (response, reply.follow_up)
        }
        Ok(Err(err)) => {
            tracing::debug!(id, verb, error = %err, "command failed");
            (Response::failure(id, err.to_string()), FollowUp::Continue)
        }
        Err(_) => {
            tracing::error!(id, verb, "handler panicked");
            (
                Response::failure(id, format!("handler panicked: {verb}")),
                FollowUp::Continue,
            )
        }
    }
}

/// Read, decode, and dispatch frames until the stream ends, a quit Command
/// arrives, or the bridge stops running.
pub fn run_loop<R>(bridge: &Bridge, inbound: &mut R) -> LoopExit
where
    R: ReadFrame + ?Sized,
{
    let policy = bridge.config().corrupt_policy;

    loop {
        let frame = match inbound.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                tracing::info!("inbound stream closed");
                return LoopExit::Closed;
            }
            Err(FrameError::Corrupt { expected, actual }) => match policy {
                CorruptFramePolicy::Close => {
                    tracing::error!(expected, actual, "corrupt inbound frame; closing stream");
                    return LoopExit::Corrupt;
                }
                CorruptFramePolicy::Skip => {
                    tracing::warn!(expected, actual, "skipping corrupt inbound frame");
                    continue;
                }
            },
            Err(err) => {
                tracing::error!(error = %err, "inbound stream failed");
                return LoopExit::Failed(err.to_string());
            }
        };

        if !bridge.state().accepts_commands() {
            tracing::debug!(size = frame.len(), "bridge stopping; frame dropped");
            return LoopExit::Quit;
        }

        let command: Command = match serde_json::from_slice(&frame.payload) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(size = frame.len(), error = %err, "skipping undecodable command");
                continue;
            }
        };

        let (response, follow_up) = dispatch(bridge, &command);
        match follow_up {
            FollowUp::Continue => {
                // Failures are logged by the channel; the loop carries on.
                let _ = bridge.outbound().send(&response.into());
            }
            FollowUp::Shutdown => {
                bridge.finish_with(response);
                return LoopExit::Quit;
            }
        }
    }
}
