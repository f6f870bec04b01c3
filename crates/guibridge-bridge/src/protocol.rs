use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Correlation id of the startup announcement.
pub const READY_ID: &str = "ready";
/// Event type emitted for user-interaction callbacks.
pub const EVENT_CALLBACK: &str = "callback";

/// A host request: correlation id, verb and key/value payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    #[serde(rename = "type")]
    pub verb: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub payload: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Command {
    /// Create a command with an empty payload.
    pub fn new(id: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verb: verb.into(),
            payload: Map::new(),
        }
    }

    /// Builder-style payload field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Required string field.
    pub fn str_field(&self, key: &str) -> Result<&str, HandlerError> {
        match self.payload.get(key) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(invalid(key, "must be a string")),
            None => Err(invalid(key, "is required")),
        }
    }

    /// Optional string field; `null` counts as absent.
    pub fn opt_str_field(&self, key: &str) -> Result<Option<&str>, HandlerError> {
        match self.payload.get(key) {
            Some(Value::String(value)) => Ok(Some(value)),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(invalid(key, "must be a string")),
        }
    }

    /// List of strings; absent or `null` is an empty list.
    pub fn str_list_field(&self, key: &str) -> Result<Vec<&str>, HandlerError> {
        match self.payload.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().ok_or_else(|| invalid(key, "must hold only strings")))
                .collect(),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(invalid(key, "must be an array")),
        }
    }
}

fn invalid(key: &str, problem: &str) -> HandlerError {
    HandlerError::InvalidPayload(format!("{key} {problem}"))
}

/// The single reply to a [`Command`], correlated by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Success without a result body.
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: None,
            error: None,
        }
    }

    /// Success carrying a result body.
    pub fn with_result(id: impl Into<String>, result: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failure with a descriptive error string.
    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Startup announcement the host waits for before sending commands.
    pub fn ready() -> Self {
        Self::ok(READY_ID)
    }
}

/// An unsolicited notification, not correlated to any command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "widgetId", default, skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl Event {
    /// Create a callback event.
    pub fn callback(widget_id: Option<&str>, data: Map<String, Value>) -> Self {
        Self {
            event_type: EVENT_CALLBACK.to_string(),
            widget_id: widget_id.map(str::to_string),
            data: Some(data),
        }
    }
}

/// Anything the worker writes to its output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Response(Response),
    Event(Event),
}

impl OutboundMessage {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Response(_) => "response",
            Self::Event(_) => "event",
        }
    }
}

impl From<Response> for OutboundMessage {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Event> for OutboundMessage {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}
