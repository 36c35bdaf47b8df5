//! Frame types flowing through the relay.

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// `type` value of client control frames.
pub const CONTROL_TYPE: &str = "control";

/// `action` value of the client interrupt request.
pub const STOP_ACTION: &str = "stop";

/// A client text frame, classified for the control translator.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredFrame {
    /// `{"type":"control","action":"stop"}`
    Stop,
    /// Any other JSON object. `raw` is the text as received; parsing only
    /// decides the classification.
    Other {
        /// `action` of a `{"type":"control"}` frame
        action: Option<String>,
        raw: String,
    },
    /// Text that is not a JSON object, kept as received
    Unparseable(String),
}

impl StructuredFrame {
    /// Classify a client text frame.
    ///
    /// Only JSON objects are considered structured. Arrays, scalars and
    /// invalid JSON are [`StructuredFrame::Unparseable`].
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => match control_action(&fields) {
                Some(STOP_ACTION) => StructuredFrame::Stop,
                action => StructuredFrame::Other {
                    action: action.map(str::to_string),
                    raw: text.to_string(),
                },
            },
            _ => StructuredFrame::Unparseable(text.to_string()),
        }
    }
}

fn control_action(fields: &Map<String, Value>) -> Option<&str> {
    if fields.get("type").and_then(Value::as_str) == Some(CONTROL_TYPE) {
        fields.get("action").and_then(Value::as_str)
    } else {
        None
    }
}

/// A frame bound for the upstream connection.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamFrame {
    Binary(Bytes),
    Text(String),
}

impl UpstreamFrame {
    pub fn len(&self) -> usize {
        match self {
            UpstreamFrame::Binary(data) => data.len(),
            UpstreamFrame::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<UpstreamFrame> for UpstreamMessage {
    fn from(frame: UpstreamFrame) -> Self {
        match frame {
            UpstreamFrame::Binary(data) => UpstreamMessage::Binary(data),
            UpstreamFrame::Text(text) => UpstreamMessage::Text(text.into()),
        }
    }
}
