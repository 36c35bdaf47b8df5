//! Client control-frame translation.
//!
//! Maps client structured frames to the frames the upstream understands. The
//! only built-in rule turns a client `stop` into the upstream interrupt frame;
//! further actions are registered in an action table so the pumps never
//! change when the protocol grows.

use std::collections::HashMap;

use serde_json::{Value, json};

use super::frame::{StructuredFrame, UpstreamFrame};

/// Interrupt frame used when none is configured.
pub fn default_interrupt_frame() -> Value {
    json!({"type": "response.cancel"})
}

/// Pure mapping from client structured frames to upstream frames.
#[derive(Debug, Clone)]
pub struct ControlTranslator {
    interrupt_frame: String,
    actions: HashMap<String, String>,
}

impl Default for ControlTranslator {
    fn default() -> Self {
        Self::new(&default_interrupt_frame())
    }
}

impl ControlTranslator {
    /// Create a translator that emits `interrupt_frame` for client `stop`.
    pub fn new(interrupt_frame: &Value) -> Self {
        Self {
            interrupt_frame: interrupt_frame.to_string(),
            actions: HashMap::new(),
        }
    }

    /// Map an additional control `action` to an upstream frame.
    pub fn with_action(mut self, action: impl Into<String>, frame: &Value) -> Self {
        self.actions.insert(action.into(), frame.to_string());
        self
    }

    /// Build a translator from an interrupt frame and an action table.
    pub fn from_parts(interrupt_frame: &Value, actions: &HashMap<String, Value>) -> Self {
        actions
            .iter()
            .fold(Self::new(interrupt_frame), |translator, (action, frame)| {
                translator.with_action(action.clone(), frame)
            })
    }

    /// Translate one client structured frame.
    pub fn translate(&self, frame: StructuredFrame) -> UpstreamFrame {
        match frame {
            StructuredFrame::Stop => UpstreamFrame::Text(self.interrupt_frame.clone()),
            StructuredFrame::Other { action, raw } => {
                let mapped = action.and_then(|action| self.actions.get(&action));
                UpstreamFrame::Text(mapped.cloned().unwrap_or(raw))
            }
            StructuredFrame::Unparseable(raw) => UpstreamFrame::Text(raw),
        }
    }

    /// Classify and translate a raw client text frame.
    pub fn translate_text(&self, text: &str) -> UpstreamFrame {
        self.translate(StructuredFrame::parse(text))
    }
}
