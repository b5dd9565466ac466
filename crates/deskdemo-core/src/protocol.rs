//! Relay event protocol.
//!
//! The relay answers `POST /api/chat` with `text/event-stream` lines of the
//! form `data: <json>`, where the JSON is a [`RelayEvent`], and always ends
//! with `data: [DONE]`.

use serde::{Deserialize, Serialize};

/// Payload of the final line of every relay stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Prefix of every SSE data line.
pub const DATA_PREFIX: &str = "data:";

/// An event pushed from the relay to the chat client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Incremental assistant text.
    TextDelta { text: String },
    /// The agent started using a tool.
    ToolStart { tool: String },
    /// A tool is still running.
    ToolProgress { tool: String, elapsed: f64 },
    /// The agent finished successfully.
    Done,
    /// The agent failed; no more events follow.
    Error { error: String },
}

impl RelayEvent {
    /// Whether this event ends the agent's part of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayEvent::Done | RelayEvent::Error { .. })
    }

    /// JSON payload for an SSE `data:` field.
    pub fn to_data(&self) -> String {
        // Serializing a plain tagged enum of strings and floats cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","error":"failed to encode event"}"#.to_string()
        })
    }
}

/// A decoded line of a relay stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Event(RelayEvent),
    /// The `[DONE]` sentinel.
    End,
}

/// Decode one line of a relay stream.
///
/// Returns `None` for blank lines, comments, non-data fields and data that
/// does not decode; a half-received or unknown event is skipped rather than
/// aborting the stream.
pub fn parse_data_line(line: &str) -> Option<StreamFrame> {
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload == DONE_SENTINEL {
        return Some(StreamFrame::End);
    }

    serde_json::from_str::<RelayEvent>(payload)
        .ok()
        .map(StreamFrame::Event)
}
