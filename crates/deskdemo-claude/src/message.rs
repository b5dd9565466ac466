use serde::Deserialize;
use tracing::debug;

use crate::error::Result;

/// One thing the agent did, as seen by the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Incremental assistant text.
    TextDelta(String),
    /// The agent started a tool call.
    ToolStart { name: String },
    /// A running tool reported how long it has been going.
    ToolProgress { name: String, elapsed_secs: f64 },
    /// The query finished, successfully or not.
    Finished(ResultSummary),
}

/// The final `result` line of a query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultSummary {
    /// `success`, `error_max_turns`, `error_during_execution`, ...
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ResultSummary {
    pub fn is_success(&self) -> bool {
        self.subtype == "success" && !self.is_error
    }

    /// Human-readable reason for a failed result.
    pub fn failure_reason(&self) -> String {
        match self.subtype.as_str() {
            "error_max_turns" => "agent reached its maximum number of turns".to_string(),
            "error_during_execution" => "agent failed during execution".to_string(),
            other => self
                .result
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| format!("agent finished with {other}")),
        }
    }
}

// ============================================================================
// CLI stream-json envelope types
// ============================================================================

/// Top-level line from `claude -p --output-format stream-json`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CliLine {
    /// Raw API streaming event (only with `--include-partial-messages`).
    StreamEvent { event: StreamEventBody },
    /// A complete assistant message.
    Assistant { message: CliApiMessage },
    ToolProgress {
        tool_name: String,
        #[serde(default)]
        elapsed_time_seconds: f64,
    },
    Result(ResultSummary),
    /// `system`, `user` and anything newer than this parser.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEventBody {
    ContentBlockStart { content_block: ContentBlock },
    ContentBlockDelta { delta: Delta },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CliApiMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

/// Parses stream-json lines into [`AgentEvent`]s.
///
/// With partial messages enabled, text and tool starts are taken from the
/// raw `stream_event` lines and the complete `assistant` messages that
/// follow are ignored, so nothing is reported twice. Without them, the
/// complete messages are the only source.
#[derive(Debug, Clone, Copy)]
pub struct MessageParser {
    partial_messages: bool,
}

impl MessageParser {
    pub fn new(partial_messages: bool) -> Self {
        Self { partial_messages }
    }

    /// Parse one output line. Blank lines and uninteresting envelopes
    /// produce no events.
    pub fn parse_line(&self, line: &str) -> Result<Vec<AgentEvent>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Vec::new());
        }

        let parsed: CliLine = serde_json::from_str(line)?;
        let events = match parsed {
            CliLine::StreamEvent { event } if self.partial_messages => match event {
                StreamEventBody::ContentBlockDelta {
                    delta: Delta::TextDelta { text },
                } if !text.is_empty() => vec![AgentEvent::TextDelta(text)],
                StreamEventBody::ContentBlockStart {
                    content_block: ContentBlock::ToolUse { name },
                } => vec![AgentEvent::ToolStart { name }],
                _ => Vec::new(),
            },
            CliLine::StreamEvent { .. } => Vec::new(),
            CliLine::Assistant { message } if !self.partial_messages => message
                .content
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } if !text.is_empty() => {
                        Some(AgentEvent::TextDelta(text))
                    }
                    ContentBlock::ToolUse { name } => Some(AgentEvent::ToolStart { name }),
                    _ => None,
                })
                .collect(),
            CliLine::Assistant { .. } => Vec::new(),
            CliLine::ToolProgress {
                tool_name,
                elapsed_time_seconds,
            } => vec![AgentEvent::ToolProgress {
                name: tool_name,
                elapsed_secs: elapsed_time_seconds,
            }],
            CliLine::Result(summary) => vec![AgentEvent::Finished(summary)],
            CliLine::Other => {
                debug!("skipping stream-json line with unhandled type");
                Vec::new()
            }
        };

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn partial() -> MessageParser {
        MessageParser::new(true)
    }

    #[test]
    fn test_text_delta() {
        let line = r#"{"type":"stream_event","session_id":"s1","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}}"#;
        assert_eq!(
            partial().parse_line(line).unwrap(),
            vec![AgentEvent::TextDelta("Hello".to_string())]
        );
    }

    #[test]
    fn test_tool_use_block_start() {
        let line = r#"{"type":"stream_event","event":{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_01","name":"WebSearch","input":{}}}}"#;
        assert_eq!(
            partial().parse_line(line).unwrap(),
            vec![AgentEvent::ToolStart {
                name: "WebSearch".to_string()
            }]
        );
    }

    #[test]
    fn test_other_stream_events_are_skipped() {
        for line in [
            r#"{"type":"stream_event","event":{"type":"message_start","message":{}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q"}}}"#,
            r#"{"type":"stream_event","event":{"type":"message_stop"}}"#,
        ] {
            assert!(partial().parse_line(line).unwrap().is_empty(), "{line}");
        }
    }

    #[test]
    fn test_tool_progress() {
        let line = r#"{"type":"tool_progress","tool_use_id":"toolu_01","tool_name":"Bash","parent_tool_use_id":null,"elapsed_time_seconds":3.5}"#;
        assert_eq!(
            partial().parse_line(line).unwrap(),
            vec![AgentEvent::ToolProgress {
                name: "Bash".to_string(),
                elapsed_secs: 3.5
            }]
        );
    }

    #[test]
    fn test_success_result() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"duration_ms":1200,"num_turns":2,"result":"Done!","session_id":"s1","total_cost_usd":0.01}"#;
        let events = partial().parse_line(line).unwrap();
        let AgentEvent::Finished(summary) = &events[0] else {
            panic!("expected finished, got {events:?}");
        };
        assert!(summary.is_success());
        assert_eq!(summary.num_turns, Some(2));
    }

    #[test]
    fn test_error_result() {
        let line = r#"{"type":"result","subtype":"error_max_turns","is_error":true,"num_turns":10}"#;
        let events = partial().parse_line(line).unwrap();
        let AgentEvent::Finished(summary) = &events[0] else {
            panic!("expected finished, got {events:?}");
        };
        assert!(!summary.is_success());
        assert_eq!(
            summary.failure_reason(),
            "agent reached its maximum number of turns"
        );
    }

    #[test]
    fn test_success_subtype_with_error_flag_is_failure() {
        let line = r#"{"type":"result","subtype":"success","is_error":true,"result":"API Error: overloaded"}"#;
        let events = partial().parse_line(line).unwrap();
        let AgentEvent::Finished(summary) = &events[0] else {
            panic!("expected finished");
        };
        assert!(!summary.is_success());
        assert_eq!(summary.failure_reason(), "API Error: overloaded");
    }

    #[test]
    fn test_assistant_ignored_with_partial_messages() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hello"}]}}"#;
        assert!(partial().parse_line(line).unwrap().is_empty());
    }

    #[test]
    fn test_assistant_used_without_partial_messages() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{}},{"type":"text","text":"Reading"}]}}"#;
        assert_eq!(
            MessageParser::new(false).parse_line(line).unwrap(),
            vec![
                AgentEvent::ToolStart {
                    name: "Read".to_string()
                },
                AgentEvent::TextDelta("Reading".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_and_blank_lines() {
        assert!(partial()
            .parse_line(r#"{"type":"system","subtype":"init","tools":[]}"#)
            .unwrap()
            .is_empty());
        assert!(partial().parse_line("   ").unwrap().is_empty());
        assert!(partial().parse_line("not json").is_err());
    }
}
