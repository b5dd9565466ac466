//! Conversation state for one chat window.

use tracing::{debug, warn};
use uuid::Uuid;

use deskdemo_core::{ChatMessage, ChatRequest, RelayEvent, Role};

use crate::error::ClientError;

/// Shown in place of the answer when anything goes wrong.
pub const GENERIC_ERROR_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

/// The tool the agent is currently running.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStatus {
    pub tool: String,
    /// Seconds the tool has been running, once progress was reported.
    pub elapsed: Option<f64>,
}

/// A chat conversation and the response currently streaming into it.
///
/// One request at a time: [`submit`](Self::submit) is rejected until
/// [`finish`](Self::finish) is called for the previous one.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    tool_status: Option<ToolStatus>,
    in_flight: bool,
    placeholder: Option<Uuid>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn tool_status(&self) -> Option<&ToolStatus> {
        self.tool_status.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Append a user message and return the request carrying the whole
    /// conversation.
    pub fn submit(&mut self, text: &str) -> Result<ChatRequest, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if self.in_flight {
            return Err(ClientError::Busy);
        }

        self.messages.push(ChatMessage::new(Role::User, text));
        self.in_flight = true;

        Ok(ChatRequest::new(
            self.messages.iter().map(ChatMessage::to_turn).collect(),
        ))
    }

    /// Append the empty assistant message the response streams into.
    pub fn begin_response(&mut self) -> Uuid {
        if let Some(id) = self.placeholder {
            return id;
        }
        let message = ChatMessage::new(Role::Assistant, "");
        let id = message.id;
        self.messages.push(message);
        self.placeholder = Some(id);
        id
    }

    /// Fold one relay event into the conversation.
    pub fn apply(&mut self, event: &RelayEvent) {
        match event {
            RelayEvent::TextDelta { text } => {
                self.tool_status = None;
                self.placeholder_mut().content.push_str(text);
            }
            RelayEvent::ToolStart { tool } => {
                debug!(tool = %tool, "agent started tool");
                self.tool_status = Some(ToolStatus {
                    tool: tool.clone(),
                    elapsed: None,
                });
            }
            RelayEvent::ToolProgress { tool, elapsed } => {
                self.tool_status = Some(ToolStatus {
                    tool: tool.clone(),
                    elapsed: Some(*elapsed),
                });
            }
            RelayEvent::Done => {
                self.tool_status = None;
            }
            RelayEvent::Error { error } => {
                warn!(error = %error, "relay reported an error");
                self.fail();
            }
        }
    }

    /// Show the generic error in place of the response.
    pub fn fail(&mut self) {
        self.tool_status = None;
        self.placeholder_mut().content = GENERIC_ERROR_MESSAGE.to_string();
    }

    /// Close out the current response.
    ///
    /// A placeholder that never received any text is removed rather than
    /// left as an empty bubble.
    pub fn finish(&mut self) {
        self.in_flight = false;
        self.tool_status = None;

        if let Some(id) = self.placeholder.take() {
            self.messages
                .retain(|m| m.id != id || !m.content.is_empty());
        }
    }

    fn placeholder_mut(&mut self) -> &mut ChatMessage {
        let id = self.begin_response();
        let idx = self
            .messages
            .iter()
            .rposition(|m| m.id == id)
            .unwrap_or(self.messages.len() - 1);
        &mut self.messages[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn contents(session: &ChatSession) -> Vec<(Role, &str)> {
        session
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[test]
    fn test_submit_carries_history() {
        let mut session = ChatSession::new();
        session.submit("first").unwrap();
        session.begin_response();
        session.apply(&RelayEvent::TextDelta {
            text: "reply".into(),
        });
        session.finish();

        let request = session.submit("  second  ").unwrap();
        let turns = request.validate().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content, "reply");
        assert_eq!(turns[2].content, "second");
    }

    #[test_case("" ; "empty")]
    #[test_case("   \n" ; "whitespace")]
    fn test_blank_submit_rejected(text: &str) {
        let mut session = ChatSession::new();
        assert!(matches!(session.submit(text), Err(ClientError::EmptyMessage)));
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_submit_while_in_flight_rejected() {
        let mut session = ChatSession::new();
        session.submit("one").unwrap();
        assert!(matches!(session.submit("two"), Err(ClientError::Busy)));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_deltas_accumulate_and_clear_tool_status() {
        let mut session = ChatSession::new();
        session.submit("search please").unwrap();
        session.begin_response();

        session.apply(&RelayEvent::ToolStart {
            tool: "WebSearch".into(),
        });
        assert_eq!(session.tool_status().unwrap().tool, "WebSearch");
        session.apply(&RelayEvent::ToolProgress {
            tool: "WebSearch".into(),
            elapsed: 2.0,
        });
        assert_eq!(session.tool_status().unwrap().elapsed, Some(2.0));

        session.apply(&RelayEvent::TextDelta { text: "Found ".into() });
        assert_eq!(session.tool_status(), None);
        session.apply(&RelayEvent::TextDelta { text: "it".into() });
        session.apply(&RelayEvent::Done);
        session.finish();

        assert_eq!(
            contents(&session),
            vec![(Role::User, "search please"), (Role::Assistant, "Found it")]
        );
        assert!(!session.is_in_flight());
    }

    #[test]
    fn test_empty_placeholder_removed() {
        let mut session = ChatSession::new();
        session.submit("hello").unwrap();
        session.begin_response();
        session.apply(&RelayEvent::ToolStart { tool: "Read".into() });
        session.apply(&RelayEvent::Done);
        session.finish();

        assert_eq!(contents(&session), vec![(Role::User, "hello")]);
    }

    #[test]
    fn test_error_event_replaces_content() {
        let mut session = ChatSession::new();
        session.submit("hello").unwrap();
        session.begin_response();
        session.apply(&RelayEvent::TextDelta { text: "Half an ans".into() });
        session.apply(&RelayEvent::Error {
            error: "agent reached its maximum number of turns".into(),
        });
        session.finish();

        assert_eq!(
            contents(&session),
            vec![(Role::User, "hello"), (Role::Assistant, GENERIC_ERROR_MESSAGE)]
        );
    }
}
