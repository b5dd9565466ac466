//! Prompt construction for the chat relay.

use deskdemo_core::{ChatTurn, Role, ValidationError};

/// Instruction placed at the top of every relayed prompt.
pub const RELAY_INSTRUCTION: &str = "You are the assistant in a browser-based desktop \
environment demo. Answer the user's latest message helpfully and concisely, using the \
conversation so far for context. Format answers in Markdown.";

/// Build the single prompt sent to the agent for a conversation.
///
/// The final user turn is the last user-authored message. Everything before
/// it is rendered as `Role: content` history lines; assistant messages after
/// it are ignored.
pub fn build_prompt(turns: &[ChatTurn]) -> Result<String, ValidationError> {
    let last_user = turns
        .iter()
        .rposition(|turn| turn.role == Role::User)
        .ok_or(ValidationError::NoUserMessage)?;

    let mut prompt = String::from(RELAY_INSTRUCTION);
    prompt.push_str("\n\n");

    let history = &turns[..last_user];
    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for turn in history {
            prompt.push_str(turn.role.label());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("User: ");
    prompt.push_str(&turns[last_user].content);
    Ok(prompt)
}
