//! Error types for request validation.

use thiserror::Error;

/// Errors raised when a chat request cannot be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The request carried no message list, or an empty one.
    #[error("messages array is required")]
    MissingMessages,

    /// None of the messages were authored by the user.
    #[error("at least one user message is required")]
    NoUserMessage,

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}
