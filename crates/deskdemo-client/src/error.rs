//! Error types for the chat client.

use thiserror::Error;

/// Errors that can occur while sending a chat message.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The message was empty or only whitespace.
    #[error("message is empty")]
    EmptyMessage,

    /// A response is still streaming.
    #[error("a response is already in progress")]
    Busy,

    /// The relay answered with a non-success status.
    #[error("relay returned {status}: {message}")]
    Status { status: u16, message: String },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
