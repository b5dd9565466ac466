//! Chat client for the deskdemo relay.
//!
//! [`ChatSession`] holds the conversation and folds relay events into it,
//! [`SseDecoder`] turns raw response chunks into frames, and [`ChatClient`]
//! drives both over HTTP.

mod client;
mod decoder;
mod error;
mod session;

pub use client::ChatClient;
pub use decoder::SseDecoder;
pub use error::ClientError;
pub use session::{ChatSession, GENERIC_ERROR_MESSAGE, ToolStatus};
