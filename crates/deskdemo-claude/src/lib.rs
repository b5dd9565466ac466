//! Streaming Claude CLI agent.
//!
//! This crate drives the `claude` CLI in `--output-format stream-json` mode
//! and turns its line-delimited output into a typed stream of
//! [`AgentEvent`]s: text deltas, tool activity and the final result.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::collapsible_if)]

mod client;
mod config;
mod error;
mod message;
mod process;
mod stream;

pub use crate::client::{Agent, Client};
pub use crate::config::{Config, ConfigBuilder, PermissionMode, ToolPreset};
pub use crate::error::{Error, Result};
pub use crate::message::{AgentEvent, MessageParser, ResultSummary};
pub use crate::process::build_command;
pub use crate::stream::AgentStream;

/// Prelude module for convenient imports
pub mod prelude {
    pub use futures::StreamExt;

    pub use crate::{Agent, AgentEvent, AgentStream, Client, Config, Error, Result};
}
