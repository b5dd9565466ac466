//! HTTP server for the deskdemo desktop.
//!
//! This crate serves:
//! - The chat relay, streaming agent output as `text/event-stream`
//! - The window and app catalog API backing the desktop
//! - The telemetry showcase (logs, metrics, captured errors, live feed)
//! - An optional prebuilt front end from a static directory

mod error;
mod prompt;
mod relay;
mod routes;
mod server;
mod sse;

pub use error::WebError;
pub use prompt::{RELAY_INSTRUCTION, build_prompt};
pub use relay::{AGENT_FAILURE_MESSAGE, relay_agent_config};
pub use routes::{AppState, create_router};
pub use server::run_server;
