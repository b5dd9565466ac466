//! Core types for the deskdemo desktop environment.
//!
//! This crate holds the pieces shared by the server and the chat client:
//! - Window manager state (geometry, stacking, focus)
//! - Chat messages and the relay request shape
//! - The relay event protocol spoken over `text/event-stream`
//! - The desktop app catalog
//! - The in-memory telemetry recorder behind the observability showcase

pub mod apps;
pub mod chat;
mod error;
pub mod protocol;
pub mod telemetry;
pub mod window;

pub use apps::{AppKind, DesktopApp};
pub use chat::{ChatMessage, ChatRequest, ChatTurn, Role};
pub use error::ValidationError;
pub use protocol::{DONE_SENTINEL, RelayEvent, StreamFrame, parse_data_line};
pub use telemetry::{
    CapturedError, LogEntry, LogLevel, MetricKind, MetricSample, Telemetry, TelemetryRecord,
    TelemetrySnapshot,
};
pub use window::{Geometry, WindowId, WindowManager, WindowRecord, WindowSpec};
