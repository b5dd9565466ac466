//! The chat relay: conversation in, agent events out as a client stream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use futures_util::{StreamExt, future};
use tracing::{debug, info, warn};

use deskdemo_claude::{AgentEvent, AgentStream, Config, PermissionMode, ToolPreset};
use deskdemo_core::{
    ChatRequest, MetricKind, MetricSample, RelayEvent, Telemetry, ValidationError,
};

use crate::{
    error::WebError, prompt::build_prompt, routes::AppState, sse::relay_sse,
};

/// Error source recorded for relay failures.
const RELAY_ERROR_SOURCE: &str = "chat.relay";

/// In-band error text sent when the agent stream itself fails.
pub const AGENT_FAILURE_MESSAGE: &str = "agent failed";

/// Agent configuration used for relayed chats.
///
/// Tools run without permission prompts since there is nobody to answer
/// them, and partial messages are on so text streams as it is generated.
pub fn relay_agent_config(
    model: Option<String>,
    max_turns: u32,
    timeout_secs: u64,
    binary: Option<std::path::PathBuf>,
) -> deskdemo_claude::Result<Config> {
    let mut builder = Config::builder()
        .tools(ToolPreset::ClaudeCode)
        .permission_mode(PermissionMode::BypassPermissions)
        .max_turns(max_turns)
        .include_partial_messages(true)
        .timeout_secs(timeout_secs);

    if let Some(model) = model {
        builder = builder.model(model);
    }
    if let Some(binary) = binary {
        builder = builder.binary(binary);
    }

    builder.build()
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, WebError> {
    state.telemetry.increment("chat.requests", 1.0);

    let Json(request) = body.map_err(|e| ValidationError::MalformedBody(e.body_text()))?;
    let turns = request.validate()?;
    let prompt = build_prompt(turns)?;

    info!(turns = turns.len(), prompt_len = prompt.len(), "relaying chat");

    let agent_stream = match state.agent.query(&prompt).await {
        Ok(stream) => stream,
        Err(e) => {
            state
                .telemetry
                .capture_error(format!("failed to start agent: {e}"), Some(RELAY_ERROR_SOURCE));
            return Err(e.into());
        }
    };

    let started = Instant::now();
    let telemetry = Arc::clone(&state.telemetry);
    let events = relay_events(agent_stream, Arc::clone(&state.telemetry));

    Ok(relay_sse(events, move || {
        let elapsed = started.elapsed();
        debug!(elapsed_ms = elapsed.as_millis() as u64, "relay stream complete");
        telemetry.distribution("chat.stream_duration_ms", millis(elapsed), "millisecond");
    }))
}

/// Translate agent events into client events, stopping after the first
/// terminal one.
fn relay_events(
    agent_stream: AgentStream,
    telemetry: Arc<Telemetry>,
) -> impl futures_util::Stream<Item = RelayEvent> + Send + 'static {
    agent_stream
        .map(|event| event.map(translate))
        .scan(false, move |finished, event| {
            if *finished {
                return future::ready(None);
            }
            let event = match event {
                Ok(event) => {
                    observe(&telemetry, &event);
                    event
                }
                Err(e) => agent_failed(&telemetry, &e),
            };
            *finished = event.is_terminal();
            future::ready(Some(event))
        })
}

/// Stream failures can carry CLI stderr, so the client only gets a fixed
/// message and the detail goes to telemetry.
fn agent_failed(telemetry: &Telemetry, e: &deskdemo_claude::Error) -> RelayEvent {
    warn!(error = %e, "agent stream failed");
    telemetry.capture_error(e.to_string(), Some(RELAY_ERROR_SOURCE));
    RelayEvent::Error {
        error: AGENT_FAILURE_MESSAGE.to_string(),
    }
}

fn translate(event: AgentEvent) -> RelayEvent {
    match event {
        AgentEvent::TextDelta(text) => RelayEvent::TextDelta { text },
        AgentEvent::ToolStart { name } => RelayEvent::ToolStart { tool: name },
        AgentEvent::ToolProgress { name, elapsed_secs } => RelayEvent::ToolProgress {
            tool: name,
            elapsed: elapsed_secs,
        },
        AgentEvent::Finished(summary) if summary.is_success() => RelayEvent::Done,
        AgentEvent::Finished(summary) => RelayEvent::Error {
            error: summary.failure_reason(),
        },
    }
}

fn observe(telemetry: &Telemetry, event: &RelayEvent) {
    match event {
        RelayEvent::ToolStart { tool } => {
            telemetry.record(
                MetricSample::new(MetricKind::Counter, "chat.tool_calls", 1.0)
                    .with_attribute("tool", tool.as_str()),
            );
        }
        RelayEvent::Error { error } => {
            telemetry.capture_error(error.as_str(), Some(RELAY_ERROR_SOURCE));
        }
        _ => {}
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
