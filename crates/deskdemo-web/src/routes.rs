//! Web routes.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, info};

use deskdemo_claude::Agent;
use deskdemo_core::{
    DesktopApp, LogEntry, MetricSample, Telemetry, WindowManager, WindowRecord, WindowSpec,
};

use crate::error::WebError;
use crate::relay::chat;
use crate::sse::create_sse_stream;

/// Shared state for the web server.
pub struct AppState {
    /// Every open window. Shared by all browsers talking to this process.
    pub windows: RwLock<WindowManager>,
    pub telemetry: Arc<Telemetry>,
    pub agent: Arc<dyn Agent>,
}

impl AppState {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self::with_telemetry(agent, Arc::new(Telemetry::new()))
    }

    pub fn with_telemetry(agent: Arc<dyn Agent>, telemetry: Arc<Telemetry>) -> Self {
        Self {
            windows: RwLock::new(WindowManager::new()),
            telemetry,
            agent,
        }
    }
}

/// Create the web router.
///
/// If `static_dir` is provided, its files are served under `/static`.
pub fn create_router(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    let mut router = Router::new()
        // Chat
        .route("/api/chat", post(chat))
        // Windows
        .route("/api/windows", get(list_windows).post(open_window))
        .route("/api/windows/{id}/close", post(close_window))
        .route("/api/windows/{id}/minimize", post(minimize_window))
        .route("/api/windows/{id}/maximize", post(maximize_window))
        .route("/api/windows/{id}/restore", post(restore_window))
        .route("/api/windows/{id}/focus", post(focus_window))
        .route("/api/windows/{id}/move", post(move_window))
        .route("/api/windows/{id}/resize", post(resize_window))
        // Apps
        .route("/api/apps", get(list_apps))
        .route("/api/apps/{app_id}/launch", post(launch_app))
        // Telemetry
        .route("/api/telemetry", get(telemetry_snapshot))
        .route("/api/telemetry/logs", post(emit_log))
        .route("/api/telemetry/metrics", post(record_metric))
        .route("/api/telemetry/errors", post(capture_error))
        .route("/api/telemetry/stream", get(telemetry_sse))
        // Other
        .route("/health", get(health))
        .with_state(state);

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router.layer(CorsLayer::permissive())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============================================================================
// Windows
// ============================================================================

#[derive(Debug, Deserialize)]
struct MoveRequest {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ResizeRequest {
    width: f64,
    height: f64,
}

fn window_list(windows: &WindowManager) -> Json<Vec<WindowRecord>> {
    Json(windows.windows().to_vec())
}

/// Apply one window operation and answer with the resulting window list.
async fn apply_window_op(
    state: &AppState,
    id: &str,
    op: &str,
    f: impl FnOnce(&mut WindowManager) -> bool,
) -> Json<Vec<WindowRecord>> {
    let mut windows = state.windows.write().await;
    if f(&mut *windows) {
        debug!(window = %id, op, "window updated");
    } else {
        debug!(window = %id, op, "no such window, ignoring");
    }
    window_list(&windows)
}

async fn list_windows(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    window_list(&*state.windows.read().await)
}

async fn open_window(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<WindowSpec>,
) -> impl IntoResponse {
    let mut windows = state.windows.write().await;
    let opened = windows.open(spec);
    debug!(window = %opened.id, z = opened.z_index, "window opened");
    window_list(&windows)
}

async fn close_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    apply_window_op(&state, &id, "close", |w| w.close(&id).is_some()).await
}

async fn minimize_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    apply_window_op(&state, &id, "minimize", |w| w.minimize(&id)).await
}

async fn maximize_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    apply_window_op(&state, &id, "maximize", |w| w.maximize(&id)).await
}

async fn restore_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    apply_window_op(&state, &id, "restore", |w| w.restore(&id)).await
}

async fn focus_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    apply_window_op(&state, &id, "focus", |w| w.focus(&id)).await
}

async fn move_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> impl IntoResponse {
    apply_window_op(&state, &id, "move", |w| {
        w.move_to(&id, request.x, request.y)
    })
    .await
}

async fn resize_window(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ResizeRequest>,
) -> impl IntoResponse {
    apply_window_op(&state, &id, "resize", |w| {
        w.resize(&id, request.width, request.height)
    })
    .await
}

// ============================================================================
// Apps
// ============================================================================

async fn list_apps() -> impl IntoResponse {
    Json(DesktopApp::all())
}

async fn launch_app(
    State(state): State<Arc<AppState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, WebError> {
    let app = DesktopApp::find(&app_id).ok_or_else(|| WebError::UnknownApp(app_id.clone()))?;

    let mut windows = state.windows.write().await;
    windows.open(app.window_spec());
    info!(app = app.id, "app launched");

    Ok(window_list(&windows))
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Debug, Deserialize)]
struct CaptureErrorRequest {
    message: String,
    #[serde(default)]
    source: Option<String>,
}

async fn telemetry_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.telemetry.snapshot())
}

async fn emit_log(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<LogEntry>,
) -> impl IntoResponse {
    state.telemetry.log(entry);
    Json(json!({ "success": true }))
}

async fn record_metric(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<MetricSample>,
) -> impl IntoResponse {
    state.telemetry.record(sample);
    Json(json!({ "success": true }))
}

async fn capture_error(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CaptureErrorRequest>,
) -> impl IntoResponse {
    Json(
        state
            .telemetry
            .capture_error(request.message, request.source.as_deref()),
    )
}

async fn telemetry_sse(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    create_sse_stream(state.telemetry.subscribe())
}
