use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{debug, info};

use stepgraph_core::types::{GraphSpec, RunId};

use crate::connection;
use crate::protocol::{
    CreateGraphResponse, GraphSummary, RunGraphRequest, RunGraphResponse, RunStateResponse,
};
use crate::state::AppState;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "detail": detail.into() })))
}

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /graph/create
pub async fn create_graph(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<GraphSpec>,
) -> Result<Json<CreateGraphResponse>, ApiError> {
    let graph = state
        .create_graph(spec)
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(CreateGraphResponse {
        graph_id: graph.id.clone(),
        name: graph.name.clone(),
    }))
}

// POST /graph/run
pub async fn run_graph(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunGraphRequest>,
) -> Result<Json<RunGraphResponse>, ApiError> {
    let graph = state.graph(&body.graph_id).await.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Graph '{}' not found", body.graph_id),
        )
    })?;

    let max_steps = body.max_steps.unwrap_or(state.default_max_steps);
    if max_steps < 1 {
        return Err(api_error(StatusCode::BAD_REQUEST, "max_steps must be at least 1"));
    }

    let run = state.execute(&graph, body.initial_state, max_steps).await;
    Ok(Json(run.into()))
}

// GET /graph/state/{run_id}
pub async fn graph_state(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStateResponse>, ApiError> {
    let run = state
        .runs
        .get(&RunId::from_string(&run_id))
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Run '{}' not found", run_id)))?;
    Ok(Json(run.into()))
}

// GET /tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    Json(state.engine.registry().list())
}

// GET /graphs
pub async fn list_graphs(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, GraphSummary>> {
    let graphs = state.graphs.read().await;
    Json(
        graphs
            .iter()
            .map(|(id, g)| (id.to_string(), GraphSummary { name: g.name.clone() }))
            .collect(),
    )
}

// GET /ws/logs/{run_id} — WebSocket upgrade
pub async fn ws_logs(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let run_id = RunId::from_string(&run_id);
    ws.on_upgrade(move |socket| handle_ws(socket, state, run_id))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>, run_id: RunId) {
    info!(run_id = %run_id, "Log stream client connected");
    connection::stream_run_logs(socket, run_id.clone(), state.event_bus.clone(), state.runs.clone())
        .await;
    debug!(run_id = %run_id, "Log stream client disconnected");
}
