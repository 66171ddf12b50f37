use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use stepgraph_core::config::AppConfig;
use stepgraph_core::error::Result;
use stepgraph_core::types::{GraphDefinition, GraphSpec};
use stepgraph_tools::ToolRegistry;

use crate::routes;
use crate::state::AppState;

/// Build the HTTP + WebSocket router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws/logs/{run_id}", get(routes::ws_logs))
        // REST API
        .route("/api/health", get(routes::health))
        .route("/graph/create", post(routes::create_graph))
        .route("/graph/run", post(routes::run_graph))
        .route("/graph/state/{run_id}", get(routes::graph_state))
        .route("/graphs", get(routes::list_graphs))
        .route("/tools", get(routes::list_tools))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP + WebSocket gateway server built on axum.
pub struct GatewayServer {
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(config: &AppConfig, registry: Arc<ToolRegistry>) -> Self {
        Self {
            state: Arc::new(AppState::new(config, registry)),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Register a graph before serving, e.g. the built-in default.
    pub async fn register_graph(&self, spec: GraphSpec) -> Result<Arc<GraphDefinition>> {
        self.state.create_graph(spec).await
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&self.state.config.bind).await?;
        info!(bind = %self.state.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use stepgraph_test_utils::MockTool;
    use tower::ServiceExt;

    fn app() -> (Arc<AppState>, Router) {
        let mut registry = ToolRegistry::with_builtins();
        registry.register(
            "stamp",
            MockTool::returning(json!({"stamped": true})).with_description("Stamp the state."),
        );
        let state = Arc::new(AppState::new(&AppConfig::default(), Arc::new(registry)));
        (state.clone(), router(state))
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(b) => Body::from(b.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (_, router) = app();
        let (status, body) = call(&router, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
    }

    #[tokio::test]
    async fn test_create_run_and_query_state() {
        let (_, router) = app();
        let (status, created) = call(
            &router,
            "POST",
            "/graph/create",
            Some(json!({
                "name": "stamp-once",
                "nodes": {"a": {"tool": "stamp"}},
                "start_node": "a"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["name"], json!("stamp-once"));
        let graph_id = created["graph_id"].as_str().unwrap().to_string();

        let (status, ran) = call(
            &router,
            "POST",
            "/graph/run",
            Some(json!({"graph_id": graph_id, "initial_state": {"x": 1}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ran["status"], json!("completed"));
        assert_eq!(ran["final_state"], json!({"x": 1, "stamped": true}));
        assert_eq!(ran["log"].as_array().unwrap().len(), 1);
        assert_eq!(ran["error"], json!(null));

        let run_id = ran["run_id"].as_str().unwrap();
        let (status, seen) = call(&router, "GET", &format!("/graph/state/{run_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(seen["graph_id"], json!(graph_id));
        assert_eq!(seen["status"], json!("completed"));
        assert_eq!(seen["current_node"], json!(null));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_start_node() {
        let (_, router) = app();
        let (status, body) = call(
            &router,
            "POST",
            "/graph/create",
            Some(json!({"name": "bad", "nodes": {"a": {"tool": "stamp"}}, "start_node": "b"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("start_node 'b'"));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_operator() {
        let (_, router) = app();
        let (status, _) = call(
            &router,
            "POST",
            "/graph/create",
            Some(json!({
                "name": "bad-op",
                "nodes": {"a": {"tool": "stamp", "condition": {"key": "x", "op": "like", "value": 1}}},
                "start_node": "a"
            })),
        )
        .await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_run_unknown_graph_is_404() {
        let (_, router) = app();
        let (status, body) = call(&router, "POST", "/graph/run", Some(json!({"graph_id": "nope"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], json!("Graph 'nope' not found"));
    }

    #[tokio::test]
    async fn test_run_rejects_zero_max_steps() {
        let (state, router) = app();
        let graph = state
            .create_graph(stepgraph_tools::workflows::summarization_graph())
            .await
            .unwrap();
        let (status, _) = call(
            &router,
            "POST",
            "/graph/run",
            Some(json!({"graph_id": graph.id, "max_steps": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_run_is_reported_not_errored() {
        let (_, router) = app();
        let (_, created) = call(
            &router,
            "POST",
            "/graph/create",
            Some(json!({"name": "ghost", "nodes": {"a": {"tool": "missing"}}, "start_node": "a"})),
        )
        .await;
        let (status, ran) = call(
            &router,
            "POST",
            "/graph/run",
            Some(json!({"graph_id": created["graph_id"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ran["status"], json!("failed"));
        assert_eq!(ran["error"], json!("Unknown tool 'missing' in node 'a'"));
    }

    #[tokio::test]
    async fn test_unknown_run_state_is_404() {
        let (_, router) = app();
        let (status, _) = call(&router, "GET", "/graph/state/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_tools_and_graphs() {
        let (state, router) = app();
        let graph = state
            .create_graph(stepgraph_tools::workflows::summarization_graph())
            .await
            .unwrap();

        let (_, tools) = call(&router, "GET", "/tools", None).await;
        assert_eq!(tools["stamp"], json!("Stamp the state."));
        assert!(tools.get("split_text").is_some());

        let (_, graphs) = call(&router, "GET", "/graphs", None).await;
        assert_eq!(
            graphs[graph.id.to_string()]["name"],
            json!("summarization_and_refinement")
        );
    }
}
