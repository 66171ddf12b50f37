use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{info, warn};

use stepgraph_core::config::{AppConfig, GatewayConfig};
use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::event::EventBus;
use stepgraph_core::traits::StepSink;
use stepgraph_core::types::{
    ExecutionStep, GraphDefinition, GraphId, GraphRun, GraphSpec, RunId, RunStatus,
};
use stepgraph_engine::{resolve_successor, FanoutSink, JsonlSink, WorkflowEngine};
use stepgraph_tools::ToolRegistry;

/// A stored run and the graph it executes, when known.
struct TrackedRun {
    run: GraphRun,
    graph: Option<Arc<GraphDefinition>>,
}

/// In-memory run records, readable while runs are in flight.
///
/// As a step sink it mirrors each delivered step into the stored record,
/// so status queries see progress before the run returns. For tracked
/// runs `current_node` is advanced to the step's successor, matching the
/// engine's own record.
#[derive(Default)]
pub struct RunStore {
    runs: RwLock<HashMap<RunId, TrackedRun>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a run together with the graph it executes.
    pub async fn track(&self, run: GraphRun, graph: Arc<GraphDefinition>) {
        self.runs.write().await.insert(
            run.id.clone(),
            TrackedRun {
                run,
                graph: Some(graph),
            },
        );
    }

    /// Insert or replace a run record, keeping any tracked graph.
    pub async fn put(&self, run: GraphRun) {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(tracked) => tracked.run = run,
            None => {
                runs.insert(run.id.clone(), TrackedRun { run, graph: None });
            }
        }
    }

    pub async fn get(&self, id: &RunId) -> Option<GraphRun> {
        self.runs.read().await.get(id).map(|t| t.run.clone())
    }
}

impl StepSink for RunStore {
    fn deliver<'a>(&'a self, run_id: &'a RunId, step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut runs = self.runs.write().await;
            let tracked = runs
                .get_mut(run_id)
                .ok_or_else(|| StepgraphError::RunNotFound(run_id.to_string()))?;

            let node = tracked
                .graph
                .as_ref()
                .and_then(|g| g.nodes.get(&step.node));
            // A failed condition leaves the run on the node that just ran
            let current = match node {
                Some(node) => resolve_successor(&step.state_snapshot, node)
                    .unwrap_or_else(|_| Some(step.node.clone())),
                None => Some(step.node.clone()),
            };

            let run = &mut tracked.run;
            run.status = RunStatus::Running;
            run.current_node = current;
            run.state = step.state_snapshot.clone();
            run.log.push(step.clone());
            Ok(())
        })
    }
}

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub default_max_steps: usize,
    pub engine: WorkflowEngine,
    pub graphs: RwLock<HashMap<GraphId, Arc<GraphDefinition>>>,
    pub runs: Arc<RunStore>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the engine to the run store, the event bus, and (if configured)
    /// a JSONL trace directory.
    pub fn new(config: &AppConfig, registry: Arc<ToolRegistry>) -> Self {
        let gateway = config.gateway.clone().unwrap_or_default();
        let event_bus = Arc::new(EventBus::new(gateway.event_capacity));
        let runs = Arc::new(RunStore::new());

        let mut sink = FanoutSink::new().with(runs.clone()).with(event_bus.clone());
        if let Some(dir) = config.trace_dir() {
            info!(dir = %dir.display(), "Writing step traces");
            sink = sink.with(Arc::new(JsonlSink::new(dir)));
        }

        Self {
            config: gateway,
            default_max_steps: config.engine.default_max_steps,
            engine: WorkflowEngine::new(registry).with_sink(Arc::new(sink)),
            graphs: RwLock::new(HashMap::new()),
            runs,
            event_bus,
        }
    }

    /// Validate and store a graph under a fresh id.
    pub async fn create_graph(&self, spec: GraphSpec) -> Result<Arc<GraphDefinition>> {
        let graph = Arc::new(GraphDefinition::from_spec(GraphId::new(), spec)?);
        let unresolved = graph.unresolved_references();
        if !unresolved.is_empty() {
            warn!(graph_id = %graph.id, ?unresolved, "Graph references undefined nodes");
        }
        self.graphs
            .write()
            .await
            .insert(graph.id.clone(), graph.clone());
        info!(graph_id = %graph.id, name = %graph.name, nodes = graph.nodes.len(), "Graph created");
        Ok(graph)
    }

    pub async fn graph(&self, id: &GraphId) -> Option<Arc<GraphDefinition>> {
        self.graphs.read().await.get(id).cloned()
    }

    /// Start a run and drive it to completion.
    ///
    /// The stored record is `Running` at the start node before the first
    /// step, so it can be queried for the whole life of the run.
    pub async fn execute(
        &self,
        graph: &Arc<GraphDefinition>,
        initial_state: stepgraph_core::StateMap,
        max_steps: usize,
    ) -> GraphRun {
        let mut run = GraphRun::new(graph.id.clone(), initial_state);
        run.status = RunStatus::Running;
        run.current_node = Some(graph.start_node.clone());
        self.runs.track(run.clone(), graph.clone()).await;
        self.engine.run(graph, &mut run, max_steps).await;
        self.runs.put(run.clone()).await;
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use stepgraph_core::types::{CompareOp, Condition, NodeConfig};
    use stepgraph_core::StateMap;
    use stepgraph_test_utils::{state, MockTool};

    #[tokio::test]
    async fn test_run_store_mirrors_steps() {
        let store = RunStore::new();
        let run = GraphRun::new(GraphId::from_string("g"), state(json!({"x": 1})));
        let id = run.id.clone();
        store.put(run).await;

        let step = ExecutionStep {
            step: 1,
            node: "a".into(),
            state_snapshot: state(json!({"x": 2})),
        };
        store.deliver(&id, &step).await.unwrap();

        let seen = store.get(&id).await.unwrap();
        assert_eq!(seen.status, RunStatus::Running);
        assert_eq!(seen.current_node.as_deref(), Some("a"));
        assert_eq!(seen.state, state(json!({"x": 2})));
        assert_eq!(seen.log, vec![step]);
    }

    #[tokio::test]
    async fn test_run_store_unknown_run_is_delivery_error() {
        let store = RunStore::new();
        let step = ExecutionStep {
            step: 1,
            node: "a".into(),
            state_snapshot: Default::default(),
        };
        assert!(store.deliver(&RunId::from_string("nope"), &step).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_stores_final_run() {
        let app = AppState::new(&AppConfig::default(), Arc::new(ToolRegistry::with_builtins()));
        let graph = app
            .create_graph(stepgraph_tools::workflows::summarization_graph())
            .await
            .unwrap();

        let run = app
            .execute(&graph, state(json!({"input_text": "one two three four"})), 10)
            .await;

        assert_eq!(run.status, RunStatus::Completed);
        let stored = app.runs.get(&run.id).await.unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.log.len(), run.log.len());
        assert_eq!(stored.state, run.state);
    }

    #[tokio::test]
    async fn test_run_store_advances_to_successor() {
        let store = RunStore::new();
        let graph = Arc::new(stepgraph_test_utils::graph(
            "a",
            vec![
                (
                    "a",
                    NodeConfig::new("t").with_condition(
                        Condition::new("x", CompareOp::Gt, json!(1)).on_true("b").on_false("c"),
                    ),
                ),
                ("b", NodeConfig::new("t")),
                ("c", NodeConfig::new("t")),
            ],
        ));
        let run = GraphRun::new(graph.id.clone(), state(json!({"x": 1})));
        let id = run.id.clone();
        store.track(run, graph).await;

        let step = ExecutionStep {
            step: 1,
            node: "a".into(),
            state_snapshot: state(json!({"x": 2})),
        };
        store.deliver(&id, &step).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().current_node.as_deref(), Some("b"));

        let step = ExecutionStep {
            step: 2,
            node: "b".into(),
            state_snapshot: state(json!({"x": 2})),
        };
        store.deliver(&id, &step).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().current_node, None);
    }

    #[tokio::test]
    async fn test_run_store_keeps_node_when_condition_fails() {
        let store = RunStore::new();
        let graph = Arc::new(stepgraph_test_utils::graph(
            "a",
            vec![(
                "a",
                NodeConfig::new("t").with_condition(
                    Condition::new("missing", CompareOp::Lt, json!(1)).on_true("a"),
                ),
            )],
        ));
        let run = GraphRun::new(graph.id.clone(), Default::default());
        let id = run.id.clone();
        store.track(run, graph).await;

        let step = ExecutionStep {
            step: 1,
            node: "a".into(),
            state_snapshot: Default::default(),
        };
        store.deliver(&id, &step).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().current_node.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_in_flight_run_is_visible_as_running() {
        let mut registry = ToolRegistry::new();
        registry.register("fast", MockTool::returning(json!({"fast": true})));
        registry.register_async("slow", "", |_s: StateMap| async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(Some(json!({"slow": true})))
        });
        let app = Arc::new(AppState::new(&AppConfig::default(), Arc::new(registry)));

        let mut nodes = HashMap::new();
        nodes.insert("first".to_string(), NodeConfig::new("fast").with_next("second"));
        nodes.insert("second".to_string(), NodeConfig::new("slow"));
        let graph = app
            .create_graph(GraphSpec {
                name: "slow-tail".into(),
                nodes,
                start_node: "first".into(),
            })
            .await
            .unwrap();

        let task = {
            let app = app.clone();
            let graph = graph.clone();
            tokio::spawn(async move { app.execute(&graph, StateMap::new(), 10).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        let in_flight = {
            let runs = app.runs.runs.read().await;
            assert_eq!(runs.len(), 1);
            runs.values().next().unwrap().run.clone()
        };
        assert_eq!(in_flight.status, RunStatus::Running);
        assert_eq!(in_flight.current_node.as_deref(), Some("second"));
        assert_eq!(in_flight.log.len(), 1);
        assert_eq!(in_flight.state, state(json!({"fast": true})));

        let finished = task.await.unwrap();
        let stored = app.runs.get(&finished.id).await.unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.current_node, None);
        assert_eq!(stored.log.len(), 2);
    }

    #[tokio::test]
    async fn test_create_graph_rejects_missing_start() {
        let app = AppState::new(&AppConfig::default(), Arc::new(ToolRegistry::new()));
        let spec = GraphSpec {
            name: "bad".into(),
            nodes: HashMap::new(),
            start_node: "a".into(),
        };
        assert!(app.create_graph(spec).await.is_err());
        assert!(app.graphs.read().await.is_empty());
    }
}
