use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::traits::StepSink;
use stepgraph_core::types::{ExecutionStep, GraphDefinition, GraphRun, RunStatus};
use stepgraph_core::value::type_name;
use stepgraph_tools::ToolRegistry;

use crate::condition::resolve_successor;

/// Executes graph runs.
///
/// The engine is stateless between runs: it holds the shared tool registry
/// and an optional step sink, so one engine can drive many runs at once.
/// A single run must only be driven by one `run()` call at a time.
pub struct WorkflowEngine {
    registry: Arc<ToolRegistry>,
    sink: Option<Arc<dyn StepSink>>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            sink: None,
        }
    }

    /// Notify `sink` of every logged step.
    pub fn with_sink(mut self, sink: Arc<dyn StepSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Drive `run` from its start node to a terminal status.
    ///
    /// On return the run is `Completed` (with `current_node` cleared) or
    /// `Failed` (with `error` set and `current_node` pointing at the node
    /// that was executing or about to execute).
    pub async fn run(&self, graph: &GraphDefinition, run: &mut GraphRun, max_steps: usize) {
        let start = Instant::now();
        info!(run_id = %run.id, graph_id = %graph.id, max_steps, "Run started");

        run.status = RunStatus::Running;
        run.current_node = Some(graph.start_node.clone());
        run.error = None;

        match self.drive(graph, run, max_steps).await {
            Ok(()) => {
                run.status = RunStatus::Completed;
                run.current_node = None;
                info!(
                    run_id = %run.id,
                    steps = run.log.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Run completed"
                );
            }
            Err(e) => {
                warn!(
                    run_id = %run.id,
                    node = ?run.current_node,
                    steps = run.log.len(),
                    error = %e,
                    "Run failed"
                );
                run.status = RunStatus::Failed;
                run.error = Some(e.to_string());
            }
        }
    }

    async fn drive(&self, graph: &GraphDefinition, run: &mut GraphRun, max_steps: usize) -> Result<()> {
        let mut step_count = 0;

        while let Some(current) = run.current_node.clone() {
            step_count += 1;
            if step_count > max_steps {
                return Err(StepgraphError::MaxStepsExceeded(max_steps));
            }

            let node = graph
                .nodes
                .get(&current)
                .ok_or_else(|| StepgraphError::UnknownNode(current.clone()))?;

            let tool = self
                .registry
                .get(&node.tool)
                .ok_or_else(|| StepgraphError::UnknownTool {
                    node: current.clone(),
                    tool: node.tool.clone(),
                })?;

            let output = tool
                .invoke(&run.state)
                .await
                .map_err(|e| StepgraphError::ToolInvocation {
                    node: current.clone(),
                    tool: node.tool.clone(),
                    message: e.to_string(),
                })?;

            match output {
                None | Some(serde_json::Value::Null) => {}
                // Shallow merge: top-level keys replace, the rest survive
                Some(serde_json::Value::Object(partial)) => run.state.extend(partial),
                Some(other) => {
                    return Err(StepgraphError::InvalidToolResult {
                        tool: node.tool.clone(),
                        actual: type_name(&other).to_string(),
                    });
                }
            }

            let step = ExecutionStep {
                step: step_count,
                node: current.clone(),
                state_snapshot: run.state.clone(),
            };
            debug!(run_id = %run.id, step = step_count, node = %current, tool = %node.tool, "Step recorded");
            run.log.push(step);

            if let Some(sink) = &self.sink {
                if let Some(step) = run.log.last() {
                    if let Err(e) = sink.deliver(&run.id, step).await {
                        warn!(run_id = %run.id, step = step_count, error = %e, "Step delivery failed");
                    }
                }
            }

            run.current_node = resolve_successor(&run.state, node)?;
        }

        Ok(())
    }
}
