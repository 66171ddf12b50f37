use serde::{Deserialize, Serialize};

use stepgraph_core::types::{ExecutionStep, GraphId, GraphRun, RunId, RunStatus};
use stepgraph_core::value::StateMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGraphResponse {
    pub graph_id: GraphId,
    pub name: String,
}

/// Body of `POST /graph/run`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunGraphRequest {
    pub graph_id: GraphId,
    #[serde(default)]
    pub initial_state: StateMap,
    /// Falls back to the configured engine default.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunGraphResponse {
    pub run_id: RunId,
    pub final_state: StateMap,
    pub log: Vec<ExecutionStep>,
    pub status: RunStatus,
    pub error: Option<String>,
}

impl From<GraphRun> for RunGraphResponse {
    fn from(run: GraphRun) -> Self {
        Self {
            run_id: run.id,
            final_state: run.state,
            log: run.log,
            status: run.status,
            error: run.error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunStateResponse {
    pub run_id: RunId,
    pub graph_id: GraphId,
    pub status: RunStatus,
    pub current_node: Option<String>,
    pub state: StateMap,
    pub log: Vec<ExecutionStep>,
    pub error: Option<String>,
}

impl From<GraphRun> for RunStateResponse {
    fn from(run: GraphRun) -> Self {
        Self {
            run_id: run.id,
            graph_id: run.graph_id,
            status: run.status,
            current_node: run.current_node,
            state: run.state,
            log: run.log,
            error: run.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GraphSummary {
    pub name: String,
}
