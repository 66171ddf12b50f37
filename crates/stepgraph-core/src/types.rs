use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StepgraphError};
use crate::value::StateMap;

/// Unique graph identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct GraphId(pub String);

impl GraphId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Graph definition ────────────────────────────────────────────

/// Comparison operator of a branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Branch rule: compare the state value at `key` against `value` and pick
/// `on_true` or `on_false`. A `None` branch ends the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the run state.
    pub key: String,
    pub op: CompareOp,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub on_true: Option<String>,
    #[serde(default)]
    pub on_false: Option<String>,
}

impl Condition {
    pub fn new(key: impl Into<String>, op: CompareOp, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            op,
            value,
            on_true: None,
            on_false: None,
        }
    }

    pub fn on_true(mut self, node: impl Into<String>) -> Self {
        self.on_true = Some(node.into());
        self
    }

    pub fn on_false(mut self, node: impl Into<String>) -> Self {
        self.on_false = Some(node.into());
        self
    }
}

/// A node bound to one tool. When `condition` is set it decides the
/// successor and `next` is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub tool: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl NodeConfig {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            next: None,
            condition: None,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Graph creation payload, before an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    pub name: String,
    pub nodes: HashMap<String, NodeConfig>,
    pub start_node: String,
}

impl GraphSpec {
    /// Check the one structural invariant enforced up front: the start
    /// node must exist. Other node references are resolved at run time.
    pub fn validate(&self) -> Result<()> {
        if !self.nodes.contains_key(&self.start_node) {
            return Err(StepgraphError::InvalidGraph(format!(
                "start_node '{}' not found in nodes",
                self.start_node
            )));
        }
        Ok(())
    }
}

/// Immutable graph shared by every run started from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub id: GraphId,
    pub name: String,
    pub nodes: HashMap<String, NodeConfig>,
    pub start_node: String,
}

impl GraphDefinition {
    /// Validate a spec and assign it an id.
    pub fn from_spec(id: GraphId, spec: GraphSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            id,
            name: spec.name,
            nodes: spec.nodes,
            start_node: spec.start_node,
        })
    }

    /// Successor names referenced by some node but not defined.
    ///
    /// Informational: such references only fail a run if they are reached.
    pub fn unresolved_references(&self) -> BTreeSet<String> {
        self.nodes
            .values()
            .flat_map(|node| {
                let cond = node.condition.as_ref();
                [
                    node.next.as_ref(),
                    cond.and_then(|c| c.on_true.as_ref()),
                    cond.and_then(|c| c.on_false.as_ref()),
                ]
            })
            .flatten()
            .filter(|name| !self.nodes.contains_key(*name))
            .cloned()
            .collect()
    }
}

// ── Runs ────────────────────────────────────────────────────────

/// Lifecycle of a run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One executed node and the state right after its tool ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step: usize,
    pub node: String,
    pub state_snapshot: StateMap,
}

/// Per-execution record, mutated in place by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRun {
    pub id: RunId,
    pub graph_id: GraphId,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub current_node: Option<String>,
    #[serde(default)]
    pub state: StateMap,
    #[serde(default)]
    pub log: Vec<ExecutionStep>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GraphRun {
    /// Create a pending run with a fresh id.
    pub fn new(graph_id: GraphId, initial_state: StateMap) -> Self {
        Self {
            id: RunId::new(),
            graph_id,
            status: RunStatus::Pending,
            current_node: None,
            state: initial_state,
            log: Vec::new(),
            error: None,
        }
    }
}

/// Observer-facing notification for one step of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub run_id: RunId,
    pub step: usize,
    pub node: String,
    pub state_snapshot: StateMap,
}

impl StepEvent {
    pub fn new(run_id: &RunId, step: &ExecutionStep) -> Self {
        Self {
            run_id: run_id.clone(),
            step: step.step,
            node: step.node.clone(),
            state_snapshot: step.state_snapshot.clone(),
        }
    }
}
