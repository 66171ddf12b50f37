//! Mocks and fixtures shared by the stepgraph test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::traits::{StepSink, Tool};
use stepgraph_core::types::{ExecutionStep, GraphDefinition, GraphId, NodeConfig, RunId};
use stepgraph_core::value::StateMap;

/// Build a state map from a JSON object literal.
///
/// Panics if `value` is not an object.
pub fn state(value: serde_json::Value) -> StateMap {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("state fixture must be an object, got {other}"),
    }
}

/// Build a graph definition from `(name, node)` pairs.
pub fn graph(start: &str, nodes: Vec<(&str, NodeConfig)>) -> GraphDefinition {
    GraphDefinition {
        id: GraphId::from_string("test-graph"),
        name: "test".to_string(),
        nodes: nodes
            .into_iter()
            .map(|(name, node)| (name.to_string(), node))
            .collect::<HashMap<_, _>>(),
        start_node: start.to_string(),
    }
}

enum MockBehavior {
    Return(Option<serde_json::Value>),
    Fail(String),
}

/// A tool with canned output that counts its invocations.
pub struct MockTool {
    behavior: MockBehavior,
    description: String,
    calls: AtomicUsize,
}

impl MockTool {
    /// Always returns `value`.
    pub fn returning(value: serde_json::Value) -> Self {
        Self::with(MockBehavior::Return(Some(value)))
    }

    /// Returns nothing.
    pub fn noop() -> Self {
        Self::with(MockBehavior::Return(None))
    }

    /// Always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with(MockBehavior::Fail(message.into()))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn with(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            description: String::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Tool for MockTool {
    fn description(&self) -> &str {
        &self.description
    }

    fn invoke<'a>(&'a self, _state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match &self.behavior {
                MockBehavior::Return(v) => Ok(v.clone()),
                MockBehavior::Fail(msg) => Err(StepgraphError::tool(msg.clone())),
            }
        })
    }
}

/// Sink that records every delivered `(run_id, step)` pair.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(RunId, ExecutionStep)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<(RunId, ExecutionStep)> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl StepSink for RecordingSink {
    fn deliver<'a>(&'a self, run_id: &'a RunId, step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            if let Ok(mut d) = self.delivered.lock() {
                d.push((run_id.clone(), step.clone()));
            }
            Ok(())
        })
    }
}

/// Sink whose every delivery fails, like a disconnected observer.
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl StepSink for FailingSink {
    fn deliver<'a>(&'a self, _run_id: &'a RunId, _step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(StepgraphError::Delivery("observer disconnected".into())) })
    }
}

/// Write `contents` to a fresh temp file and return its handle.
pub fn temp_file_with(contents: &str) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(contents.as_bytes()).expect("write temp file");
    tmp
}
