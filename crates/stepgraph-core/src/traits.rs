use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{ExecutionStep, RunId};
use crate::value::StateMap;

/// Tool — a named capability invoked by graph nodes.
///
/// The tool receives the live run state and returns either a partial
/// state to merge (`Some(object)`), nothing (`None` or `Some(null)`), or
/// an error. Synchronous tools simply return a ready future.
pub trait Tool: Send + Sync + 'static {
    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Run the tool against the current state.
    fn invoke<'a>(&'a self, state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>>;
}

/// Step sink — receives every logged step of a run, in order.
///
/// Delivery errors are reported to the engine, which logs and ignores them.
pub trait StepSink: Send + Sync + 'static {
    fn deliver<'a>(&'a self, run_id: &'a RunId, step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>>;
}
