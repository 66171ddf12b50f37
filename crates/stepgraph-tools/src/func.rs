//! Adapters turning plain closures into [`Tool`]s.

use std::future::Future;

use futures::future::BoxFuture;
use stepgraph_core::error::Result;
use stepgraph_core::traits::Tool;
use stepgraph_core::value::StateMap;

/// A synchronous closure tool. Runs to completion inside the engine's
/// single suspension point.
pub struct FnTool<F> {
    description: String,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&StateMap) -> Result<Option<serde_json::Value>> + Send + Sync + 'static,
{
    pub fn new(description: impl Into<String>, func: F) -> Self {
        Self {
            description: description.into(),
            func,
        }
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(&StateMap) -> Result<Option<serde_json::Value>> + Send + Sync + 'static,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn invoke<'a>(&'a self, state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        let result = (self.func)(state);
        Box::pin(async move { result })
    }
}

/// An async closure tool.
///
/// The closure receives its own copy of the state so the returned future
/// can be `'static`; implement [`Tool`] directly to borrow the live state.
pub struct AsyncFnTool<F> {
    description: String,
    func: F,
}

impl<F, Fut> AsyncFnTool<F>
where
    F: Fn(StateMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<serde_json::Value>>> + Send + 'static,
{
    pub fn new(description: impl Into<String>, func: F) -> Self {
        Self {
            description: description.into(),
            func,
        }
    }
}

impl<F, Fut> Tool for AsyncFnTool<F>
where
    F: Fn(StateMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<serde_json::Value>>> + Send + 'static,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn invoke<'a>(&'a self, state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        Box::pin((self.func)(state.clone()))
    }
}
