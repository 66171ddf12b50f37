//! Workflow Engine — drives a graph run from its start node to a
//! terminal status.
//!
//! Each step invokes the node's tool against the run state, merges the
//! returned partial state, records a snapshot, notifies the step sink, and
//! resolves the successor through the node's condition (or its `next`).
//! Every failure ends the run as `Failed` with a message; nothing escapes
//! [`WorkflowEngine::run`].

pub mod condition;
pub mod executor;
pub mod sink;

pub use condition::{evaluate, resolve_successor};
pub use executor::WorkflowEngine;
pub use sink::{ChannelSink, FanoutSink, JsonlSink};
