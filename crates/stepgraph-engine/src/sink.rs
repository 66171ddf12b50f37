use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::traits::StepSink;
use stepgraph_core::types::{ExecutionStep, RunId, StepEvent};
use stepgraph_core::value::StateMap;

// ── ChannelSink ─────────────────────────────────────────────────

/// Forwards step events into an mpsc channel.
///
/// Delivery waits for channel capacity and fails once the receiver is dropped.
pub struct ChannelSink {
    tx: mpsc::Sender<StepEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<StepEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl StepSink for ChannelSink {
    fn deliver<'a>(&'a self, run_id: &'a RunId, step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.tx
                .send(StepEvent::new(run_id, step))
                .await
                .map_err(|_| StepgraphError::Delivery("step receiver dropped".into()))
        })
    }
}

// ── JsonlSink ───────────────────────────────────────────────────

/// Appends each step as one JSON line to `{dir}/{run_id}.jsonl`.
///
/// Append-only, so a crash mid-run leaves every earlier step intact.
pub struct JsonlSink {
    dir: PathBuf,
}

#[derive(Serialize)]
struct TraceLine<'a> {
    timestamp: String,
    run_id: &'a RunId,
    step: usize,
    node: &'a str,
    state_snapshot: &'a StateMap,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the trace file for a run.
    pub fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", run_id))
    }
}

impl StepSink for JsonlSink {
    fn deliver<'a>(&'a self, run_id: &'a RunId, step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.dir).await?;

            let line = TraceLine {
                timestamp: Utc::now().to_rfc3339(),
                run_id,
                step: step.step,
                node: &step.node,
                state_snapshot: &step.state_snapshot,
            };
            let mut json = serde_json::to_string(&line)?;
            json.push('\n');

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(run_id))
                .await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
    }
}

// ── FanoutSink ──────────────────────────────────────────────────

/// Delivers each step to several sinks in order.
///
/// Every sink is tried even if an earlier one fails; the first failure is
/// reported.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn StepSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn StepSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl StepSink for FanoutSink {
    fn deliver<'a>(&'a self, run_id: &'a RunId, step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut first_err = None;
            for sink in &self.sinks {
                if let Err(e) = sink.deliver(run_id, step).await {
                    first_err.get_or_insert(e);
                }
            }
            match first_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}
