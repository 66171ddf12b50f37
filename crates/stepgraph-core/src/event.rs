use futures::future::BoxFuture;

use crate::error::Result;
use crate::traits::StepSink;
use crate::types::{ExecutionStep, RunId, StepEvent};

/// Event bus using tokio broadcast channel.
/// All subscribers receive all step events; they filter by run id.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<StepEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: StepEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StepEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StepSink for EventBus {
    fn deliver<'a>(&'a self, run_id: &'a RunId, step: &'a ExecutionStep) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.publish(StepEvent::new(run_id, step));
            Ok(())
        })
    }
}
