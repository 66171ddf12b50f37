use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use stepgraph_core::event::EventBus;
use stepgraph_core::types::{RunId, StepEvent};

use crate::state::RunStore;

/// Ordered, duplicate-free step events for one run.
///
/// Steps already logged when the stream opens come first, then live
/// steps from the event bus. If the bus subscriber lags, the missed steps
/// are recovered from the run store.
pub(crate) struct StepStream {
    run_id: RunId,
    runs: Arc<RunStore>,
    events: broadcast::Receiver<StepEvent>,
    pending: VecDeque<StepEvent>,
    last_sent: usize,
    lagged: bool,
}

impl StepStream {
    pub(crate) async fn open(run_id: RunId, event_bus: &EventBus, runs: Arc<RunStore>) -> Self {
        // Subscribe before reading the backlog so no step falls between the two
        let events = event_bus.subscribe();
        let mut stream = Self {
            run_id,
            runs,
            events,
            pending: VecDeque::new(),
            last_sent: 0,
            lagged: false,
        };
        stream.refill().await;
        stream
    }

    /// Next step for this run, or `None` once the bus closes.
    ///
    /// Cancel-safe: a lag noticed before cancellation is recovered on the
    /// next call.
    pub(crate) async fn next(&mut self) -> Option<StepEvent> {
        loop {
            if self.lagged {
                self.refill().await;
                self.lagged = false;
            }
            if let Some(event) = self.pending.pop_front() {
                self.last_sent = event.step;
                return Some(event);
            }
            match self.events.recv().await {
                Ok(event) if event.run_id == self.run_id && event.step > self.last_sent => {
                    self.last_sent = event.step;
                    return Some(event);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(run_id = %self.run_id, skipped, "Log stream lagged, replaying from run store");
                    self.lagged = true;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Queue logged steps past the last one handed out.
    async fn refill(&mut self) {
        let after = self.pending.back().map_or(self.last_sent, |e| e.step);
        if let Some(run) = self.runs.get(&self.run_id).await {
            self.pending.extend(
                run.log
                    .iter()
                    .filter(|step| step.step > after)
                    .map(|step| StepEvent::new(&self.run_id, step)),
            );
        }
    }
}

/// Stream the steps of one run to a WebSocket client.
///
/// Client frames are read only to notice a close; a dropped client never
/// affects the run itself.
pub async fn stream_run_logs(
    mut socket: WebSocket,
    run_id: RunId,
    event_bus: Arc<EventBus>,
    runs: Arc<RunStore>,
) {
    let mut steps = StepStream::open(run_id, &event_bus, runs).await;

    loop {
        tokio::select! {
            event = steps.next() => match event {
                Some(event) => {
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    let _ = socket.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket read error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &StepEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize step event");
            Ok(())
        }
    }
}
