//! Lossy progress events for external observers.
//!
//! Events are best-effort: a slow or absent consumer never blocks the
//! loop. When the channel is full the event is dropped and logged at
//! debug level.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::run::{IterationStatus, RunOutcome};

/// Default event channel capacity.
pub const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    RunStarted {
        run_id: Uuid,
        max_iterations: u32,
    },
    IterationStarted {
        number: u32,
        thought: String,
    },
    IterationCompleted {
        number: u32,
        status: IterationStatus,
        output: String,
        duration: Duration,
    },
    RunFinished {
        run_id: Uuid,
        outcome: RunOutcome,
    },
}

/// Non-blocking sender side of the progress stream.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Option<mpsc::Sender<AgentEvent>>,
}

impl EventSender {
    /// A sender wired to nothing. Every emit is a no-op.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a bounded channel with the default capacity.
    pub fn channel() -> (Self, mpsc::Receiver<AgentEvent>) {
        Self::channel_with(EVENT_BUFFER)
    }

    pub fn channel_with(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// Deliver an event if there is room; drop it otherwise.
    pub fn emit(&self, event: AgentEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(err) = tx.try_send(event) {
            tracing::debug!(error = %err, "dropping progress event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_dropped_when_the_buffer_is_full() {
        let (sender, mut rx) = EventSender::channel_with(1);
        sender.emit(AgentEvent::IterationStarted {
            number: 1,
            thought: "one".into(),
        });
        sender.emit(AgentEvent::IterationStarted {
            number: 2,
            thought: "two".into(),
        });

        let first = rx.recv().await.unwrap();
        match first {
            AgentEvent::IterationStarted { number, .. } => assert_eq!(number, 1),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disabled_sender_is_a_no_op() {
        let sender = EventSender::disabled();
        sender.emit(AgentEvent::RunStarted {
            run_id: Uuid::new_v4(),
            max_iterations: 20,
        });
    }
}
