//! Pause/resume/cancel signalling between the caller and the loop.
//!
//! Pause is cooperative: it is only honored between iterations.
//! Cancellation is sticky and propagates into the in-flight execution's
//! timeout mechanism, killing the spawned process promptly.

use tokio::sync::watch;

/// Externally requested run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Running,
    Paused,
    Cancelled,
}

/// Caller-side handle. Clone freely; all clones feed the same run.
#[derive(Debug, Clone)]
pub struct RunControl {
    tx: watch::Sender<ControlState>,
}

impl RunControl {
    /// Request a pause at the next iteration boundary.
    pub fn pause(&self) {
        self.set(ControlState::Paused);
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        self.set(ControlState::Running);
    }

    /// Cancel the run. Irreversible: later pause/resume calls are ignored.
    pub fn cancel(&self) {
        let _ = self.tx.send(ControlState::Cancelled);
    }

    fn set(&self, state: ControlState) {
        self.tx.send_if_modified(|current| {
            if *current == ControlState::Cancelled || *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Loop-side watcher for control signals.
#[derive(Debug, Clone)]
pub struct ControlWatcher {
    rx: watch::Receiver<ControlState>,
}

impl ControlWatcher {
    pub fn state(&self) -> ControlState {
        *self.rx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == ControlState::Cancelled
    }

    /// Resolve once the run is cancelled. If the control handle is dropped
    /// without cancelling, this future never resolves.
    pub async fn cancelled(&mut self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Block while the state is `Paused`; returns the state that ended the
    /// wait (`Running` or `Cancelled`).
    pub async fn wait_while_paused(&mut self) -> ControlState {
        while self.state() == ControlState::Paused {
            if self.rx.changed().await.is_err() {
                break;
            }
        }
        self.state()
    }
}

/// Create a linked control handle and watcher, starting in `Running`.
pub fn run_control() -> (RunControl, ControlWatcher) {
    let (tx, rx) = watch::channel(ControlState::Running);
    (RunControl { tx }, ControlWatcher { rx })
}
