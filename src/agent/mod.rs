//! The autonomous troubleshooting loop and its run state.

mod control;
mod controller;
mod events;
mod run;

pub use control::{run_control, ControlState, ControlWatcher, RunControl};
pub use controller::Controller;
pub use events::{AgentEvent, EventSender, EVENT_BUFFER};
pub use run::{
    AgentRun, FailureReason, IterationRecord, IterationStatus, RunOutcome, RunPhase,
    DEFAULT_MAX_ITERATIONS,
};
