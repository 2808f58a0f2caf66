//! opsmedic: an autonomous infrastructure troubleshooting agent.
//!
//! Given a deployment error, the agent runs a think→act→observe loop: a
//! reasoning service proposes one action per iteration in a labeled
//! free-text format, a safety guard validates it, a sandboxed executor
//! runs it, and the observation is fed back into the next prompt. The
//! loop ends when the reasoning service reports completion, the iteration
//! ceiling is hit, a stuck loop is detected, or the run is cancelled.

pub mod agent;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod guard;
pub mod llm;
pub mod protocol;

pub mod testing;

pub use agent::{Controller, RunOutcome};
pub use context::ProblemContext;
pub use error::Error;
