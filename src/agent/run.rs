//! Run state: phases, iteration records, and terminal outcomes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::Action;

/// Phase of the iteration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Created, not yet started.
    Idle,
    /// Waiting on the reasoning service.
    Thinking,
    /// Guard is evaluating the proposed action.
    Validating,
    /// The executor is running the action.
    Executing,
    /// Finalizing the iteration record.
    Recording,
    /// Paused between iterations by external request.
    Paused,
    /// Terminal: the reasoning service reported success.
    Succeeded,
    /// Terminal: failure (reported, ceiling, stuck loop, or transport).
    Failed,
    /// Terminal: cancelled by external signal.
    Cancelled,
}

impl RunPhase {
    /// Whether moving to `target` is a legal transition.
    pub fn can_transition_to(&self, target: RunPhase) -> bool {
        use RunPhase::*;

        // Cancellation is reachable from any non-terminal state.
        if target == Cancelled {
            return !self.is_terminal();
        }

        matches!(
            (self, target),
            (Idle, Thinking)
                | (Thinking, Validating)
                | (Thinking, Succeeded)
                | (Thinking, Failed)
                | (Thinking, Paused)
                | (Validating, Executing)
                | (Validating, Thinking)
                | (Executing, Recording)
                | (Recording, Thinking)
                | (Recording, Failed)
                | (Paused, Thinking)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != Self::Idle
    }
}

/// Final status of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One completed think→act→observe cycle. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based, monotonically increasing within a run.
    pub number: u32,
    /// The reasoning text.
    pub thought: String,
    /// The chosen action; `None` when the reply failed to parse.
    pub action: Option<Action>,
    /// Captured output (observation fed to the next turn).
    pub output: String,
    pub status: IterationStatus,
    pub duration: Duration,
    /// Detailed error when the iteration failed.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Why a run ended in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The reasoning service declared the problem unsolved.
    Reported,
    /// The iteration ceiling was reached before a terminal action.
    IterationCeiling,
    /// The last three iterations proposed identical actions.
    StuckLoop,
    /// Reasoning-service transport retries were exhausted.
    Transport,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Reported => "reported",
            Self::IterationCeiling => "iteration-ceiling",
            Self::StuckLoop => "stuck-loop",
            Self::Transport => "transport",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of a run. Set exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Success { summary: String },
    Failure { reason: FailureReason, summary: String },
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Success { summary } | Self::Failure { summary, .. } => summary,
            Self::Cancelled => "cancelled by external signal",
        }
    }

    /// Process exit status for the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { .. } => 0,
            Self::Failure { .. } => 1,
            Self::Cancelled => 130,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { .. } => f.write_str("success"),
            Self::Failure { reason, .. } => write!(f, "failure ({reason})"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Default iteration ceiling, guarding against infinite loops.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// How many consecutive identical actions count as a stuck loop.
const STUCK_WINDOW: usize = 3;

/// Full state of one troubleshooting session. Exclusively owned and
/// mutated by the controller; everything observable is exposed read-only.
#[derive(Debug)]
pub struct AgentRun {
    id: Uuid,
    phase: RunPhase,
    iterations: Vec<IterationRecord>,
    max_iterations: u32,
    outcome: Option<RunOutcome>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl AgentRun {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: RunPhase::Idle,
            iterations: Vec::new(),
            max_iterations: max_iterations.max(1),
            outcome: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Ordered, append-only history. Never reordered or pruned: it feeds
    /// every subsequent prompt.
    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Sequence number for the iteration about to start.
    pub fn next_number(&self) -> u32 {
        self.iterations.len() as u32 + 1
    }

    pub fn ceiling_reached(&self) -> bool {
        self.iterations.len() as u32 >= self.max_iterations
    }

    /// Whether the trailing window of completed iterations proposed
    /// identical actions (kind and payload).
    pub fn is_stuck(&self) -> bool {
        if self.iterations.len() < STUCK_WINDOW {
            return false;
        }
        let tail = &self.iterations[self.iterations.len() - STUCK_WINDOW..];
        let Some(first) = tail[0].action.as_ref() else {
            return false;
        };
        tail[1..]
            .iter()
            .all(|record| record.action.as_ref() == Some(first))
    }

    pub(crate) fn transition(&mut self, next: RunPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::trace!(run_id = %self.id, from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }

    pub(crate) fn record(&mut self, record: IterationRecord) {
        debug_assert_eq!(record.number as usize, self.iterations.len() + 1);
        self.iterations.push(record);
    }

    /// Set the terminal outcome exactly once and move to the matching phase.
    pub(crate) fn finish(&mut self, outcome: RunOutcome) {
        if self.outcome.is_some() {
            tracing::warn!(run_id = %self.id, "outcome already set, ignoring");
            return;
        }
        let phase = match &outcome {
            RunOutcome::Success { .. } => RunPhase::Succeeded,
            RunOutcome::Failure { .. } => RunPhase::Failed,
            RunOutcome::Cancelled => RunPhase::Cancelled,
        };
        self.transition(phase);
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }
}
