//! The iteration controller: drives the think→act→observe loop.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::context::ProblemContext;
use crate::executor::Executor;
use crate::guard::{Guard, Verdict};
use crate::llm::{build_prompt, ReasoningProvider};
use crate::protocol::{parse_reply, Action};

use super::control::{ControlState, ControlWatcher};
use super::events::{AgentEvent, EventSender};
use super::run::{
    AgentRun, FailureReason, IterationRecord, IterationStatus, RunOutcome, RunPhase,
};

/// Owns the run state and every collaborator for one troubleshooting
/// session. Consumed by [`Controller::run`].
pub struct Controller {
    run: AgentRun,
    context: ProblemContext,
    provider: Arc<dyn ReasoningProvider>,
    guard: Guard,
    executor: Executor,
    events: EventSender,
    watcher: ControlWatcher,
}

impl Controller {
    pub fn new(
        context: ProblemContext,
        provider: Arc<dyn ReasoningProvider>,
        max_iterations: u32,
        events: EventSender,
        watcher: ControlWatcher,
    ) -> Self {
        let guard = Guard::new(context.working_dir.clone());
        let executor = Executor::new(&context);
        Self {
            run: AgentRun::new(max_iterations),
            context,
            provider,
            guard,
            executor,
            events,
            watcher,
        }
    }

    /// Replace the executor, mainly to shorten timeouts in tests.
    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn run_id(&self) -> uuid::Uuid {
        self.run.id()
    }

    /// Drive the loop to a terminal outcome.
    pub async fn run(mut self) -> (AgentRun, RunOutcome) {
        self.events.emit(AgentEvent::RunStarted {
            run_id: self.run.id(),
            max_iterations: self.run.max_iterations(),
        });
        tracing::info!(
            run_id = %self.run.id(),
            environment = %self.context.environment,
            max_iterations = self.run.max_iterations(),
            "starting troubleshooting run"
        );

        let outcome = self.drive().await;

        tracing::info!(run_id = %self.run.id(), outcome = %outcome, "run finished");
        self.run.finish(outcome.clone());
        self.events.emit(AgentEvent::RunFinished {
            run_id: self.run.id(),
            outcome: outcome.clone(),
        });
        (self.run, outcome)
    }

    async fn drive(&mut self) -> RunOutcome {
        self.run.transition(RunPhase::Thinking);

        loop {
            // Pause and cancel are honored at the iteration boundary.
            match self.watcher.state() {
                ControlState::Cancelled => return RunOutcome::Cancelled,
                ControlState::Paused => {
                    self.run.transition(RunPhase::Paused);
                    tracing::info!(run_id = %self.run.id(), "run paused");
                    if self.watcher.wait_while_paused().await == ControlState::Cancelled {
                        return RunOutcome::Cancelled;
                    }
                    tracing::info!(run_id = %self.run.id(), "run resumed");
                    self.run.transition(RunPhase::Thinking);
                }
                ControlState::Running => {}
            }

            if self.run.ceiling_reached() {
                return RunOutcome::Failure {
                    reason: FailureReason::IterationCeiling,
                    summary: format!(
                        "iteration ceiling of {} reached without resolution",
                        self.run.max_iterations()
                    ),
                };
            }

            let number = self.run.next_number();
            let started = Instant::now();
            let started_at = Utc::now();

            let prompt = build_prompt(&self.context, self.run.iterations());
            let provider = Arc::clone(&self.provider);
            let reply = tokio::select! {
                reply = provider.next_reply(&prompt) => reply,
                _ = self.watcher.cancelled() => return RunOutcome::Cancelled,
            };

            let reply = match reply {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::error!(run_id = %self.run.id(), error = %err, "reasoning request failed");
                    return RunOutcome::Failure {
                        reason: FailureReason::Transport,
                        summary: format!("reasoning service unavailable: {err}"),
                    };
                }
            };

            let parsed = match parse_reply(&reply) {
                Ok(parsed) => parsed,
                Err(err) => {
                    // A malformed reply is recoverable: record the miss and
                    // let the next prompt show the model what went wrong.
                    tracing::warn!(run_id = %self.run.id(), error = %err, "unparseable reply");
                    self.record_iteration(IterationRecord {
                        number,
                        thought: reply.lines().next().unwrap_or_default().to_string(),
                        action: None,
                        output: String::new(),
                        status: IterationStatus::Failed,
                        duration: started.elapsed(),
                        error: Some(format!("reply could not be parsed: {err}")),
                        started_at,
                    });
                    continue;
                }
            };

            self.events.emit(AgentEvent::IterationStarted {
                number,
                thought: parsed.thought.clone(),
            });
            tracing::debug!(
                run_id = %self.run.id(),
                iteration = number,
                action = %parsed.action.describe(),
                "action proposed"
            );

            if let Action::Complete { success, summary } = &parsed.action {
                self.record_iteration(IterationRecord {
                    number,
                    thought: parsed.thought.clone(),
                    action: Some(parsed.action.clone()),
                    output: summary.clone(),
                    status: if *success {
                        IterationStatus::Succeeded
                    } else {
                        IterationStatus::Failed
                    },
                    duration: started.elapsed(),
                    error: None,
                    started_at,
                });
                return if *success {
                    RunOutcome::Success {
                        summary: summary.clone(),
                    }
                } else {
                    RunOutcome::Failure {
                        reason: FailureReason::Reported,
                        summary: summary.clone(),
                    }
                };
            }

            self.run.transition(RunPhase::Validating);
            match self.guard.check(&parsed.action) {
                Verdict::Denied(reason) => {
                    tracing::warn!(
                        run_id = %self.run.id(),
                        iteration = number,
                        reason = %reason,
                        "action denied"
                    );
                    self.run.transition(RunPhase::Thinking);
                    self.record_iteration(IterationRecord {
                        number,
                        thought: parsed.thought,
                        action: Some(parsed.action),
                        output: String::new(),
                        status: IterationStatus::Failed,
                        duration: started.elapsed(),
                        error: Some(format!("action denied: {reason}")),
                        started_at,
                    });
                    if self.run.is_stuck() {
                        return self.stuck_outcome();
                    }
                    continue;
                }
                Verdict::Allowed => {}
            }

            self.run.transition(RunPhase::Executing);
            let result = self
                .executor
                .execute(&parsed.action, &mut self.watcher)
                .await;
            if result.was_cancelled() {
                self.record_iteration(IterationRecord {
                    number,
                    thought: parsed.thought,
                    action: Some(parsed.action),
                    output: result.output,
                    status: IterationStatus::Failed,
                    duration: started.elapsed(),
                    error: Some("cancelled during execution".into()),
                    started_at,
                });
                return RunOutcome::Cancelled;
            }
            self.run.transition(RunPhase::Recording);

            let status = if result.ok() {
                IterationStatus::Succeeded
            } else {
                IterationStatus::Failed
            };
            let error = result.error.as_ref().map(|err| err.to_string());
            self.record_iteration(IterationRecord {
                number,
                thought: parsed.thought,
                action: Some(parsed.action),
                output: result.output,
                status,
                duration: started.elapsed(),
                error,
                started_at,
            });

            if self.run.is_stuck() {
                return self.stuck_outcome();
            }

            self.run.transition(RunPhase::Thinking);
        }
    }

    fn stuck_outcome(&self) -> RunOutcome {
        RunOutcome::Failure {
            reason: FailureReason::StuckLoop,
            summary: "aborted: the same action was proposed three times in a row".into(),
        }
    }

    fn record_iteration(&mut self, record: IterationRecord) {
        self.events.emit(AgentEvent::IterationCompleted {
            number: record.number,
            status: record.status,
            output: record.output.clone(),
            duration: record.duration,
        });
        self.run.record(record);
    }
}
