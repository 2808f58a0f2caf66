//! End-to-end runs of the troubleshooting loop against a scripted
//! reasoning provider.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use opsmedic::agent::{
    run_control, AgentEvent, Controller, EventSender, FailureReason, IterationStatus, RunOutcome,
};
use opsmedic::context::ProblemContext;
use opsmedic::testing::{reply, success_reply, ScriptedProvider};

fn context(dir: &TempDir) -> ProblemContext {
    ProblemContext::new("dev", dir.path(), "ECS service failed to deploy")
}

fn controller(
    ctx: ProblemContext,
    provider: Arc<ScriptedProvider>,
    max_iterations: u32,
) -> (Controller, opsmedic::agent::RunControl) {
    let (control, watcher) = run_control();
    let ctrl = Controller::new(
        ctx,
        provider,
        max_iterations,
        EventSender::disabled(),
        watcher,
    );
    (ctrl, control)
}

#[tokio::test]
async fn investigation_then_success() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([
        reply("look around", "shell", "echo services look fine"),
        success_reply("service is healthy again"),
    ]));

    let (ctrl, _control) = controller(context(&dir), Arc::clone(&provider), 20);
    let (run, outcome) = ctrl.run().await;

    assert_eq!(
        outcome,
        RunOutcome::Success {
            summary: "service is healthy again".to_string()
        }
    );
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(run.iterations().len(), 2);
    assert_eq!(run.iterations()[0].status, IterationStatus::Succeeded);
    assert!(run.iterations()[0].output.contains("services look fine"));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn reported_failure_maps_to_failure_outcome() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([reply(
        "nothing more to try",
        "complete",
        "Failure: could not repair the service",
    )]));

    let (ctrl, _control) = controller(context(&dir), provider, 20);
    let (run, outcome) = ctrl.run().await;

    match &outcome {
        RunOutcome::Failure { reason, summary } => {
            assert_eq!(*reason, FailureReason::Reported);
            assert!(summary.contains("could not repair"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(run.iterations().len(), 1);
    assert_eq!(run.iterations()[0].status, IterationStatus::Failed);
}

#[tokio::test]
async fn iteration_ceiling_stops_the_loop() {
    let dir = TempDir::new().unwrap();
    // Alternating commands so stuck-loop detection never fires first.
    let provider = Arc::new(ScriptedProvider::new([
        reply("a", "shell", "echo one"),
        reply("b", "shell", "echo two"),
        reply("a", "shell", "echo one"),
        reply("b", "shell", "echo two"),
    ]));

    let (ctrl, _control) = controller(context(&dir), Arc::clone(&provider), 4);
    let (run, outcome) = ctrl.run().await;

    match outcome {
        RunOutcome::Failure { reason, .. } => assert_eq!(reason, FailureReason::IterationCeiling),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(run.iterations().len(), 4);
    assert_eq!(provider.calls(), 4);
}

#[tokio::test]
async fn three_identical_actions_abort_as_stuck() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([reply(
        "same thing again",
        "shell",
        "echo same",
    )]));

    let (ctrl, _control) = controller(context(&dir), Arc::clone(&provider), 20);
    let (run, outcome) = ctrl.run().await;

    match outcome {
        RunOutcome::Failure { reason, .. } => assert_eq!(reason, FailureReason::StuckLoop),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(run.iterations().len(), 3);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn execution_result_drives_iteration_status() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([
        reply("read a file that is not there", "shell", "cat missing.yaml"),
        reply("this one works", "shell", "echo recovered"),
        success_reply("sorted out"),
    ]));

    let (ctrl, _control) = controller(context(&dir), provider, 20);
    let (run, outcome) = ctrl.run().await;

    assert!(outcome.is_success());
    let failed = &run.iterations()[0];
    assert_eq!(failed.status, IterationStatus::Failed);
    assert!(failed.error.is_some());
    let ok = &run.iterations()[1];
    assert_eq!(ok.status, IterationStatus::Succeeded);
    assert!(ok.error.is_none());
}

#[tokio::test]
async fn denied_actions_are_recorded_and_the_loop_continues() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([
        reply("clean up", "shell", "rm -rf /tmp/scratch"),
        success_reply("resolved another way"),
    ]));

    let (ctrl, _control) = controller(context(&dir), provider, 20);
    let (run, outcome) = ctrl.run().await;

    assert!(outcome.is_success());
    assert_eq!(run.iterations().len(), 2);
    let denied = &run.iterations()[0];
    assert_eq!(denied.status, IterationStatus::Failed);
    assert!(denied.error.as_deref().unwrap_or("").contains("denied"));
    // Nothing was executed for the denied iteration.
    assert!(denied.output.is_empty());
}

#[tokio::test]
async fn unparseable_replies_are_recoverable() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([
        "I think we should investigate the load balancer.".to_string(),
        success_reply("all good"),
    ]));

    let (ctrl, _control) = controller(context(&dir), provider, 20);
    let (run, outcome) = ctrl.run().await;

    assert!(outcome.is_success());
    assert_eq!(run.iterations().len(), 2);
    let failed = &run.iterations()[0];
    assert_eq!(failed.status, IterationStatus::Failed);
    assert!(failed.action.is_none());
    assert!(failed.error.as_deref().unwrap_or("").contains("parsed"));
}

#[tokio::test]
async fn transport_exhaustion_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::failing());

    let (ctrl, _control) = controller(context(&dir), provider, 20);
    let (run, outcome) = ctrl.run().await;

    match outcome {
        RunOutcome::Failure { reason, summary } => {
            assert_eq!(reason, FailureReason::Transport);
            assert!(summary.contains("unavailable"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(run.iterations().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_a_running_command() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([reply(
        "watch the log",
        "shell",
        "tail -f /dev/null",
    )]));

    let (ctrl, control) = controller(context(&dir), provider, 20);
    let handle = tokio::spawn(ctrl.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    control.cancel();

    let (run, outcome) = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not stop after cancellation")
        .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(run.iterations().len(), 1);
}

#[tokio::test]
async fn pause_holds_the_loop_until_resume() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([success_reply("nothing to fix")]));

    let (ctrl, control) = controller(context(&dir), Arc::clone(&provider), 20);
    control.pause();
    let handle = tokio::spawn(ctrl.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Still paused: no reasoning request has gone out.
    assert_eq!(provider.calls(), 0);

    control.resume();
    let (_run, outcome) = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not finish after resume")
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn events_bracket_the_run() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new([
        reply("look", "shell", "echo ok"),
        success_reply("fixed"),
    ]));

    let (control_tx, watcher) = run_control();
    let _keep = control_tx;
    let (events, mut rx) = EventSender::channel();
    let ctrl = Controller::new(context(&dir), provider, 20, events, watcher);
    let (_run, _outcome) = ctrl.run().await;

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }

    assert!(matches!(seen.first(), Some(AgentEvent::RunStarted { .. })));
    assert!(matches!(seen.last(), Some(AgentEvent::RunFinished { .. })));
    let completed = seen
        .iter()
        .filter(|e| matches!(e, AgentEvent::IterationCompleted { .. }))
        .count();
    assert_eq!(completed, 2);
}

#[tokio::test]
async fn file_edit_round_trip_through_the_loop() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("dev.yaml");
    std::fs::write(&config, "enable_task_role: false\n").unwrap();

    let provider = Arc::new(ScriptedProvider::new([
        reply(
            "enable the task role",
            "file_edit",
            "FILE:dev.yaml|OLD:enable_task_role: false|NEW:enable_task_role: true",
        ),
        success_reply("config updated"),
    ]));

    let (ctrl, _control) = controller(context(&dir), provider, 20);
    let (run, outcome) = ctrl.run().await;

    assert!(outcome.is_success());
    assert_eq!(run.iterations()[0].status, IterationStatus::Succeeded);
    let updated = std::fs::read_to_string(&config).unwrap();
    assert_eq!(updated, "enable_task_role: true\n");
}
