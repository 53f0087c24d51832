//! Observability tests for the job lifecycle.
//!
//! These tests verify that structured tracing events are emitted for state
//! transitions, completion and cleanup failures.

use std::sync::Arc;

use container_runtime::fakes::{FailAt, ScriptedRuntime};
use docker_job_core::{
    emit_cleanup_error, emit_job_finished, emit_state, Job, JobRunner, JobSpan, JobState,
    RunOptions,
};
use tracing_test::traced_test;

/// Test: emit_state creates a debug-level event
#[traced_test]
#[test]
fn test_emit_state_logs_state_and_container() {
    emit_state(JobState::Created, Some("abc123"));
    emit_state(JobState::Idle, None);

    assert!(logs_contain("job.state"));
    assert!(logs_contain("abc123"));
}

/// Test: emit_job_finished creates an info-level event
#[traced_test]
#[test]
fn test_emit_job_finished_logs_exit_code() {
    emit_job_finished("abc123", 3, false);

    assert!(logs_contain("job.finished"));
}

/// Test: emit_cleanup_error creates an error-level event
#[traced_test]
#[test]
fn test_emit_cleanup_error_logs_step() {
    emit_cleanup_error("remove_container", "abc123", &"conflict");

    assert!(logs_contain("remove_container"));
    assert!(logs_contain("conflict"));
}

/// Test: JobSpan::enter creates an entered span without panicking
#[traced_test]
#[test]
fn test_job_span_enter_creates_span() {
    let span = JobSpan::enter("alpine:3.19");
    drop(span);
}

/// Test: a run walks through every state up to done
#[traced_test]
#[tokio::test]
async fn test_run_emits_lifecycle_states() {
    let runtime = Arc::new(ScriptedRuntime::new().with_local_image("alpine"));
    let job = Job {
        args: vec!["true".to_string()],
        bindings: Vec::new(),
    };

    JobRunner::new(runtime, RunOptions::new("alpine"))
        .run(&job, std::future::pending(), &mut Vec::new())
        .await
        .unwrap();

    for state in ["image_resolved", "created", "streaming", "waited", "removed", "done"] {
        assert!(logs_contain(state), "missing state {state}");
    }
}

/// Test: a failed removal is logged, not raised
#[traced_test]
#[tokio::test]
async fn test_failed_removal_is_logged() {
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_local_image("alpine")
            .failing_at(FailAt::Remove),
    );
    let job = Job {
        args: vec!["true".to_string()],
        bindings: Vec::new(),
    };

    let outcome = JobRunner::new(runtime, RunOptions::new("alpine"))
        .run(&job, std::future::pending(), &mut Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert!(logs_contain("job.cleanup_error"));
}
