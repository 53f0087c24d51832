//! Structured observability hooks for the job lifecycle.
//!
//! - `job_span` / `JobSpan` tagging every event with the image name
//! - emission functions for state transitions and cleanup failures
//!
//! State transitions are `debug!` events with `event = "job.state"`.

use tracing::{debug, error, info};

use crate::lifecycle::JobState;

/// Job-scoped span; async code attaches it with `Instrument`.
pub fn job_span(image: &str) -> tracing::Span {
    tracing::info_span!("docker_job", image = %image)
}

/// RAII guard that enters [`job_span`] for synchronous work.
///
/// ```ignore
/// let _span = JobSpan::enter("alpine:3.19");
/// ```
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    pub fn enter(image: &str) -> Self {
        Self {
            _span: job_span(image).entered(),
        }
    }
}

/// Emit event: lifecycle reached `state`.
pub fn emit_state(state: JobState, container: Option<&str>) {
    match container {
        Some(id) => debug!(event = "job.state", state = %state, container = %id),
        None => debug!(event = "job.state", state = %state),
    }
}

/// Emit event: the container exited.
pub fn emit_job_finished(container: &str, exit_code: i64, interrupted: bool) {
    info!(
        event = "job.finished",
        container = %container,
        exit_code = exit_code,
        interrupted = interrupted,
    );
}

/// Emit event: a cleanup step failed. Never changes the job's exit code.
pub fn emit_cleanup_error(step: &str, target: &str, err: &dyn std::fmt::Display) {
    error!(event = "job.cleanup_error", step = %step, target = %target, error = %err);
}
