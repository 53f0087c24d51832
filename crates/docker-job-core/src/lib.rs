//! docker-job Core Library
//!
//! Turns an annotated job argument vector into bind mounts and a rewritten
//! command, then runs it in an ephemeral container.
//!
//! Pipeline: [`parse_annotations`] -> [`collect_paths`] -> [`BindPlanner`]
//! -> [`rewrite_arguments`], wrapped by [`prepare_job`]; [`JobRunner`] drives
//! the container lifecycle.

pub mod annotation;
pub mod error;
pub mod job;
pub mod lifecycle;
pub mod obs;
pub mod output;
pub mod plan;
pub mod qualify;
pub mod rewrite;
pub mod telemetry;

pub use annotation::{parse_annotations, strip_mode_prefix, AnnotatedArgument, ArgTag, PathMode};
pub use error::{AccessKind, AnnotationError, JobError, PlanError, Result, FAILURE_EXIT_CODE};
pub use job::{prepare_job, prepare_job_in, Job};
pub use lifecycle::{ContainerGuard, JobRunner, JobState, RunOptions, RunOutcome};
pub use obs::{emit_cleanup_error, emit_job_finished, emit_state, job_span, JobSpan};
pub use output::Utf8Decoder;
pub use plan::{
    collect_paths, BindPlan, BindPlanner, PathBinding, PathRequest, PlannerConfig,
    DEFAULT_MOUNT_ROOT,
};
pub use qualify::{normalize_path, qualify_path_from, CanonicalPath, QualifiedPath};
pub use rewrite::rewrite_arguments;
pub use telemetry::init_tracing;
