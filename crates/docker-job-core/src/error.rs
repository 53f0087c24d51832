//! Error taxonomy for docker-job.
//!
//! Each stage has its own error enum; [`JobError`] aggregates them for the
//! binary. Every job-level error maps to the same process exit code.

use std::path::PathBuf;

use container_runtime::RuntimeError;

use crate::annotation::PathMode;

/// Exit code reported for any tool-level failure.
pub const FAILURE_EXIT_CODE: u8 = 1;

/// Errors produced while parsing path annotations.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("invalid syntax: cannot close a block with '{tag}' (argument {position}): no block is open")]
    UnexpectedClose { tag: String, position: usize },

    #[error("invalid syntax: cannot close '{open}s:' block with ':{close}s' tag (argument {position})")]
    MismatchedClose {
        open: PathMode,
        close: PathMode,
        position: usize,
    },

    #[error("invalid syntax: cannot open '{nested}s:' block inside an open '{open}s:' block (argument {position})")]
    NestedBlock {
        open: PathMode,
        nested: PathMode,
        position: usize,
    },

    #[error("invalid syntax: '{mode}s:' block is never closed with ':{mode}s'")]
    UnterminatedBlock { mode: PathMode },
}

/// Kind of host access a path was checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
        }
    }
}

/// Errors produced while qualifying paths and planning binds.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid permissions: cannot {access} {path}")]
    Permission { path: String, access: AccessKind },

    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot determine the working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    #[error("mount root must be an absolute path, got {0}")]
    InvalidMountRoot(PathBuf),
}

/// Any failure that ends a docker-job invocation.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Syntax(#[from] AnnotationError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("cannot forward job output: {0}")]
    Output(#[from] std::io::Error),
}

impl JobError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        FAILURE_EXIT_CODE
    }
}

/// Result type for docker-job operations.
pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_close_display() {
        let err = AnnotationError::MismatchedClose {
            open: PathMode::Input,
            close: PathMode::Output,
            position: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("'inputs:'"));
        assert!(msg.contains("':outputs'"));
    }

    #[test]
    fn test_permission_display() {
        let err = PlanError::Permission {
            path: "/data/out/".to_string(),
            access: AccessKind::Write,
        };
        assert_eq!(
            err.to_string(),
            "invalid permissions: cannot write /data/out/"
        );
    }

    #[test]
    fn test_job_error_is_transparent_and_exits_one() {
        let err: JobError = PlanError::NotFound("/data/in.csv".to_string()).into();
        assert_eq!(err.to_string(), "not found: /data/in.csv");
        assert_eq!(err.exit_code(), 1);

        let err: JobError = RuntimeError::Connection("refused".to_string()).into();
        assert_eq!(err.exit_code(), FAILURE_EXIT_CODE);
    }
}
