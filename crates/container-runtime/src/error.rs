//! Error types for container-runtime

use thiserror::Error;

/// Errors raised while talking to the container runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Could not reach the runtime daemon
    #[error("Container runtime connection failed: {0}")]
    Connection(String),

    /// `--server-version` was neither `auto` nor `MAJOR.MINOR`
    #[error("Invalid API version '{0}': expected 'auto' or MAJOR.MINOR")]
    InvalidApiVersion(String),

    /// Image pull failed
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePull { image: String, reason: String },

    /// Any other runtime API call failed
    #[error("{operation} failed for '{target}': {reason}")]
    Api {
        operation: &'static str,
        target: String,
        reason: String,
    },

    /// The wait call ended without reporting an exit status
    #[error("Container '{0}' exited without a status")]
    MissingExitStatus(String),
}

impl RuntimeError {
    /// Build an [`RuntimeError::Api`] from any displayable runtime failure.
    pub fn api(
        operation: &'static str,
        target: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        RuntimeError::Api {
            operation,
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_names_operation_and_target() {
        let err = RuntimeError::api("start_container", "abc123", "no such container");
        let msg = err.to_string();
        assert!(msg.contains("start_container"));
        assert!(msg.contains("abc123"));
        assert!(msg.contains("no such container"));
    }

    #[test]
    fn test_image_pull_display() {
        let err = RuntimeError::ImagePull {
            image: "alpine:3.19".to_string(),
            reason: "manifest unknown".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to pull image 'alpine:3.19': manifest unknown"
        );
    }
}
