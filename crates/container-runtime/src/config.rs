//! Connection settings for the Docker Engine.

use std::str::FromStr;

use crate::error::RuntimeError;

/// Default Docker Engine socket on Unix hosts.
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Engine API version the client speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiVersion {
    /// Negotiate with the daemon at connect time.
    #[default]
    Auto,
    /// Use exactly this version.
    Pinned { major: usize, minor: usize },
}

impl FromStr for ApiVersion {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(ApiVersion::Auto);
        }
        let invalid = || RuntimeError::InvalidApiVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(ApiVersion::Pinned {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiVersion::Auto => write!(f, "auto"),
            ApiVersion::Pinned { major, minor } => write!(f, "{major}.{minor}"),
        }
    }
}

/// Where the Docker daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Whatever the local defaults resolve to (honours `DOCKER_HOST`).
    LocalDefaults,
    /// Unix socket path
    Unix(String),
    /// `tcp://` or `http://` address
    Http(String),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST`-style address.
    pub fn parse(host: &str) -> Self {
        if let Some(path) = host.strip_prefix("unix://") {
            DockerEndpoint::Unix(path.to_string())
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            DockerEndpoint::Http(host.to_string())
        } else if host.starts_with('/') {
            DockerEndpoint::Unix(host.to_string())
        } else {
            DockerEndpoint::LocalDefaults
        }
    }
}

/// Configuration for the Docker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerConfig {
    pub endpoint: DockerEndpoint,
    pub api_version: ApiVersion,
    pub timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            endpoint: DockerEndpoint::LocalDefaults,
            api_version: ApiVersion::Auto,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl DockerConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - DOCKER_HOST (optional, default: local defaults)
    pub fn from_env() -> Self {
        let endpoint = std::env::var("DOCKER_HOST")
            .map(|host| DockerEndpoint::parse(&host))
            .unwrap_or(DockerEndpoint::LocalDefaults);
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Set the API version
    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    /// Set the request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
