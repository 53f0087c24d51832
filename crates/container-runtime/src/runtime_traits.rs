//! Runtime trait definitions for docker-job
//!
//! `ContainerRuntime` is the narrow boundary between the job lifecycle and
//! whatever actually runs containers. It covers exactly the calls one job
//! needs: resolve/pull an image, create/start/attach/wait/kill/remove a
//! container, and remove the image afterwards.
//!
//! The trait is async and backend-agnostic. `DockerRuntime` talks to the
//! Docker Engine API; the `fakes` module provides a scripted in-memory runtime
//! for tests.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::RuntimeError;

/// Result type for runtime operations
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Combined stdout/stderr of an attached container, as raw byte chunks.
pub type OutputStream = BoxStream<'static, RuntimeResult<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// A locally available image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Name the caller asked for (e.g. "alpine:3.19")
    pub name: String,
    /// Runtime identifier (e.g. "sha256:…"); empty when the runtime did not report one
    pub id: String,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    /// Reference for runtime calls: the id when known, else the name.
    pub fn reference(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Outcome of a local image lookup. Absence is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLookup {
    Found(ImageRef),
    NotFound,
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountAccess {
    ReadOnly,
    ReadWrite,
}

impl MountAccess {
    /// Suffix used in Docker bind specifications.
    pub fn as_bind_flag(&self) -> &'static str {
        match self {
            MountAccess::ReadOnly => "ro",
            MountAccess::ReadWrite => "rw",
        }
    }
}

impl std::fmt::Display for MountAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_bind_flag())
    }
}

/// One host location made visible inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host_source: String,
    pub container_target: String,
    pub access: MountAccess,
}

impl Mount {
    /// Render as a `host:target:mode` bind specification.
    ///
    /// Trailing separators are dropped from both sides; the filesystem root
    /// stays `/`.
    pub fn to_bind_spec(&self) -> String {
        format!(
            "{}:{}:{}",
            trim_trailing_separator(&self.host_source),
            trim_trailing_separator(&self.container_target),
            self.access.as_bind_flag()
        )
    }
}

fn trim_trailing_separator(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Everything needed to create the job's container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: ImageRef,
    /// Command vector passed to the image entrypoint
    pub command: Vec<String>,
    pub mounts: Vec<Mount>,
}

/// Identifier of a created container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        ContainerHandle(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 chars), as `docker ps` prints it.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container runtime used by one job.
///
/// Contract:
/// - `resolve_image` reports a missing image as `ImageLookup::NotFound`,
///   never as an error.
/// - `attach` yields the combined stdout/stderr stream, including output
///   produced before the attach call, and ends when the container's
///   streams close.
/// - `wait` returns the exit status, whatever its value; a non-zero status
///   is not an error.
/// - `remove` with `force = true` removes a running container.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Look up an image in the local store.
    async fn resolve_image(&self, name: &str) -> RuntimeResult<ImageLookup>;

    /// Pull an image from its registry.
    async fn pull_image(&self, name: &str) -> RuntimeResult<ImageRef>;

    /// Create (but do not start) a detached container.
    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerHandle>;

    async fn start(&self, handle: &ContainerHandle) -> RuntimeResult<()>;

    /// Attach to the container's combined output.
    async fn attach(&self, handle: &ContainerHandle) -> RuntimeResult<OutputStream>;

    /// Block until the container exits and return its status.
    async fn wait(&self, handle: &ContainerHandle) -> RuntimeResult<i64>;

    async fn kill(&self, handle: &ContainerHandle) -> RuntimeResult<()>;

    async fn remove(&self, handle: &ContainerHandle, force: bool) -> RuntimeResult<()>;

    async fn remove_image(&self, image: &ImageRef) -> RuntimeResult<()>;
}
