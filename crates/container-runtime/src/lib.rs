//! Container-Runtime: the container engine boundary for docker-job
//!
//! This crate owns every call docker-job makes to a container engine. The
//! job lifecycle only ever sees the [`ContainerRuntime`] trait.
//!
//! ## Key Components
//!
//! - `ContainerRuntime`: image resolution/pull and the container lifecycle calls
//! - `DockerRuntime`: Docker Engine API adapter (bollard)
//! - `DockerConfig`: endpoint, API version and timeout for the connection
//! - `fakes::ScriptedRuntime`: scripted in-memory runtime for tests

mod config;
mod docker;
mod error;
pub mod fakes;
pub mod runtime_traits;

pub use config::{ApiVersion, DockerConfig, DockerEndpoint, DEFAULT_SOCKET, DEFAULT_TIMEOUT_SECS};
pub use docker::DockerRuntime;
pub use error::RuntimeError;
pub use runtime_traits::{
    ContainerHandle, ContainerRuntime, ContainerSpec, ImageLookup, ImageRef, Mount, MountAccess,
    OutputStream, RuntimeResult,
};
