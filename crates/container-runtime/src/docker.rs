//! Docker Engine implementation of [`ContainerRuntime`].
//!
//! Thin adapter over bollard: every call maps onto one Engine API request and
//! every bollard error is folded into a [`RuntimeError`] naming the operation.

use std::time::Duration;

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    AttachContainerOptionsBuilder, CreateContainerOptions, CreateImageOptionsBuilder,
    KillContainerOptions, RemoveContainerOptionsBuilder, RemoveImageOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::{ClientVersion, Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::config::{ApiVersion, DockerConfig, DockerEndpoint, DEFAULT_SOCKET};
use crate::error::RuntimeError;
use crate::runtime_traits::{
    ContainerHandle, ContainerRuntime, ContainerSpec, ImageLookup, ImageRef, OutputStream,
    RuntimeResult,
};

/// Docker Engine connection
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon described by `config`.
    ///
    /// With [`ApiVersion::Auto`] the client version is negotiated with the
    /// daemon before returning.
    pub async fn connect(config: &DockerConfig) -> RuntimeResult<Self> {
        let docker = match config.api_version {
            ApiVersion::Auto => {
                let docker = connect_endpoint(config, API_DEFAULT_VERSION)?;
                docker
                    .negotiate_version()
                    .await
                    .map_err(|e| RuntimeError::Connection(e.to_string()))?
            }
            ApiVersion::Pinned { major, minor } => {
                let version = ClientVersion {
                    major_version: major,
                    minor_version: minor,
                };
                connect_endpoint(config, &version)?
            }
        };
        debug!(endpoint = ?config.endpoint, api_version = %config.api_version, "Connected to Docker");
        Ok(Self { docker })
    }
}

/// Build a client for the configured endpoint. The request timeout applies
/// to every endpoint, local defaults included.
fn connect_endpoint(config: &DockerConfig, version: &ClientVersion) -> RuntimeResult<Docker> {
    let connected = match (&config.endpoint, config.api_version) {
        (DockerEndpoint::LocalDefaults, ApiVersion::Auto) => Docker::connect_with_local_defaults(),
        (DockerEndpoint::LocalDefaults, ApiVersion::Pinned { .. }) => {
            Docker::connect_with_socket(DEFAULT_SOCKET, config.timeout_secs, version)
        }
        (DockerEndpoint::Unix(path), _) => {
            Docker::connect_with_socket(path, config.timeout_secs, version)
        }
        (DockerEndpoint::Http(addr), _) => {
            Docker::connect_with_http(addr, config.timeout_secs, version)
        }
    };
    connected
        .map(|docker| docker.with_timeout(Duration::from_secs(config.timeout_secs)))
        .map_err(|e| RuntimeError::Connection(e.to_string()))
}

fn is_not_found_error(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Split `repo[:tag]` for the pull API. Registry ports (`host:5000/repo`) are
/// not tags; digest references are passed through whole.
fn split_image_reference(name: &str) -> (&str, Option<&str>) {
    if name.contains('@') {
        return (name, None);
    }
    match name.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag)),
        _ => (name, Some("latest")),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn resolve_image(&self, name: &str) -> RuntimeResult<ImageLookup> {
        match self.docker.inspect_image(name).await {
            Ok(inspect) => Ok(ImageLookup::Found(ImageRef::new(
                name,
                inspect.id.unwrap_or_default(),
            ))),
            Err(e) if is_not_found_error(&e) => Ok(ImageLookup::NotFound),
            Err(e) => Err(RuntimeError::api("inspect_image", name, e)),
        }
    }

    async fn pull_image(&self, name: &str) -> RuntimeResult<ImageRef> {
        let (repo, tag) = split_image_reference(name);
        let mut options = CreateImageOptionsBuilder::new().from_image(repo);
        if let Some(tag) = tag {
            options = options.tag(tag);
        }

        let mut progress = Box::pin(self.docker.create_image(Some(options.build()), None, None));
        while let Some(item) = progress.next().await {
            let item = item.map_err(|e| RuntimeError::ImagePull {
                image: name.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(status) = item.status {
                debug!(image = %name, "{}", status);
            }
        }

        match self.resolve_image(name).await? {
            ImageLookup::Found(image) => Ok(image),
            ImageLookup::NotFound => Err(RuntimeError::ImagePull {
                image: name.to_string(),
                reason: "image not present after pull".to_string(),
            }),
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerHandle> {
        let binds: Vec<String> = spec.mounts.iter().map(|m| m.to_bind_spec()).collect();
        let body = ContainerCreateBody {
            image: Some(spec.image.reference().to_string()),
            cmd: Some(spec.command.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(HostConfig {
                binds: if binds.is_empty() { None } else { Some(binds) },
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        };

        let created = self
            .docker
            .create_container(None::<CreateContainerOptions>, body)
            .await
            .map_err(|e| RuntimeError::api("create_container", &spec.image.name, e))?;
        for warning in &created.warnings {
            warn!(container = %created.id, "{}", warning);
        }
        Ok(ContainerHandle::new(created.id))
    }

    async fn start(&self, handle: &ContainerHandle) -> RuntimeResult<()> {
        self.docker
            .start_container(handle.id(), None::<StartContainerOptions>)
            .await
            .map_err(|e| RuntimeError::api("start_container", handle.id(), e))
    }

    async fn attach(&self, handle: &ContainerHandle) -> RuntimeResult<OutputStream> {
        let options = AttachContainerOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .stream(true)
            .logs(true)
            .build();
        let attached = self
            .docker
            .attach_container(handle.id(), Some(options))
            .await
            .map_err(|e| RuntimeError::api("attach_container", handle.id(), e))?;

        let id = handle.id().to_string();
        let output = attached.output.map(move |chunk| {
            chunk
                .map(|log| log.into_bytes().to_vec())
                .map_err(|e| RuntimeError::api("attach_container", id.clone(), e))
        });
        Ok(output.boxed())
    }

    async fn wait(&self, handle: &ContainerHandle) -> RuntimeResult<i64> {
        let mut waiting = Box::pin(
            self.docker
                .wait_container(handle.id(), None::<WaitContainerOptions>),
        );
        match waiting.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as an error carrying the code
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RuntimeError::api("wait_container", handle.id(), e)),
            None => Err(RuntimeError::MissingExitStatus(handle.id().to_string())),
        }
    }

    async fn kill(&self, handle: &ContainerHandle) -> RuntimeResult<()> {
        self.docker
            .kill_container(handle.id(), None::<KillContainerOptions>)
            .await
            .map_err(|e| RuntimeError::api("kill_container", handle.id(), e))
    }

    async fn remove(&self, handle: &ContainerHandle, force: bool) -> RuntimeResult<()> {
        let options = RemoveContainerOptionsBuilder::new().force(force).build();
        self.docker
            .remove_container(handle.id(), Some(options))
            .await
            .map_err(|e| RuntimeError::api("remove_container", handle.id(), e))
    }

    async fn remove_image(&self, image: &ImageRef) -> RuntimeResult<()> {
        self.docker
            .remove_image(image.reference(), None::<RemoveImageOptions>, None)
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::api("remove_image", &image.name, e))
    }
}
