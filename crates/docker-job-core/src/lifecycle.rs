//! Container lifecycle for one job.
//!
//! `Idle -> ImageResolved -> Created -> Started -> Streaming -> Waited ->
//! Removed -> Done`, with `Killed` between `Streaming` and `Removed` when the
//! caller interrupts. Once a container exists it is removed on every exit
//! path (unless kept); once the image is resolved it is removed on every exit
//! path when requested.

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;

use container_runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, ImageLookup, ImageRef};
use futures::StreamExt;
use tracing::{debug, info, warn, Instrument};

use crate::error::{JobError, Result, FAILURE_EXIT_CODE};
use crate::job::Job;
use crate::obs::{emit_cleanup_error, emit_job_finished, emit_state, job_span};
use crate::output::Utf8Decoder;

/// Per-run settings from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// `NAME[:TAG]` of the image to run
    pub image: String,
    pub keep_container: bool,
    pub remove_image: bool,
}

impl RunOptions {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            keep_container: false,
            remove_image: false,
        }
    }
}

/// Lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    ImageResolved,
    Created,
    Started,
    Streaming,
    Waited,
    Killed,
    Removed,
    Done,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::ImageResolved => "image_resolved",
            JobState::Created => "created",
            JobState::Started => "started",
            JobState::Streaming => "streaming",
            JobState::Waited => "waited",
            JobState::Killed => "killed",
            JobState::Removed => "removed",
            JobState::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The container exited on its own
    Completed { exit_code: i64 },
    /// The caller interrupted the run; `exit_code` is the container status
    /// after the kill, when one was observed
    Interrupted { exit_code: Option<i64> },
}

impl RunOutcome {
    /// Process exit code: the container status, or `1` when the run was
    /// interrupted without a non-zero status. Statuses outside `0..=255`
    /// also map to `1`.
    pub fn exit_code(&self) -> u8 {
        match *self {
            RunOutcome::Completed { exit_code } => {
                u8::try_from(exit_code).unwrap_or(FAILURE_EXIT_CODE)
            }
            RunOutcome::Interrupted {
                exit_code: Some(code),
            } if code != 0 => u8::try_from(code).unwrap_or(FAILURE_EXIT_CODE),
            RunOutcome::Interrupted { .. } => FAILURE_EXIT_CODE,
        }
    }
}

/// Owns a created container until it is released.
///
/// `release` removes the container (forced) unless it is to be kept. A guard
/// dropped without being released logs the leaked container.
pub struct ContainerGuard {
    handle: ContainerHandle,
    keep: bool,
    released: bool,
}

impl ContainerGuard {
    pub fn new(handle: ContainerHandle, keep: bool) -> Self {
        Self {
            handle,
            keep,
            released: false,
        }
    }

    pub fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    pub async fn release(mut self, runtime: &dyn ContainerRuntime) {
        self.released = true;
        if self.keep {
            info!("Keeping container {}", self.handle);
            return;
        }
        debug!("Removing container {}", self.handle);
        match runtime.remove(&self.handle, true).await {
            Ok(()) => emit_state(JobState::Removed, Some(self.handle.id())),
            Err(e) => emit_cleanup_error("remove_container", self.handle.id(), &e),
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!("Container {} was not removed", self.handle);
        }
    }
}

/// Runs a prepared [`Job`] in a fresh container.
pub struct JobRunner {
    runtime: Arc<dyn ContainerRuntime>,
    options: RunOptions,
}

impl JobRunner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, options: RunOptions) -> Self {
        Self { runtime, options }
    }

    /// Run `job`, forwarding its output to `out`.
    ///
    /// `interrupt` completing is the cancellation signal. It is observed
    /// while the image is resolved and while the container runs.
    pub async fn run<I, W>(&self, job: &Job, interrupt: I, out: &mut W) -> Result<RunOutcome>
    where
        I: Future<Output = ()>,
        W: Write,
    {
        self.run_in_span(job, interrupt, out)
            .instrument(job_span(&self.options.image))
            .await
    }

    async fn run_in_span<I, W>(&self, job: &Job, interrupt: I, out: &mut W) -> Result<RunOutcome>
    where
        I: Future<Output = ()>,
        W: Write,
    {
        emit_state(JobState::Idle, None);
        let mut interrupt = std::pin::pin!(interrupt);

        let image = tokio::select! {
            biased;
            _ = interrupt.as_mut() => {
                info!("Interrupted while resolving image '{}'", self.options.image);
                return Ok(RunOutcome::Interrupted { exit_code: None });
            }
            image = self.resolve_image() => image?,
        };
        emit_state(JobState::ImageResolved, None);

        let result = self.run_container(&image, job, interrupt, out).await;

        if self.options.remove_image {
            debug!("Removing image {}", image);
            if let Err(e) = self.runtime.remove_image(&image).await {
                emit_cleanup_error("remove_image", &image.name, &e);
            }
        }
        emit_state(JobState::Done, None);
        result
    }

    async fn resolve_image(&self) -> Result<ImageRef> {
        let name = &self.options.image;
        match self.runtime.resolve_image(name).await? {
            ImageLookup::Found(image) => Ok(image),
            ImageLookup::NotFound => {
                info!("Pulling image '{}'", name);
                Ok(self.runtime.pull_image(name).await?)
            }
        }
    }

    async fn run_container<I, W>(
        &self,
        image: &ImageRef,
        job: &Job,
        interrupt: Pin<&mut I>,
        out: &mut W,
    ) -> Result<RunOutcome>
    where
        I: Future<Output = ()>,
        W: Write,
    {
        let spec = ContainerSpec {
            image: image.clone(),
            command: job.args.clone(),
            mounts: job.mounts(),
        };
        debug!(command = ?spec.command, mounts = spec.mounts.len(), "Creating container");
        let handle = self.runtime.create_container(&spec).await?;
        emit_state(JobState::Created, Some(handle.id()));
        debug!("Running container {}", handle);

        let guard = ContainerGuard::new(handle, self.options.keep_container);
        let result = self.drive(guard.handle(), interrupt, out).await;
        guard.release(self.runtime.as_ref()).await;
        result
    }

    async fn drive<I, W>(
        &self,
        handle: &ContainerHandle,
        interrupt: Pin<&mut I>,
        out: &mut W,
    ) -> Result<RunOutcome>
    where
        I: Future<Output = ()>,
        W: Write,
    {
        let work = async {
            self.runtime.start(handle).await?;
            emit_state(JobState::Started, Some(handle.id()));

            let mut output = self.runtime.attach(handle).await?;
            emit_state(JobState::Streaming, Some(handle.id()));
            let mut decoder = Utf8Decoder::new();
            while let Some(chunk) = output.next().await {
                let text = decoder.decode(&chunk?);
                out.write_all(text.as_bytes())?;
                out.flush()?;
            }
            out.write_all(decoder.finish().as_bytes())?;
            out.flush()?;

            let exit_code = self.runtime.wait(handle).await?;
            emit_state(JobState::Waited, Some(handle.id()));
            Ok::<_, JobError>(exit_code)
        };

        tokio::select! {
            biased;
            _ = interrupt => {
                let exit_code = self.kill(handle).await;
                emit_job_finished(handle.id(), exit_code.unwrap_or(-1), true);
                Ok(RunOutcome::Interrupted { exit_code })
            }
            exit_code = work => {
                let exit_code = exit_code?;
                emit_job_finished(handle.id(), exit_code, false);
                Ok(RunOutcome::Completed { exit_code })
            }
        }
    }

    /// Kill the container and collect the status it exits with.
    async fn kill(&self, handle: &ContainerHandle) -> Option<i64> {
        info!("Interrupted, killing container {}", handle.short());
        if let Err(e) = self.runtime.kill(handle).await {
            // the container may already have exited
            warn!("Kill failed for {}: {}", handle, e);
        }
        emit_state(JobState::Killed, Some(handle.id()));
        match self.runtime.wait(handle).await {
            Ok(code) => Some(code),
            Err(e) => {
                warn!("No exit status after kill for {}: {}", handle, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_exit_code_is_container_status() {
        assert_eq!(RunOutcome::Completed { exit_code: 0 }.exit_code(), 0);
        assert_eq!(RunOutcome::Completed { exit_code: 42 }.exit_code(), 42);
        assert_eq!(RunOutcome::Completed { exit_code: 300 }.exit_code(), 1);
        assert_eq!(RunOutcome::Completed { exit_code: -1 }.exit_code(), 1);
    }

    #[test]
    fn test_interrupted_exit_code() {
        assert_eq!(
            RunOutcome::Interrupted {
                exit_code: Some(137)
            }
            .exit_code(),
            137
        );
        assert_eq!(
            RunOutcome::Interrupted { exit_code: Some(0) }.exit_code(),
            1
        );
        assert_eq!(RunOutcome::Interrupted { exit_code: None }.exit_code(), 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(JobState::ImageResolved.to_string(), "image_resolved");
        assert_eq!(JobState::Done.to_string(), "done");
    }
}
