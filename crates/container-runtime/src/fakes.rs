//! In-memory fake runtime (testing only)
//!
//! `ScriptedRuntime` satisfies the [`ContainerRuntime`] contract without a
//! daemon. It records every call, replays scripted output and exit status,
//! and can be told to fail at any single step or to keep the container
//! running until it is killed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::RuntimeError;
use crate::runtime_traits::*;

/// Exit status reported for a container stopped with SIGKILL.
pub const KILLED_EXIT_CODE: i64 = 137;

/// A call received by [`ScriptedRuntime`], in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    ResolveImage(String),
    PullImage(String),
    CreateContainer(ContainerSpec),
    Start(String),
    Attach(String),
    Wait(String),
    Kill(String),
    Remove { id: String, force: bool },
    RemoveImage(String),
}

/// Step at which the scripted runtime returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailAt {
    Resolve,
    Pull,
    Create,
    Start,
    Attach,
    /// The attach stream yields its chunks, then an error
    Stream,
    Wait,
    Kill,
    Remove,
    RemoveImage,
}

/// Scripted in-memory container runtime.
#[derive(Debug)]
pub struct ScriptedRuntime {
    local_images: Mutex<HashSet<String>>,
    output: Vec<Vec<u8>>,
    exit_code: i64,
    run_until_killed: bool,
    failures: HashSet<FailAt>,
    killed: AtomicBool,
    next_container: AtomicUsize,
    calls: Mutex<Vec<RuntimeCall>>,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self {
            local_images: Mutex::new(HashSet::new()),
            output: Vec::new(),
            exit_code: 0,
            run_until_killed: false,
            failures: HashSet::new(),
            killed: AtomicBool::new(false),
            next_container: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an image as already present locally.
    pub fn with_local_image(self, name: &str) -> Self {
        self.local_images.lock().unwrap().insert(name.to_string());
        self
    }

    /// Chunks the attach stream yields, in order.
    pub fn with_output<I, B>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        self.output = chunks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exit_code(mut self, exit_code: i64) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Keep the output stream open and `wait` blocked until `kill` is called.
    pub fn running_until_killed(mut self) -> Self {
        self.run_until_killed = true;
        self
    }

    pub fn failing_at(mut self, step: FailAt) -> Self {
        self.failures.insert(step);
        self
    }

    /// Snapshot of every call received so far.
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Specs passed to `create_container`.
    pub fn created(&self) -> Vec<ContainerSpec> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::CreateContainer(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&RuntimeCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, step: FailAt, operation: &'static str, target: &str) -> RuntimeResult<()> {
        if self.failures.contains(&step) {
            return Err(RuntimeError::api(operation, target, "scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn resolve_image(&self, name: &str) -> RuntimeResult<ImageLookup> {
        self.record(RuntimeCall::ResolveImage(name.to_string()));
        self.check(FailAt::Resolve, "inspect_image", name)?;
        if self.local_images.lock().unwrap().contains(name) {
            Ok(ImageLookup::Found(ImageRef::new(name, format!("sha256:{name}"))))
        } else {
            Ok(ImageLookup::NotFound)
        }
    }

    async fn pull_image(&self, name: &str) -> RuntimeResult<ImageRef> {
        self.record(RuntimeCall::PullImage(name.to_string()));
        if self.failures.contains(&FailAt::Pull) {
            return Err(RuntimeError::ImagePull {
                image: name.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        self.local_images.lock().unwrap().insert(name.to_string());
        Ok(ImageRef::new(name, format!("sha256:{name}")))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerHandle> {
        self.record(RuntimeCall::CreateContainer(spec.clone()));
        self.check(FailAt::Create, "create_container", &spec.image.name)?;
        let n = self.next_container.fetch_add(1, Ordering::SeqCst);
        Ok(ContainerHandle::new(format!("container-{n}")))
    }

    async fn start(&self, handle: &ContainerHandle) -> RuntimeResult<()> {
        self.record(RuntimeCall::Start(handle.id().to_string()));
        self.check(FailAt::Start, "start_container", handle.id())
    }

    async fn attach(&self, handle: &ContainerHandle) -> RuntimeResult<OutputStream> {
        self.record(RuntimeCall::Attach(handle.id().to_string()));
        self.check(FailAt::Attach, "attach_container", handle.id())?;

        let chunks = stream::iter(self.output.clone().into_iter().map(Ok));
        if self.failures.contains(&FailAt::Stream) {
            let failure = RuntimeError::api("attach_container", handle.id(), "stream reset");
            return Ok(chunks.chain(stream::once(async move { Err(failure) })).boxed());
        }
        if self.run_until_killed {
            return Ok(chunks.chain(stream::pending()).boxed());
        }
        Ok(chunks.boxed())
    }

    async fn wait(&self, handle: &ContainerHandle) -> RuntimeResult<i64> {
        self.record(RuntimeCall::Wait(handle.id().to_string()));
        self.check(FailAt::Wait, "wait_container", handle.id())?;
        if self.killed.load(Ordering::SeqCst) {
            return Ok(KILLED_EXIT_CODE);
        }
        if self.run_until_killed {
            futures::future::pending::<()>().await;
        }
        Ok(self.exit_code)
    }

    async fn kill(&self, handle: &ContainerHandle) -> RuntimeResult<()> {
        self.record(RuntimeCall::Kill(handle.id().to_string()));
        self.check(FailAt::Kill, "kill_container", handle.id())?;
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, handle: &ContainerHandle, force: bool) -> RuntimeResult<()> {
        self.record(RuntimeCall::Remove {
            id: handle.id().to_string(),
            force,
        });
        self.check(FailAt::Remove, "remove_container", handle.id())
    }

    async fn remove_image(&self, image: &ImageRef) -> RuntimeResult<()> {
        self.record(RuntimeCall::RemoveImage(image.name.clone()));
        self.check(FailAt::RemoveImage, "remove_image", &image.name)?;
        self.local_images.lock().unwrap().remove(&image.name);
        Ok(())
    }
}
