//! Trait contract tests for ContainerRuntime.
//!
//! These tests pin down the behavioural contract the job lifecycle relies on,
//! exercised against the scripted in-memory runtime.

use container_runtime::fakes::{FailAt, RuntimeCall, ScriptedRuntime, KILLED_EXIT_CODE};
use container_runtime::runtime_traits::*;
use container_runtime::RuntimeError;
use futures::StreamExt;

fn spec(image: ImageRef) -> ContainerSpec {
    ContainerSpec {
        image,
        command: vec!["cat".to_string(), "/tmp/abc/in.csv".to_string()],
        mounts: vec![Mount {
            host_source: "/data/in.csv".to_string(),
            container_target: "/tmp/abc/in.csv".to_string(),
            access: MountAccess::ReadOnly,
        }],
    }
}

async fn collect_output(stream: OutputStream) -> Vec<u8> {
    stream
        .map(|chunk| chunk.unwrap())
        .concat()
        .await
}

// ===========================================================================
// Images
// ===========================================================================

#[tokio::test]
async fn resolve_missing_image_is_not_an_error() {
    let runtime = ScriptedRuntime::new();
    let lookup = runtime.resolve_image("alpine:3.19").await.unwrap();

    assert_eq!(lookup, ImageLookup::NotFound);
}

#[tokio::test]
async fn resolve_local_image_is_found() {
    let runtime = ScriptedRuntime::new().with_local_image("alpine:3.19");
    match runtime.resolve_image("alpine:3.19").await.unwrap() {
        ImageLookup::Found(image) => assert_eq!(image.name, "alpine:3.19"),
        other => panic!("expected Found, got {other:?}"),
    }
}

#[tokio::test]
async fn pulled_image_resolves_afterwards() {
    let runtime = ScriptedRuntime::new();
    let pulled = runtime.pull_image("busybox").await.unwrap();

    assert_eq!(
        runtime.resolve_image("busybox").await.unwrap(),
        ImageLookup::Found(pulled)
    );
}

#[tokio::test]
async fn pull_failure_is_image_pull_error() {
    let runtime = ScriptedRuntime::new().failing_at(FailAt::Pull);
    let err = runtime.pull_image("busybox").await.unwrap_err();

    assert!(matches!(err, RuntimeError::ImagePull { .. }));
}

// ===========================================================================
// Containers
// ===========================================================================

#[tokio::test]
async fn attach_streams_scripted_output_then_ends() {
    let runtime = ScriptedRuntime::new().with_output(["hello ", "world\n"]);
    let image = runtime.pull_image("busybox").await.unwrap();
    let handle = runtime.create_container(&spec(image)).await.unwrap();
    runtime.start(&handle).await.unwrap();

    let output = collect_output(runtime.attach(&handle).await.unwrap()).await;
    assert_eq!(output, b"hello world\n");
}

#[tokio::test]
async fn wait_reports_non_zero_status_as_value() {
    let runtime = ScriptedRuntime::new().with_exit_code(3);
    let image = runtime.pull_image("busybox").await.unwrap();
    let handle = runtime.create_container(&spec(image)).await.unwrap();

    assert_eq!(runtime.wait(&handle).await.unwrap(), 3);
}

#[tokio::test]
async fn killed_container_reports_kill_status() {
    let runtime = ScriptedRuntime::new().running_until_killed();
    let image = runtime.pull_image("busybox").await.unwrap();
    let handle = runtime.create_container(&spec(image)).await.unwrap();
    runtime.kill(&handle).await.unwrap();

    assert_eq!(runtime.wait(&handle).await.unwrap(), KILLED_EXIT_CODE);
}

#[tokio::test]
async fn created_containers_get_distinct_handles() {
    let runtime = ScriptedRuntime::new();
    let image = runtime.pull_image("busybox").await.unwrap();
    let a = runtime.create_container(&spec(image.clone())).await.unwrap();
    let b = runtime.create_container(&spec(image)).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(runtime.created().len(), 2);
}

#[tokio::test]
async fn calls_are_recorded_in_order() {
    let runtime = ScriptedRuntime::new();
    let image = runtime.pull_image("busybox").await.unwrap();
    let handle = runtime.create_container(&spec(image.clone())).await.unwrap();
    runtime.start(&handle).await.unwrap();
    runtime.remove(&handle, true).await.unwrap();
    runtime.remove_image(&image).await.unwrap();

    assert_eq!(
        runtime.calls(),
        vec![
            RuntimeCall::PullImage("busybox".to_string()),
            RuntimeCall::CreateContainer(spec(image)),
            RuntimeCall::Start(handle.id().to_string()),
            RuntimeCall::Remove {
                id: handle.id().to_string(),
                force: true
            },
            RuntimeCall::RemoveImage("busybox".to_string()),
        ]
    );
}

#[tokio::test]
async fn stream_failure_surfaces_after_output() {
    let runtime = ScriptedRuntime::new()
        .with_output(["partial"])
        .failing_at(FailAt::Stream);
    let image = runtime.pull_image("busybox").await.unwrap();
    let handle = runtime.create_container(&spec(image)).await.unwrap();

    let items: Vec<_> = runtime.attach(&handle).await.unwrap().collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), b"partial");
    assert!(matches!(items[1], Err(RuntimeError::Api { .. })));
}

#[tokio::test]
async fn scripted_failure_names_the_operation() {
    let runtime = ScriptedRuntime::new().failing_at(FailAt::Start);
    let image = runtime.pull_image("busybox").await.unwrap();
    let handle = runtime.create_container(&spec(image)).await.unwrap();
    let err = runtime.start(&handle).await.unwrap_err();

    assert!(err.to_string().contains("start_container"));
}
