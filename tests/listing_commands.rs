//! Image, volume, resource and version commands against a mock API.

mod common;

use std::time::{Duration, Instant};

use common::{run_command, test_config, MockBackend, MockResponse};
use hypeman_cli::cancel::CancelToken;
use hypeman_cli::commands::CliError;

#[tokio::test]
async fn test_image_list_table() {
    let backend = MockBackend::start().await;
    backend
        .enqueue_response(MockResponse::json(
            r#"[{"name": "docker.io/library/alpine:3.19", "status": "ready",
                 "digest": "sha256:c5b1261d6d3e43071626931fc004f70149baeba2c8ec672bd4f27761f8e1ad6b",
                 "size_bytes": 3623878}]"#,
        ))
        .await;

    let (result, out) =
        run_command(&backend, &["image", "list"], test_config(), CancelToken::new()).await;

    result.unwrap();
    let stdout = out.stdout();
    assert!(stdout.starts_with("NAME"));
    assert!(stdout.contains("sha256:c5b1261d6d3e "));
    assert!(stdout.contains("3.5 MB"));
    assert!(!stdout.contains("ad6b"));
}

#[tokio::test]
async fn test_image_list_empty() {
    let backend = MockBackend::start().await;
    backend.enqueue_response(MockResponse::json("[]")).await;

    let (result, out) =
        run_command(&backend, &["image", "list"], test_config(), CancelToken::new()).await;

    result.unwrap();
    assert_eq!(out.stdout(), "");
    assert_eq!(out.notices(), "No images found.\n");
}

#[tokio::test]
async fn test_image_get_yaml_with_transform() {
    let backend = MockBackend::start().await;
    backend
        .enqueue_response(MockResponse::json(
            r#"{"name": "alpine", "status": "ready", "config": {"env": ["PATH=/bin"]}}"#,
        ))
        .await;

    let (result, out) = run_command(
        &backend,
        &["--format", "yaml", "--transform", "config", "image", "get", "alpine"],
        test_config(),
        CancelToken::new(),
    )
    .await;

    result.unwrap();
    assert_eq!(out.stdout(), "env:\n- PATH=/bin\n");
}

#[tokio::test]
async fn test_image_create_wait_cancelled_while_polling() {
    let backend = MockBackend::start().await;
    backend
        .enqueue_response(MockResponse::json(r#"{"name": "big", "status": "pending"}"#))
        .await;
    for _ in 0..200 {
        backend
            .enqueue_response(MockResponse::json(r#"{"name": "big", "status": "pending"}"#))
            .await;
    }

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let (result, out) = run_command(
        &backend,
        &["image", "create", "big", "--wait"],
        test_config(),
        cancel,
    )
    .await;

    assert!(matches!(result, Err(CliError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(out.notices(), "Queued...\n", "unchanged phases are not repeated");
}

#[tokio::test]
async fn test_image_delete_reports_on_stderr() {
    let backend = MockBackend::start().await;
    backend.enqueue_response(MockResponse::json("")).await;

    let (result, out) = run_command(
        &backend,
        &["image", "rm", "docker.io/library/alpine:3.19"],
        test_config(),
        CancelToken::new(),
    )
    .await;

    result.unwrap();
    assert_eq!(out.notices(), "Deleted image docker.io/library/alpine:3.19\n");
    let requests = backend.captured_requests().await;
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path, "/images/docker.io%2Flibrary%2Falpine:3.19");
}

#[tokio::test]
async fn test_volume_list_quiet() {
    let backend = MockBackend::start().await;
    backend
        .enqueue_response(MockResponse::json(
            r#"[{"id": "vol-1", "name": "data", "size_gb": 10}, {"id": "vol-2", "name": "cache", "size_gb": 1}]"#,
        ))
        .await;

    let (result, out) = run_command(
        &backend,
        &["volume", "list", "-q"],
        test_config(),
        CancelToken::new(),
    )
    .await;

    result.unwrap();
    assert_eq!(out.stdout(), "vol-1\nvol-2\n");
}

#[tokio::test]
async fn test_resources_table_and_json() {
    let report = r#"{
        "cpu": {"capacity": 8, "effective_limit": 16, "allocated": 2, "available": 14, "oversub_ratio": 2.0},
        "network": {"capacity": 125000000, "effective_limit": 125000000, "allocated": 0,
                    "available": 125000000, "oversub_ratio": 1.0}
    }"#;
    let backend = MockBackend::start().await;
    backend.enqueue_response(MockResponse::json(report)).await;
    backend.enqueue_response(MockResponse::json(report)).await;

    let (result, out) =
        run_command(&backend, &["resources"], test_config(), CancelToken::new()).await;
    result.unwrap();
    let stdout = out.stdout();
    assert!(stdout.starts_with("RESOURCE"));
    assert!(stdout.contains("2.0x"));
    assert!(stdout.contains("1.0 Gbps"));

    let (result, out) = run_command(
        &backend,
        &["--format", "jsonl", "--transform", "cpu.capacity", "resources"],
        test_config(),
        CancelToken::new(),
    )
    .await;
    result.unwrap();
    assert_eq!(out.stdout(), "8\n");
}

#[tokio::test]
async fn test_version_needs_no_server() {
    let backend = MockBackend::start().await;

    let (result, out) =
        run_command(&backend, &["version"], test_config(), CancelToken::new()).await;

    result.unwrap();
    assert!(out.stdout().starts_with("hypeman version "));
    assert!(backend.captured_requests().await.is_empty());
}
