//! End-to-end runs against a real Docker daemon.
//!
//! Ignored by default; run with `cargo test -- --ignored` on a host where
//! the daemon is reachable and the runtime images can be pulled.

use coderun::config::{SandboxBackend, SandboxConfig};
use coderun::sandbox::{ExecutionRequest, Language};
use coderun::ExecutionService;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

async fn service(backend: SandboxBackend) -> (ExecutionService, TempDir) {
    let scratch = tempdir().unwrap();
    let mut config = SandboxConfig::default();
    config.backend = backend;
    config.scratch_dir = scratch.path().to_path_buf();
    (ExecutionService::new(config).await.unwrap(), scratch)
}

fn assert_scratch_empty(scratch: &TempDir) {
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn javascript_hello() {
    let (service, scratch) = service(SandboxBackend::Docker).await;

    let result = service
        .execute(ExecutionRequest::new("console.log('hello')", Language::JavaScript))
        .await
        .unwrap();

    assert!(result.success, "{:?}", result);
    assert_eq!(result.stdout, "hello\n");
    assert!(result.error_text().is_none());
    assert_scratch_empty(&scratch);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn javascript_infinite_loop_times_out() {
    let (service, scratch) = service(SandboxBackend::Docker).await;

    let started = Instant::now();
    let result = service
        .execute(ExecutionRequest::new("while (true) {}", Language::JavaScript))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.timed_out);
    assert!(result.error.unwrap().contains("10s limit"));
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_scratch_empty(&scratch);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn javascript_has_no_network() {
    let (service, _scratch) = service(SandboxBackend::Docker).await;

    let code = "require('http').get('http://example.com', () => console.log('reached'))\
                .on('error', e => { console.error(e.code); process.exit(2); });";
    let result = service
        .execute(ExecutionRequest::new(code, Language::JavaScript))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(!result.stdout.contains("reached"));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn java_adder_reads_stdin() {
    let (service, scratch) = service(SandboxBackend::Docker).await;

    let code = r#"
import java.util.Scanner;

public class Adder {
    public static void main(String[] args) {
        Scanner in = new Scanner(System.in);
        int a = in.nextInt();
        int b = in.nextInt();
        System.out.println(a + b);
    }
}
"#;
    let result = service
        .execute(ExecutionRequest::new(code, Language::Java).with_stdin("3\n4\n"))
        .await
        .unwrap();

    assert!(result.success, "{:?}", result);
    assert!(result.stdout.contains('7'));
    assert_scratch_empty(&scratch);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn java_without_public_class_runs_as_main() {
    let (service, _scratch) = service(SandboxBackend::Docker).await;

    let code = "class Main { public static void main(String[] a) { System.out.println(\"ok\"); } }";
    let result = service
        .execute(ExecutionRequest::new(code, Language::Java))
        .await
        .unwrap();

    assert!(result.success, "{:?}", result);
    assert_eq!(result.stdout.trim(), "ok");
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn java_compile_error_is_program_error() {
    let (service, scratch) = service(SandboxBackend::Cli).await;

    let code = "public class Broken { public static void main(String[] a) { int x = } }";
    let result = service
        .execute(ExecutionRequest::new(code, Language::Java))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(!result.timed_out);
    assert!(result.error.unwrap().contains("Broken.java"));
    assert_scratch_empty(&scratch);
}
