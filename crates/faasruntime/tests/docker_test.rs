// End-to-end tests against a real Docker daemon. Run with
// `cargo test -- --ignored` on a machine where `docker` works.

use faascore::{Function, Language};
use faasruntime::{FaasRuntime, RuntimeConfig};

fn local_runtime() -> FaasRuntime {
    FaasRuntime::with_config(RuntimeConfig {
        prewarm_count: 0,
        ..RuntimeConfig::default()
    })
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn python_prints_through_the_full_stack() {
    let runtime = local_runtime();
    runtime.ensure_ready().await.unwrap();

    let function = Function::new("hello", "/hello", Language::Python)
        .with_code("print('Hello from Docker')")
        .with_timeout(60);

    let report = runtime.execute(&function).await.unwrap();

    assert!(report.success, "stderr: {}", report.stderr);
    assert_eq!(report.output, "Hello from Docker");
    assert!(report.sample.response_time > 0.0);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn node_image_is_major_version_18() {
    let runtime = local_runtime();
    runtime.ensure_ready().await.unwrap();

    let function = Function::new("version", "/version", Language::Node)
        .with_code("console.log(process.version)")
        .with_timeout(60);

    let report = runtime.execute(&function).await.unwrap();

    assert!(report.success, "stderr: {}", report.stderr);
    assert!(
        report.output.starts_with("v18."),
        "unexpected version: {}",
        report.output
    );
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn runaway_function_is_killed_at_the_timeout() {
    let runtime = local_runtime();
    runtime.ensure_ready().await.unwrap();

    let function = Function::new("spin", "/spin", Language::Python)
        .with_code("import time\ntime.sleep(600)")
        .with_timeout(2);

    let report = runtime.execute(&function).await.unwrap();

    assert!(report.timed_out);
    assert!(!report.success);
    assert!(report.sample.error);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn stderr_is_captured_on_failure() {
    let runtime = local_runtime();
    runtime.ensure_ready().await.unwrap();

    let function = Function::new("boom", "/boom", Language::Python)
        .with_code("raise RuntimeError('boom')")
        .with_timeout(60);

    let report = runtime.execute(&function).await.unwrap();

    assert!(!report.success);
    assert!(report.stderr.contains("boom"));
}
