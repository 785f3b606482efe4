use agentic_browser::workflow::step::StepData;
use agentic_browser::{Runner, RunnerConfig};
use serde_json::json;
use tracing_subscriber::prelude::*;

fn steps(value: serde_json::Value) -> Vec<StepData> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| StepData::from_value(v.clone()).unwrap())
        .collect()
}

#[tokio::test]
async fn runner_completes_a_simple_workflow_successfully() {
    let profile = tempfile::tempdir().expect("failed to create temp profile dir");

    let config = RunnerConfig {
        profile_dir: profile.path().to_path_buf(),
        headless: true,
        start_url: Some("data:text/html,<html><body><h1>hi</h1></body></html>".into()),
        ..RunnerConfig::default()
    };

    let runner = Runner::launch(config)
        .await
        .expect("failed to launch runner");

    let workflow = steps(json!([{"type": "scroll", "x": 0, "y": 0}]));
    let outcome = runner.run(&workflow).await;

    assert!(outcome.success, "expected workflow to succeed: {:?}", outcome.error);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn runner_log_sink_captures_step_events() {
    let profile = tempfile::tempdir().expect("failed to create temp profile dir");

    let config = RunnerConfig {
        profile_dir: profile.path().to_path_buf(),
        headless: true,
        start_url: Some("data:text/html,<html><body><h1>hi</h1></body></html>".into()),
        ..RunnerConfig::default()
    };

    let runner = Runner::launch(config)
        .await
        .expect("failed to launch runner");

    let sink = runner.log_sink().clone();
    let subscriber = tracing_subscriber::registry().with(sink);
    let _guard = tracing::subscriber::set_default(subscriber);

    let workflow = steps(json!([{"type": "scroll", "x": 0, "y": 0}]));
    let outcome = runner.run(&workflow).await;

    assert!(outcome.success);
    assert!(
        outcome.log.iter().any(|l| l.contains("dispatching step")),
        "expected captured log lines, got: {:?}",
        outcome.log
    );
}
