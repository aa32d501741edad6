//! Live validation against a deployed agent.
//!
//! These tests need a running agent, reachable Prometheus and Loki
//! endpoints, and `COMPUTE_TYPE` (plus `EKS_CLUSTER_NAME` on a cluster) in
//! the environment. `SUITE_MANIFEST` selects the suite; otherwise the
//! bundled manifest for the compute type is used.

#![cfg(feature = "live")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use agent_validation::backend::BackendConnection;
use agent_validation::config::HarnessConfig;
use agent_validation::environment::{ComputeType, CtlAgentController, ShellExecutor};
use agent_validation::manifest::ManifestSuite;
use agent_validation::{run_suite, ValidationContext};
use std::path::PathBuf;
use std::sync::Arc;

fn config() -> HarnessConfig {
    HarnessConfig::from_env().expect("Harness environment variables should be set")
}

fn manifest_path(config: &HarnessConfig) -> PathBuf {
    if let Ok(path) = std::env::var("SUITE_MANIFEST") {
        return PathBuf::from(path);
    }
    let bundled = match config.env.compute_type {
        ComputeType::Eks => "hyperpod.json",
        _ => "jmx.json",
    };
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("manifests")
        .join(bundled)
}

#[tokio::test]
async fn test_backends_ready() {
    let config = config();

    BackendConnection::connect(&config)
        .await
        .expect("Prometheus and Loki should report ready");
}

#[tokio::test]
async fn test_live_suite_passes() {
    let config = config();
    let connection = BackendConnection::connect(&config)
        .await
        .expect("Failed to connect to backends - ensure port-forwards are running");

    let mut ctx = ValidationContext::from_connection(&config, &connection);
    let definition =
        ManifestSuite::from_path(&manifest_path(&config)).expect("Suite manifest should load");
    let agent = CtlAgentController::new(
        &config.agent_ctl_path,
        &config.agent_config_output_path,
        Arc::new(ShellExecutor),
    );

    let result = run_suite(
        Box::new(definition),
        Arc::new(agent),
        &config.agent_config_dir,
        &mut ctx,
    )
    .await;

    assert!(result.is_ok(), "{}", result.unwrap_err());
}
