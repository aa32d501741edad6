//! Agent Validation
//!
//! Runs one suite manifest against the local agent and the configured
//! Prometheus/Loki backends. Exits non-zero when any result fails.
//!
//! ```bash
//! COMPUTE_TYPE=EC2 agent-validation manifests/jmx.json
//! ```

use agent_validation::backend::BackendConnection;
use agent_validation::config::HarnessConfig;
use agent_validation::environment::{CtlAgentController, ShellExecutor};
use agent_validation::manifest::ManifestSuite;
use agent_validation::observability::init_tracing;
use agent_validation::{run_suite, ValidationContext};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Environment variable naming the manifest when no argument is given.
const SUITE_MANIFEST_VAR: &str = "SUITE_MANIFEST";

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = HarnessConfig::from_env()?;
    init_tracing(&config.observability)?;

    info!(
        compute_type = %config.env.compute_type,
        cluster = %config.env.cluster_name,
        "Configuration loaded successfully"
    );

    let manifest_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(SUITE_MANIFEST_VAR).ok())
        .map(PathBuf::from)
        .ok_or("usage: agent-validation <manifest.json> (or set SUITE_MANIFEST)")?;

    let definition = ManifestSuite::from_path(&manifest_path).map_err(|e| {
        error!(path = %manifest_path.display(), "Failed to load manifest: {}", e);
        e
    })?;

    let connection = BackendConnection::connect(&config).await.map_err(|e| {
        error!("Failed to connect to backends: {}", e);
        e
    })?;

    let mut ctx = ValidationContext::from_connection(&config, &connection);
    let agent = CtlAgentController::new(
        &config.agent_ctl_path,
        &config.agent_config_output_path,
        Arc::new(ShellExecutor),
    );

    match run_suite(
        Box::new(definition),
        Arc::new(agent),
        &config.agent_config_dir,
        &mut ctx,
    )
    .await
    {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
