//! Agent Telemetry Validation Harness
//!
//! This crate runs a telemetry agent (or waits for an already deployed one)
//! and validates what it emitted: metrics are reconciled against expected
//! dimension/name schemas and value-checked, and log streams are checked for
//! presence, duplicates, and per-record JSON schemas.
//!
//! # Layout
//!
//! - [`dimension`]: canonical dimension keys and runtime dimension resolution
//! - [`metrics`]: schema reconciliation and datapoint checks
//! - [`logs`]: composable log stream assertions
//! - [`runner`]: test runners and the EC2/EKS agent lifecycles
//! - [`suite`]: suite orchestration and result assertion
//! - [`manifest`]: suites described as JSON
//! - [`backend`]: Prometheus and Loki clients behind mockable traits
//! - [`environment`]: instance metadata, shell commands, agent control
//!
//! # Features
//!
//! - `live`: tests against a deployed agent and a real Prometheus/Loki stack
//!
//! # Prerequisites (live tests)
//!
//! 1. `COMPUTE_TYPE` set to `EC2` or `EKS` (plus `EKS_CLUSTER_NAME` on EKS)
//! 2. Prometheus (9090) and Loki (3100) reachable, or `PROMETHEUS_URL` / `LOKI_URL` set
//! 3. `kubectl` in PATH for cluster node discovery
//!
//! # Usage
//!
//! ```bash
//! # Mock-backed tests only
//! cargo test -p agent-validation
//!
//! # Run the bundled HyperPod manifest against a cluster
//! COMPUTE_TYPE=EKS EKS_CLUSTER_NAME=demo cargo test -p agent-validation --features live
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod dimension;
pub mod environment;
pub mod logs;
pub mod manifest;
pub mod metrics;
pub mod observability;
pub mod runner;
pub mod status;
pub mod suite;

pub use context::ValidationContext;
pub use status::{Status, SuiteResult, TestGroupResult, TestResult};
pub use suite::{run_suite, SuiteDefinition, SuiteError, TestSuite};
