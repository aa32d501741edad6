//! # Validation Test Utilities
//!
//! Shared test utilities for the `agent-validation` crate.
//!
//! This crate provides mock backends and fixtures so validation logic can be
//! tested without a running agent, Prometheus, or Loki.
//!
//! ## Modules
//!
//! - `mock_metrics` - In-memory metrics backend with call recording
//! - `mock_logs` - In-memory logs backend
//! - `mock_environment` - Instance metadata, command executor, agent controller
//! - `mock_runner` - Scripted test runner
//! - `fixtures` - Context builder and performance-log records
//!
//! ## Usage
//!
//! ```rust,ignore
//! use validation_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let metrics = MockMetricsBackend::new()
//!         .with_listing("m1", &[("Cluster", "demo")]);
//!
//!     let mut ctx = TestContextBuilder::new(MetaData::eks("demo"))
//!         .metrics(&metrics)
//!         .build();
//!
//!     // Run a reconciler or runner against ctx...
//!     assert_eq!(metrics.list_calls(), 1);
//! }
//! ```

pub mod fixtures;
pub mod mock_environment;
pub mod mock_logs;
pub mod mock_metrics;
pub mod mock_runner;

pub use fixtures::{performance_record, TestContextBuilder};
pub use mock_environment::{
    AgentEvent, MockEnvironment, RecordingAgentController, RecordingExecutor,
};
pub use mock_logs::MockLogsBackend;
pub use mock_metrics::{dims, MockMetricsBackend};
pub use mock_runner::MockRunner;
