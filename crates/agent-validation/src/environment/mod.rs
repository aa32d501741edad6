//! The compute environment the agent runs in.
//!
//! [`MetaData`] is the static description of the environment (compute type,
//! cluster identifier). [`EnvironmentMetadata`] is the runtime lookup seam
//! for things only the environment itself knows, such as the current
//! instance ID or the nodes of a cluster.

pub mod agent;
pub mod command;
pub mod host;

pub use agent::{AgentController, AgentError, CtlAgentController};
pub use command::{run_commands, CommandExecutor, ShellExecutor};
pub use host::HostMetadata;

use crate::backend::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment target class that decides which runners apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputeType {
    /// Standalone host.
    Ec2,
    /// Orchestrated cluster node.
    Eks,
    /// A value the harness has no runners for.
    Unrecognized(String),
}

impl ComputeType {
    /// Parse a compute type name, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EC2" => ComputeType::Ec2,
            "EKS" => ComputeType::Eks,
            _ => ComputeType::Unrecognized(raw.to_string()),
        }
    }
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeType::Ec2 => f.write_str("EC2"),
            ComputeType::Eks => f.write_str("EKS"),
            ComputeType::Unrecognized(raw) => write!(f, "unrecognized ({raw})"),
        }
    }
}

/// Static description of the environment under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaData {
    pub compute_type: ComputeType,
    /// Cluster identifier; empty outside clusters.
    pub cluster_name: String,
}

impl MetaData {
    pub fn ec2() -> Self {
        Self {
            compute_type: ComputeType::Ec2,
            cluster_name: String::new(),
        }
    }

    pub fn eks(cluster_name: impl Into<String>) -> Self {
        Self {
            compute_type: ComputeType::Eks,
            cluster_name: cluster_name.into(),
        }
    }

    /// Cluster identifier, if this environment has one.
    pub fn cluster_name(&self) -> Option<&str> {
        if self.cluster_name.is_empty() {
            None
        } else {
            Some(&self.cluster_name)
        }
    }
}

/// One compute instance backing a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// Node name; also the name of the node's log stream.
    pub instance_name: String,
    pub instance_id: Option<String>,
}

/// Runtime metadata lookups (enables mocking).
#[async_trait]
pub trait EnvironmentMetadata: Send + Sync {
    /// ID of the instance the harness runs on.
    async fn instance_id(&self) -> Result<String, BackendError>;

    /// Type of the instance the harness runs on.
    async fn instance_type(&self) -> Result<String, BackendError>;

    /// Instances backing the named cluster.
    async fn cluster_instances(
        &self,
        cluster_name: &str,
    ) -> Result<Vec<InstanceInfo>, BackendError>;
}
