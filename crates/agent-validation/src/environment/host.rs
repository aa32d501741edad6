//! Environment metadata from the EC2 instance metadata service and kubectl.

use super::{CommandExecutor, EnvironmentMetadata, InstanceInfo};
use crate::backend::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Default instance metadata service endpoint.
pub const DEFAULT_IMDS_URL: &str = "http://169.254.169.254";

const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_SECONDS: &str = "21600";

const LIST_NODES_COMMAND: &str = "kubectl get nodes -o json";

#[derive(Debug, Deserialize)]
struct NodeList {
    items: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct Node {
    metadata: NodeMetadata,
    #[serde(default)]
    spec: NodeSpec,
}

#[derive(Debug, Deserialize)]
struct NodeMetadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodeSpec {
    #[serde(rename = "providerID")]
    provider_id: Option<String>,
}

/// Metadata for a host: IMDSv2 for the local instance, kubectl for cluster nodes.
pub struct HostMetadata {
    imds_base_url: String,
    http_client: Client,
    executor: Arc<dyn CommandExecutor>,
}

impl HostMetadata {
    pub fn new(
        imds_base_url: impl Into<String>,
        http_client: Client,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            imds_base_url: imds_base_url.into(),
            http_client,
            executor,
        }
    }

    async fn session_token(&self) -> Result<String, BackendError> {
        let url = format!("{}/latest/api/token", self.imds_base_url);
        let response = self
            .http_client
            .put(&url)
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::QueryFailed(format!(
                "IMDS token request returned status {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    async fn get_metadata(&self, path: &str) -> Result<String, BackendError> {
        let token = self.session_token().await?;
        let url = format!("{}/latest/meta-data/{}", self.imds_base_url, path);

        let response = self
            .http_client
            .get(&url)
            .header(TOKEN_HEADER, token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::QueryFailed(format!(
                "IMDS {} returned status {}",
                path,
                response.status()
            )));
        }

        let value = response.text().await?.trim().to_string();
        if value.is_empty() {
            return Err(BackendError::QueryFailed(format!("IMDS {} is empty", path)));
        }
        Ok(value)
    }
}

#[async_trait]
impl EnvironmentMetadata for HostMetadata {
    async fn instance_id(&self) -> Result<String, BackendError> {
        self.get_metadata("instance-id").await
    }

    async fn instance_type(&self) -> Result<String, BackendError> {
        self.get_metadata("instance-type").await
    }

    async fn cluster_instances(
        &self,
        cluster_name: &str,
    ) -> Result<Vec<InstanceInfo>, BackendError> {
        // kubectl talks to whatever cluster the current context points at.
        debug!(
            target: "agent_validation.environment",
            cluster = %cluster_name,
            "Listing cluster nodes"
        );
        let output = self.executor.run(LIST_NODES_COMMAND).await?;
        parse_node_list(&output)
    }
}

/// Parse `kubectl get nodes -o json` output.
fn parse_node_list(output: &str) -> Result<Vec<InstanceInfo>, BackendError> {
    let nodes: NodeList = serde_json::from_str(output)?;
    Ok(nodes
        .items
        .into_iter()
        .map(|node| InstanceInfo {
            instance_id: node
                .spec
                .provider_id
                .as_deref()
                .and_then(|id| id.rsplit('/').next())
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            instance_name: node.metadata.name,
        })
        .collect())
}
