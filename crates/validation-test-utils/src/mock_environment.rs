//! Mock environment: instance metadata, shell commands, and agent control.

use agent_validation::backend::BackendError;
use agent_validation::environment::{
    AgentController, AgentError, CommandExecutor, EnvironmentMetadata, InstanceInfo,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Mock instance metadata.
///
/// Without an instance id, `instance_id` fails like an unreachable IMDS.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    instance_id: Option<String>,
    instance_type: Option<String>,
    cluster_instances: Vec<InstanceInfo>,
    fail_cluster_instances: bool,
}

impl MockEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_instance_id(mut self, instance_id: &str) -> Self {
        self.instance_id = Some(instance_id.to_string());
        self
    }

    #[must_use]
    pub fn with_instance_type(mut self, instance_type: &str) -> Self {
        self.instance_type = Some(instance_type.to_string());
        self
    }

    /// Add a cluster node by name.
    #[must_use]
    pub fn with_node(mut self, instance_name: &str) -> Self {
        self.cluster_instances.push(InstanceInfo {
            instance_name: instance_name.to_string(),
            instance_id: None,
        });
        self
    }

    #[must_use]
    pub fn failing_cluster_instances(mut self) -> Self {
        self.fail_cluster_instances = true;
        self
    }
}

#[async_trait]
impl EnvironmentMetadata for MockEnvironment {
    async fn instance_id(&self) -> Result<String, BackendError> {
        self.instance_id
            .clone()
            .ok_or_else(|| BackendError::Unavailable("mock has no instance id".to_string()))
    }

    async fn instance_type(&self) -> Result<String, BackendError> {
        self.instance_type
            .clone()
            .ok_or_else(|| BackendError::Unavailable("mock has no instance type".to_string()))
    }

    async fn cluster_instances(
        &self,
        _cluster_name: &str,
    ) -> Result<Vec<InstanceInfo>, BackendError> {
        if self.fail_cluster_instances {
            return Err(BackendError::CommandFailed {
                command: "kubectl get nodes -o json".to_string(),
                message: "mock failure".to_string(),
            });
        }
        Ok(self.cluster_instances.clone())
    }
}

/// Command executor that records commands instead of running them.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    commands: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any command containing `pattern`.
    #[must_use]
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_on = Some(pattern.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn run(&self, command: &str) -> Result<String, BackendError> {
        self.commands.lock().unwrap().push(command.to_string());

        match &self.fail_on {
            Some(pattern) if command.contains(pattern.as_str()) => {
                Err(BackendError::CommandFailed {
                    command: command.to_string(),
                    message: "exit status: 1".to_string(),
                })
            }
            _ => Ok(String::new()),
        }
    }
}

/// Agent lifecycle event seen by [`RecordingAgentController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Start(PathBuf),
    Stop,
}

/// Agent controller that records lifecycle calls.
#[derive(Debug, Clone, Default)]
pub struct RecordingAgentController {
    events: Arc<Mutex<Vec<AgentEvent>>>,
    fail_start: bool,
    fail_stop: bool,
}

impl RecordingAgentController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    #[must_use]
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentController for RecordingAgentController {
    async fn start(&self, config_path: &Path) -> Result<(), AgentError> {
        self.events
            .lock()
            .unwrap()
            .push(AgentEvent::Start(config_path.to_path_buf()));

        if self.fail_start {
            return Err(AgentError::Control(BackendError::CommandFailed {
                command: "amazon-cloudwatch-agent-ctl -a fetch-config".to_string(),
                message: "mock start failure".to_string(),
            }));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        self.events.lock().unwrap().push(AgentEvent::Stop);

        if self.fail_stop {
            return Err(AgentError::Control(BackendError::CommandFailed {
                command: "amazon-cloudwatch-agent-ctl -a stop".to_string(),
                message: "mock stop failure".to_string(),
            }));
        }
        Ok(())
    }
}
