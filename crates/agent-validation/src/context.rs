//! Shared handles passed to every runner.

use crate::backend::{BackendConnection, LogsBackend, MetricsBackend};
use crate::config::HarnessConfig;
use crate::dimension::DimensionFactory;
use crate::environment::{
    CommandExecutor, EnvironmentMetadata, HostMetadata, MetaData, ShellExecutor,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Backends, environment, and sampling state for one suite run.
pub struct ValidationContext {
    pub env: MetaData,
    pub metrics: Arc<dyn MetricsBackend>,
    pub logs: Arc<dyn LogsBackend>,
    pub metadata: Arc<dyn EnvironmentMetadata>,
    pub commands: Arc<dyn CommandExecutor>,
    pub dimensions: DimensionFactory,
    /// Source of randomness for dimension-set sampling.
    pub rng: StdRng,
}

impl ValidationContext {
    pub fn new(
        env: MetaData,
        metrics: Arc<dyn MetricsBackend>,
        logs: Arc<dyn LogsBackend>,
        metadata: Arc<dyn EnvironmentMetadata>,
        commands: Arc<dyn CommandExecutor>,
    ) -> Self {
        let dimensions = DimensionFactory::new(env.clone(), Arc::clone(&metadata));
        Self {
            env,
            metrics,
            logs,
            metadata,
            commands,
            dimensions,
            rng: StdRng::from_entropy(),
        }
    }

    /// Make sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Context for a real host: HTTP backends from `connection`, instance
    /// metadata from IMDS, and shell commands.
    pub fn from_connection(config: &HarnessConfig, connection: &BackendConnection) -> Self {
        let commands: Arc<dyn CommandExecutor> = Arc::new(ShellExecutor);
        let metadata = Arc::new(HostMetadata::new(
            &config.imds_url,
            connection.http_client().clone(),
            Arc::clone(&commands),
        ));

        let context = Self::new(
            config.env.clone(),
            Arc::new(connection.metrics_backend()),
            Arc::new(connection.logs_backend()),
            metadata,
            commands,
        );

        match config.sampling_seed {
            Some(seed) => context.with_seed(seed),
            None => context,
        }
    }
}
