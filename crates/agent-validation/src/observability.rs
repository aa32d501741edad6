//! Tracing setup for harness runs.

use crate::config::ObservabilityConfig;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed, which callers running several suites in
/// one process can ignore.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let json_layer = config.json_logs.then(|| fmt::layer().json());
    let text_layer = (!config.json_logs).then(fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let config = ObservabilityConfig::default();
        let _ = init_tracing(&config);

        let json = ObservabilityConfig {
            json_logs: true,
            ..ObservabilityConfig::default()
        };
        assert!(init_tracing(&json).is_err());
    }
}
