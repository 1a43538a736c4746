//! Pipeline assembly from an explicit, ordered list of layers.

use std::sync::Arc;
use std::time::Duration;

use super::{
    AuthConnector, ConnectorConfiguration, DefaultFailureMapper, DeviceMetadata, FailureMapper,
    FailureMappingConnector, HttpConnector, ReqwestConnector, RetryClassifier, RetryConnector,
};
use crate::config::Config;
use crate::error::ConfigError;
use crate::retry::RetryStrategy;

/// One decorator around the base connector.
#[derive(Debug, Clone)]
pub enum ConnectorLayer {
    Auth,
    Retry {
        strategy: RetryStrategy,
        classifier: RetryClassifier,
    },
}

impl ConnectorLayer {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Retry { .. } => "retry",
        }
    }

    fn wrap(
        &self,
        connector: Arc<dyn HttpConnector>,
        configuration: &ConnectorConfiguration,
    ) -> Arc<dyn HttpConnector> {
        match self {
            Self::Auth => Arc::new(AuthConnector::new(connector, configuration.clone())),
            Self::Retry {
                strategy,
                classifier,
            } => Arc::new(RetryConnector::new(
                connector,
                strategy.clone(),
                classifier.clone(),
            )),
        }
    }
}

/// Builds the connector pipeline.
///
/// Layers are listed innermost first: with `[Retry, Auth]` a call passes
/// through auth, then retry, then reaches the base connector. The failure
/// mapper always sits outermost.
pub struct ConnectorBuilder {
    configuration: Option<ConnectorConfiguration>,
    timeout: Duration,
    device: DeviceMetadata,
    layers: Vec<ConnectorLayer>,
    mapper: Arc<dyn FailureMapper>,
}

impl Default for ConnectorBuilder {
    fn default() -> Self {
        Self {
            configuration: None,
            timeout: Duration::from_secs(30),
            device: DeviceMetadata::default(),
            layers: Vec::new(),
            mapper: Arc::new(DefaultFailureMapper),
        }
    }
}

impl ConnectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with the standard layers for a loaded configuration:
    /// retry (when enabled) inside auth.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut builder = Self::new()
            .with_configuration(config.connector.clone())
            .with_timeout(config.network.timeout())
            .with_device_metadata(config.device.clone());
        if config.retry.enabled {
            builder = builder.layer(ConnectorLayer::Retry {
                strategy: config.retry.strategy()?,
                classifier: RetryClassifier::new()
                    .retrying_server_errors(config.retry.retry_server_errors),
            });
        }
        Ok(builder.layer(ConnectorLayer::Auth))
    }

    pub fn with_configuration(mut self, configuration: ConnectorConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_device_metadata(mut self, device: DeviceMetadata) -> Self {
        self.device = device;
        self
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn FailureMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Add a layer outside the ones already added.
    pub fn layer(mut self, layer: ConnectorLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layers(&self) -> &[ConnectorLayer] {
        &self.layers
    }

    /// Base connector wrapped in every layer.
    pub fn build_connector(&self) -> Result<Arc<dyn HttpConnector>, ConfigError> {
        let configuration = self.require_configuration()?;
        let base: Arc<dyn HttpConnector> = Arc::new(
            ReqwestConnector::new(configuration.clone(), self.timeout)
                .with_device_metadata(self.device.clone()),
        );
        Ok(self.wrap(base, configuration))
    }

    /// Full pipeline with the failure mapper outermost.
    pub fn build(&self) -> Result<Arc<FailureMappingConnector>, ConfigError> {
        let connector = self.build_connector()?;
        Ok(self.finish(connector))
    }

    /// Full pipeline around a caller-supplied base connector.
    pub fn build_with_base(
        &self,
        base: Arc<dyn HttpConnector>,
    ) -> Result<Arc<FailureMappingConnector>, ConfigError> {
        let configuration = self.require_configuration()?;
        Ok(self.finish(self.wrap(base, configuration)))
    }

    fn require_configuration(&self) -> Result<&ConnectorConfiguration, ConfigError> {
        self.configuration.as_ref().ok_or_else(|| {
            ConfigError::Invalid("connector configuration is required".to_string())
        })
    }

    fn wrap(
        &self,
        base: Arc<dyn HttpConnector>,
        configuration: &ConnectorConfiguration,
    ) -> Arc<dyn HttpConnector> {
        let names: Vec<_> = self.layers.iter().map(ConnectorLayer::name).collect();
        tracing::debug!(layers = ?names, "assembling connector pipeline");
        self.layers
            .iter()
            .fold(base, |inner, layer| layer.wrap(inner, configuration))
    }

    fn finish(&self, connector: Arc<dyn HttpConnector>) -> Arc<FailureMappingConnector> {
        Arc::new(FailureMappingConnector::new(
            connector,
            Arc::clone(&self.mapper),
        ))
    }
}
