//! Basic-auth header decoration.
//!
//! Credentials are `project_id:` for public calls and
//! `project_id:private_key` for calls that require the private key.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;

use super::{ConnectorConfiguration, HttpConnector, HttpRequest, HttpResponse};
use crate::error::ConnectorFailure;
use crate::lock::Locked;

/// Adds `Authorization: Basic ...` to every request it forwards.
pub struct AuthConnector {
    connector: Arc<dyn HttpConnector>,
    configuration: Locked<Arc<ConnectorConfiguration>>,
}

impl AuthConnector {
    pub fn new(connector: Arc<dyn HttpConnector>, configuration: ConnectorConfiguration) -> Self {
        Self {
            connector,
            configuration: Locked::new(Arc::new(configuration)),
        }
    }
}

#[async_trait]
impl HttpConnector for AuthConnector {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectorFailure> {
        let mut request = request.clone();
        let configuration = request.pin_configuration(|| self.configuration.snapshot());
        request.set_header("Authorization", authorization(&configuration, &request));
        self.connector.execute(&request).await
    }

    fn replace(&self, configuration: ConnectorConfiguration) {
        self.configuration
            .with_lock(|current| *current = Arc::new(configuration.clone()));
        self.connector.replace(configuration);
    }
}

/// Resolve the `Authorization` header value for one request.
fn authorization(configuration: &ConnectorConfiguration, request: &HttpRequest) -> String {
    let mut credentials = format!("{}:", configuration.project_id);
    if request.requires_private_key {
        match configuration.private_key.as_deref() {
            Some(key) if !key.is_empty() => credentials.push_str(key),
            // Send anyway and let the backend reject the call.
            _ => tracing::warn!(
                request_id = %request.id,
                path = %request.path,
                "request requires a private key but none is configured"
            ),
        }
    }
    format!("Basic {}", STANDARD.encode(credentials))
}
