//! HTTP connector pipeline.
//!
//! A request flows through an explicit, ordered list of decorators before it
//! reaches the single connector that performs network I/O:
//! - `transport`: the base [`ReqwestConnector`].
//! - `auth`: basic-auth header decoration.
//! - `retry`: transient-failure retries with cancellable backoff.
//! - `mapping`: conversion to the domain [`Failure`](crate::failure::Failure).
//! - `builder`: assembles the above in a visible order.

use async_trait::async_trait;

use crate::error::ConnectorFailure;

mod auth;
mod builder;
mod mapping;
mod request;
mod retry;
mod transport;

pub use auth::AuthConnector;
pub use builder::{ConnectorBuilder, ConnectorLayer};
pub use mapping::{DefaultFailureMapper, FailureMapper, FailureMappingConnector};
pub use request::{HttpMethod, HttpRequest, HttpResponse, Request, Response};
pub use retry::{
    OperationState, RetryClassifier, RetryConnector, RetryOperation, IDEMPOTENCY_KEY,
};
pub use transport::{DeviceMetadata, ReqwestConnector};

/// Runtime-switchable connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfiguration {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub project_id: String,
    pub private_key: Option<String>,
    pub session_id: Option<String>,
    /// Fallback `Accept-Language` when a request sets none.
    pub locale: Option<String>,
    /// Product version reported in `User-Agent` and `Product-Version`.
    pub version: String,
}

impl ConnectorConfiguration {
    pub fn new(base_url: &str, project_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            private_key: None,
            session_id: None,
            locale: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One request/response cycle, performed or forwarded.
///
/// Decorators implement this trait around an inner `Arc<dyn HttpConnector>`
/// so the pipeline can be assembled from an ordered list of layers.
#[async_trait]
pub trait HttpConnector: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectorFailure>;

    /// Swap connection settings. In-flight calls keep the settings they
    /// started with.
    fn replace(&self, configuration: ConnectorConfiguration);
}
