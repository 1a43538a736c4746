//! Outermost decorator: connector failures become domain [`Failure`]s.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::{ConnectorConfiguration, HttpConnector, HttpRequest, Request, Response};
use crate::cancel::Cancellable;
use crate::error::{ConnectorFailure, ServerError};
use crate::failure::{AuthenticationCode, Failure, FailureCode, InternalCode, TimeoutCode};

const INTERNAL_MESSAGE: &str = "An unexpected error occurred while processing your request.";
const NETWORK_MESSAGE: &str = "Request can't be processed because there is no network connection.";
const TIMEOUT_MESSAGE: &str = "Request timed out.";
const CANCELLED_MESSAGE: &str = "Request was cancelled.";

/// Converts a connector failure into a domain failure.
pub trait FailureMapper: Send + Sync {
    fn failure(&self, failure: ConnectorFailure) -> Failure;
}

/// Mapping driven by the backend's error-type strings and status codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFailureMapper;

impl FailureMapper for DefaultFailureMapper {
    fn failure(&self, failure: ConnectorFailure) -> Failure {
        let mapped = match &failure {
            ConnectorFailure::Coding(_) | ConnectorFailure::Internal(_) => Failure::new(
                Some(INTERNAL_MESSAGE.to_string()),
                FailureCode::Internal(InternalCode::Mobile),
            ),
            ConnectorFailure::NetworkUnreachable => Failure::new(
                Some(NETWORK_MESSAGE.to_string()),
                FailureCode::NetworkUnreachable,
            ),
            ConnectorFailure::Timeout => Failure::new(
                Some(TIMEOUT_MESSAGE.to_string()),
                FailureCode::Timeout(TimeoutCode::Mobile),
            ),
            ConnectorFailure::Cancelled => {
                Failure::new(Some(CANCELLED_MESSAGE.to_string()), FailureCode::Cancelled)
            }
            ConnectorFailure::Server { error, status } => {
                Failure::new(error.message.clone(), server_failure_code(error, *status))
                    .with_invalid_fields(error.invalid_fields.clone())
            }
        };
        mapped.with_underlying(failure)
    }
}

fn server_failure_code(error: &ServerError, status: u16) -> FailureCode {
    let raw = error.error_type.as_str();
    let code = match status {
        401 => AuthenticationCode::from_raw(raw).map(FailureCode::Authentication),
        404 => FailureCode::not_found(raw),
        400..=599 => FailureCode::validation(raw)
            .or_else(|| FailureCode::generic(raw))
            .or_else(|| TimeoutCode::from_raw(raw).map(FailureCode::Timeout))
            .or_else(|| InternalCode::from_raw(raw).map(FailureCode::Internal)),
        _ => None,
    };
    code.unwrap_or_else(|| FailureCode::Unknown(raw.to_string()))
}

/// Typed entry point of the pipeline.
///
/// Forwards to the inner connector, decodes successful responses into the
/// request's value type, and maps every failure through a [`FailureMapper`].
pub struct FailureMappingConnector {
    connector: Arc<dyn HttpConnector>,
    mapper: Arc<dyn FailureMapper>,
}

impl FailureMappingConnector {
    pub fn new(connector: Arc<dyn HttpConnector>, mapper: Arc<dyn FailureMapper>) -> Self {
        Self { connector, mapper }
    }

    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: &Request<T>,
    ) -> Result<Response<T>, Failure> {
        let outcome = match self.connector.execute(request.http()).await {
            Ok(response) => response.decode::<T>(),
            Err(failure) => Err(failure),
        };
        outcome.map_err(|failure| self.map_failure(request.http(), failure))
    }

    /// Run `request` in the background and hand the outcome to `completion`.
    ///
    /// Cancelling the returned handle stops the call and completes it with a
    /// cancelled failure. A panic inside the pipeline completes it with an
    /// internal failure carrying the panic as its cause.
    pub fn start<T, F>(self: &Arc<Self>, request: Request<T>, completion: F) -> Arc<dyn Cancellable>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<Response<T>, Failure>) + Send + 'static,
    {
        let http = request.http().clone();
        let connector = Arc::clone(self);
        let call = tokio::spawn(async move { connector.execute(&request).await });
        let handle = call.abort_handle();

        let mapping = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match call.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => {
                    Err(mapping.map_failure(&http, ConnectorFailure::Cancelled))
                }
                Err(err) => Err(mapping.map_failure(&http, ConnectorFailure::internal(err))),
            };
            completion(outcome);
        });
        Arc::new(handle)
    }

    pub fn replace(&self, configuration: ConnectorConfiguration) {
        self.connector.replace(configuration);
    }

    fn map_failure(&self, request: &HttpRequest, failure: ConnectorFailure) -> Failure {
        if let ConnectorFailure::Internal(_) = &failure {
            tracing::error!(
                request_id = %request.id,
                method = %request.method,
                path = %request.path,
                error = %failure,
                "unexpected connector failure"
            );
        }
        self.mapper.failure(failure)
    }
}
