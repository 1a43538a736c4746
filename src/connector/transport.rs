//! Base connector: the only place that performs network I/O.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{ConnectorConfiguration, HttpConnector, HttpMethod, HttpRequest, HttpResponse};
use crate::error::{ConnectorFailure, ServerError};
use crate::lock::Locked;

/// Device description sent in default headers and, on request, in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub id: Option<String>,
    pub installation_id: Option<String>,
    pub system_name: String,
    pub system_version: String,
}

impl Default for DeviceMetadata {
    fn default() -> Self {
        Self {
            id: None,
            installation_id: None,
            system_name: std::env::consts::OS.to_string(),
            system_version: "unknown".to_string(),
        }
    }
}

impl DeviceMetadata {
    fn to_value(&self) -> Value {
        let mut device = Map::new();
        device.insert("id".into(), self.id.clone().map_or(Value::Null, Value::String));
        device.insert(
            "installation_id".into(),
            self.installation_id
                .clone()
                .map_or(Value::Null, Value::String),
        );
        device.insert("system_name".into(), Value::String(self.system_name.clone()));
        device.insert(
            "system_version".into(),
            Value::String(self.system_version.clone()),
        );
        Value::Object(device)
    }
}

/// Build an HTTP client with timeout applied.
fn build_http_client(timeout: Duration) -> reqwest::Client {
    // Fall back to reqwest defaults if builder creation fails for any reason.
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Connector backed by a shared `reqwest::Client`.
pub struct ReqwestConnector {
    http: reqwest::Client,
    configuration: Locked<Arc<ConnectorConfiguration>>,
    device: DeviceMetadata,
}

impl ReqwestConnector {
    pub fn new(configuration: ConnectorConfiguration, timeout: Duration) -> Self {
        Self {
            http: build_http_client(timeout),
            configuration: Locked::new(Arc::new(configuration)),
            device: DeviceMetadata::default(),
        }
    }

    pub fn with_device_metadata(mut self, device: DeviceMetadata) -> Self {
        self.device = device;
        self
    }

    /// Settings a call starting now would use.
    pub fn configuration(&self) -> Arc<ConnectorConfiguration> {
        self.configuration.snapshot()
    }
}

#[async_trait]
impl HttpConnector for ReqwestConnector {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectorFailure> {
        let configuration = request
            .configuration
            .clone()
            .unwrap_or_else(|| self.configuration.snapshot());
        let url = format!("{}{}", configuration.base_url, request.path);

        let mut builder = self.http.request(reqwest_method(request.method), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in request_headers(&configuration, &self.device, request) {
            builder = builder.header(name, value);
        }
        if let Some(body) = request_body(request, &self.device) {
            builder = builder.json(&body);
        }

        tracing::debug!(
            request_id = %request.id,
            method = %request.method,
            url = %url,
            "sending request"
        );
        let response = builder.send().await.map_err(|err| {
            tracing::info!(request_id = %request.id, error = %err, "request failed");
            transport_failure(err)
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| {
            tracing::info!(request_id = %request.id, error = %err, "response body failed");
            transport_failure(err)
        })?;
        tracing::debug!(
            request_id = %request.id,
            status,
            bytes = body.len(),
            "received response"
        );

        decode_response(status, &body).map_err(|failure| {
            if let ConnectorFailure::Coding(err) = &failure {
                tracing::error!(
                    request_id = %request.id,
                    status,
                    error = %err,
                    "response could not be decoded"
                );
            }
            failure
        })
    }

    fn replace(&self, configuration: ConnectorConfiguration) {
        tracing::debug!(base_url = %configuration.base_url, "connector configuration replaced");
        self.configuration
            .with_lock(|current| *current = Arc::new(configuration));
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Default headers followed by the request's own; later names win.
fn request_headers(
    configuration: &ConnectorConfiguration,
    device: &DeviceMetadata,
    request: &HttpRequest,
) -> Vec<(String, String)> {
    let locale = request
        .locale
        .as_deref()
        .or(configuration.locale.as_deref())
        .unwrap_or("en");
    let mut headers = vec![
        (
            "User-Agent".to_string(),
            format!(
                "{}/{} payconnect/{}",
                device.system_name, device.system_version, configuration.version
            ),
        ),
        ("Accept-Language".to_string(), locale.to_string()),
        ("Product-Version".to_string(), configuration.version.clone()),
        ("Device-System-Name".to_string(), device.system_name.clone()),
        (
            "Device-System-Version".to_string(),
            device.system_version.clone(),
        ),
    ];
    let optional = [
        ("Session-Id", configuration.session_id.as_ref()),
        ("Device-Id", device.id.as_ref()),
        ("Installation-Id", device.installation_id.as_ref()),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            headers.push((name.to_string(), value.clone()));
        }
    }
    for (name, value) in &request.headers {
        headers.retain(|(field, _)| !field.eq_ignore_ascii_case(name));
        headers.push((name.clone(), value.clone()));
    }
    headers
}

/// The JSON body to send, with a `device` object merged in when requested.
fn request_body(request: &HttpRequest, device: &DeviceMetadata) -> Option<Value> {
    if !request.includes_device_metadata {
        return request.body.clone();
    }
    match request.body.clone() {
        Some(Value::Object(mut object)) => {
            object.insert("device".into(), device.to_value());
            Some(Value::Object(object))
        }
        None => {
            let mut object = Map::new();
            object.insert("device".into(), device.to_value());
            Some(Value::Object(object))
        }
        Some(other) => {
            tracing::warn!(
                request_id = %request.id,
                "device metadata requested for a non-object body; sending body unchanged"
            );
            Some(other)
        }
    }
}

fn transport_failure(err: reqwest::Error) -> ConnectorFailure {
    if err.is_timeout() {
        ConnectorFailure::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        ConnectorFailure::NetworkUnreachable
    } else if err.is_decode() {
        ConnectorFailure::coding(err)
    } else {
        ConnectorFailure::internal(err)
    }
}

/// Apply the response envelope rules to a status and raw body.
///
/// `"success": true` is a success regardless of status. Anything else is a
/// failure: malformed 2xx bodies are coding failures, while non-2xx bodies
/// that do not describe an error become a server failure with an empty
/// error type.
fn decode_response(status: u16, body: &[u8]) -> Result<HttpResponse, ConnectorFailure> {
    let success_status = (200..300).contains(&status);
    let unrecognized = || ConnectorFailure::Server {
        error: ServerError::unrecognized(),
        status,
    };

    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) if success_status => return Err(ConnectorFailure::coding(err)),
        Err(_) => return Err(unrecognized()),
    };

    match value.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(HttpResponse { status, value }),
        Some(false) => match serde_json::from_value::<ServerError>(value) {
            Ok(error) => Err(ConnectorFailure::Server { error, status }),
            Err(err) if success_status => Err(ConnectorFailure::coding(err)),
            Err(_) => Err(unrecognized()),
        },
        None if success_status => Err(ConnectorFailure::coding(
            <serde_json::Error as serde::de::Error>::missing_field("success"),
        )),
        None => match serde_json::from_value::<ServerError>(value) {
            Ok(error) => Err(ConnectorFailure::Server { error, status }),
            Err(_) => Err(unrecognized()),
        },
    }
}
