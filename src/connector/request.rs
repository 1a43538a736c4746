//! Request and response envelopes moved through the connector pipeline.
//!
//! The pipeline itself is untyped ([`HttpRequest`] / [`HttpResponse`] carry
//! JSON values) so connectors stay object-safe. [`Request<T>`] and
//! [`Response<T>`] add the expected value type at the caller boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::ConnectorConfiguration;
use crate::error::ConnectorFailure;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP call described as plain data. Immutable once handed to a connector.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Identifier used in logs.
    pub id: String,
    pub method: HttpMethod,
    /// Path relative to the configured base URL, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Request-specific headers; these override connector defaults.
    pub headers: Vec<(String, String)>,
    /// Preferred response language; falls back to the configured locale.
    pub locale: Option<String>,
    /// Merge a `device` object into the JSON body before sending.
    pub includes_device_metadata: bool,
    /// Authenticate with the project's private key, not only the project id.
    pub requires_private_key: bool,
    /// Settings this call is bound to. The first layer that reads
    /// configuration pins its snapshot here; inner layers and later retry
    /// attempts reuse it instead of reading their own.
    pub configuration: Option<Arc<ConnectorConfiguration>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            locale: None,
            includes_device_metadata: false,
            requires_private_key: false,
            configuration: None,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The pinned configuration, or `current` pinned from now on.
    pub fn pin_configuration(
        &mut self,
        current: impl FnOnce() -> Arc<ConnectorConfiguration>,
    ) -> Arc<ConnectorConfiguration> {
        Arc::clone(self.configuration.get_or_insert_with(current))
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers
            .retain(|(field, _)| !field.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }
}

/// Typed request envelope: an [`HttpRequest`] expected to produce a `T`.
pub struct Request<T> {
    http: HttpRequest,
    _value: PhantomData<fn() -> T>,
}

impl<T> Request<T> {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self::from_http(HttpRequest::new(method, path))
    }

    pub fn from_http(http: HttpRequest) -> Self {
        Self {
            http,
            _value: PhantomData,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Attach a JSON body. Encoding errors surface as [`ConnectorFailure::Coding`].
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ConnectorFailure> {
        let value = serde_json::to_value(body).map_err(ConnectorFailure::coding)?;
        self.http.body = Some(value);
        Ok(self)
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.set_header(name, value);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.http.locale = Some(locale.into());
        self
    }

    pub fn requiring_private_key(mut self) -> Self {
        self.http.requires_private_key = true;
        self
    }

    pub fn including_device_metadata(mut self) -> Self {
        self.http.includes_device_metadata = true;
        self
    }

    pub fn http(&self) -> &HttpRequest {
        &self.http
    }

    pub fn into_http(self) -> HttpRequest {
        self.http
    }
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self::from_http(self.http.clone())
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("http", &self.http)
            .field("value", &std::any::type_name::<T>())
            .finish()
    }
}

/// Successful, not yet typed, response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// The full decoded response object.
    pub value: Value,
}

impl HttpResponse {
    /// Decode the value into `T`. Failures surface as [`ConnectorFailure::Coding`].
    pub fn decode<T: DeserializeOwned>(self) -> Result<Response<T>, ConnectorFailure> {
        let value = serde_json::from_value(self.value).map_err(ConnectorFailure::coding)?;
        Ok(Response {
            value,
            status: self.status,
        })
    }
}

/// Typed response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub value: T,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Invoice {
        id: String,
        amount: String,
    }

    #[derive(Debug, Deserialize)]
    struct InvoiceEnvelope {
        invoice: Invoice,
    }

    #[test]
    fn pinned_configuration_wins_over_later_snapshots() {
        let mut request = HttpRequest::new(HttpMethod::Get, "/");
        assert!(request.configuration.is_none());

        let old = Arc::new(ConnectorConfiguration::new("https://old.example.com", "proj_old"));
        let pinned = request.pin_configuration(|| Arc::clone(&old));
        assert!(Arc::ptr_eq(&pinned, &old));

        let new = Arc::new(ConnectorConfiguration::new("https://new.example.com", "proj_new"));
        let again = request.clone().pin_configuration(|| new);
        assert_eq!(again.project_id, "proj_old");
    }

    #[test]
    fn typed_builders_fill_plain_request() {
        let request = Request::<InvoiceEnvelope>::post("/invoices")
            .with_body(&json!({"amount": "10.00"}))
            .unwrap()
            .with_query("expand", "customer")
            .with_header("X-Trace", "abc")
            .with_locale("fr")
            .requiring_private_key()
            .including_device_metadata();

        let http = request.http();
        assert_eq!(http.method, HttpMethod::Post);
        assert_eq!(http.path, "/invoices");
        assert_eq!(http.body, Some(json!({"amount": "10.00"})));
        assert_eq!(http.query, vec![("expand".into(), "customer".into())]);
        assert_eq!(http.header("x-trace"), Some("abc"));
        assert_eq!(http.locale.as_deref(), Some("fr"));
        assert!(http.requires_private_key);
        assert!(http.includes_device_metadata);
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut request = HttpRequest::new(HttpMethod::Get, "/");
        request.set_header("Accept-Language", "en");
        request.set_header("accept-language", "de");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("ACCEPT-LANGUAGE"), Some("de"));
    }

    #[test]
    fn each_request_gets_its_own_id() {
        let first = HttpRequest::new(HttpMethod::Get, "/");
        let second = HttpRequest::new(HttpMethod::Get, "/");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn decode_produces_typed_value() {
        let response = HttpResponse {
            status: 200,
            value: json!({"success": true, "invoice": {"id": "iv_1", "amount": "5.00"}}),
        };
        let decoded = response.decode::<InvoiceEnvelope>().unwrap();
        assert_eq!(decoded.status, 200);
        assert_eq!(decoded.value.invoice.id, "iv_1");
    }

    #[test]
    fn decode_mismatch_is_coding_failure() {
        let response = HttpResponse {
            status: 200,
            value: json!({"success": true}),
        };
        let err = response.decode::<InvoiceEnvelope>().unwrap_err();
        assert!(matches!(err, ConnectorFailure::Coding(_)));
    }
}
