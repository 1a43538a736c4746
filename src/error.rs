//! Error types shared across the connector pipeline.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Preserved cause of a failure. Shared so failures stay cheap to clone.
pub type UnderlyingError = Arc<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading, parsing, or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// Server error body
// ---------------------------------------------------------------------------

/// Per-field validation error reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvalidField {
    pub name: String,
    pub message: String,
}

/// Structured error body returned by the backend with `"success": false`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerError {
    /// Dotted error type, e.g. `request.authentication.invalid`.
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub invalid_fields: Option<Vec<InvalidField>>,
}

impl ServerError {
    /// Error body used when a non-2xx response carries no decodable error.
    pub fn unrecognized() -> Self {
        Self {
            error_type: String::new(),
            message: None,
            invalid_fields: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectorFailure
// ---------------------------------------------------------------------------

/// Closed failure taxonomy produced by connectors.
///
/// Decorators never mutate a failure; the retry decorator passes the final
/// one through untouched and only the failure-mapping decorator converts it.
#[derive(Debug, Clone)]
pub enum ConnectorFailure {
    /// Request encoding or response decoding failed.
    Coding(UnderlyingError),
    /// No connection could be made, or it was lost mid-flight.
    NetworkUnreachable,
    /// The transport-level timeout elapsed.
    Timeout,
    /// The call was cancelled by its caller.
    Cancelled,
    /// The backend answered with a structured error.
    Server { error: ServerError, status: u16 },
    /// Anything unclassified, with its cause when one is known.
    Internal(Option<UnderlyingError>),
}

impl ConnectorFailure {
    pub fn coding(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Coding(Arc::new(error))
    }

    pub fn internal(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Some(Arc::new(error)))
    }

    /// HTTP status code for server failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short, stable name of the variant, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Coding(_) => "coding",
            Self::NetworkUnreachable => "network_unreachable",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Server { .. } => "server",
            Self::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for ConnectorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coding(e) => write!(f, "coding: {e}"),
            Self::NetworkUnreachable => write!(f, "network unreachable"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Cancelled => write!(f, "request cancelled"),
            Self::Server { error, status } => match &error.message {
                Some(message) => write!(f, "server {status} {}: {message}", error.error_type),
                None => write!(f, "server {status} {}", error.error_type),
            },
            Self::Internal(Some(e)) => write!(f, "internal: {e}"),
            Self::Internal(None) => write!(f, "internal"),
        }
    }
}

impl std::error::Error for ConnectorFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Coding(e) | Self::Internal(Some(e)) => Some(e.as_ref()),
            _ => None,
        }
    }
}
