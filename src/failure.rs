//! Domain-level failure surfaced to services and UI code.
//!
//! Connectors speak [`ConnectorFailure`]; everything above the pipeline sees
//! [`Failure`], which carries a user-presentable message, a [`FailureCode`]
//! derived from the backend error type, and the original connector failure.

use std::fmt;

use crate::error::{ConnectorFailure, InvalidField};

/// Validation error types the backend documents.
const VALIDATION_CODES: &[&str] = &[
    "gateway.invalid-customer-input",
    "gateway.invalid-state",
    "gateway.missing-customer-input",
    "gateway.validation-error",
    "request.validation.error",
    "request.validation.invalid-address",
    "request.validation.invalid-amount",
    "request.validation.invalid-challenge-indicator",
    "request.validation.invalid-country",
    "request.validation.invalid-currency",
    "request.validation.invalid-date",
    "request.validation.invalid-description",
    "request.validation.invalid-detail-category",
    "request.validation.invalid-detail-condition",
    "request.validation.invalid-device-channel",
    "request.validation.invalid-duration",
    "request.validation.invalid-email",
    "request.validation.invalid-exemption-reason",
    "request.validation.invalid-external-fraud-tools",
    "request.validation.invalid-gateway-data",
    "request.validation.invalid-id",
    "request.validation.invalid-ip-address",
    "request.validation.invalid-legal-document",
    "request.validation.invalid-metadata",
    "request.validation.invalid-name",
    "request.validation.invalid-payment-type",
    "request.validation.invalid-percent",
    "request.validation.invalid-phone-number",
    "request.validation.invalid-quantity",
    "request.validation.invalid-relationship",
    "request.validation.invalid-relay-store-name",
    "request.validation.invalid-role",
    "request.validation.invalid-settings",
    "request.validation.invalid-sex",
    "request.validation.invalid-shipping-delay",
    "request.validation.invalid-shipping-method",
    "request.validation.invalid-subaccount",
    "request.validation.invalid-tax-amount",
    "request.validation.invalid-tax-rate",
    "request.validation.invalid-type",
    "request.validation.invalid-url",
    "request.validation.invalid-user",
    "request.validation.missing-currency",
    "request.validation.missing-description",
    "request.validation.missing-email",
    "request.validation.missing-invoice",
    "request.validation.missing-name",
    "request.validation.missing-source",
    "request.validation.missing-type",
];

/// Not-found error types the backend documents.
const NOT_FOUND_CODES: &[&str] = &[
    "request.route-not-found",
    "resource.activity.not-found",
    "resource.addon.not-found",
    "resource.alert.not-found",
    "resource.api-key.not-found",
    "resource.api-request.not-found",
    "resource.api-version.not-found",
    "resource.applepay-configuration.not-found",
    "resource.board.not-found",
    "resource.card.not-found",
    "resource.chart.not-found",
    "resource.collaborator.not-found",
    "resource.country.not-found",
    "resource.coupon.not-found",
    "resource.currency.not-found",
    "resource.customer.not-found",
    "resource.discount.not-found",
    "resource.event.not-found",
    "resource.export.not-found",
    "resource.fraud-service-configuration.not-found",
    "resource.gateway-configuration.not-found",
    "resource.gateway.not-found",
    "resource.invoice.not-found",
    "resource.not-found",
    "resource.payout.not-found",
    "resource.permission-group.not-found",
    "resource.plan.not-found",
    "resource.product.not-found",
    "resource.project.not-found",
    "resource.refund.not-found",
    "resource.subscription.not-found",
    "resource.token.not-found",
    "resource.tokenization-request.not-found",
    "resource.transaction.not-found",
    "resource.user.not-found",
    "resource.webhook-endpoint.not-found",
];

/// Business-rule error types the backend documents.
const GENERIC_CODES: &[&str] = &[
    "card.acquirer-failed",
    "card.bad-track-data",
    "card.blacklisted",
    "card.contact-bank",
    "card.currency-unsupported",
    "card.declined",
    "card.do-not-honor",
    "card.dont-retry",
    "card.duplicate",
    "card.exceeded-activity-limits",
    "card.exceeded-limits",
    "card.exceeded-withdrawal-limit",
    "card.expired",
    "card.expired-3ds",
    "card.failed-3ds",
    "card.failed-avs",
    "card.failed-avs-address",
    "card.failed-avs-postal",
    "card.failed-cvc",
    "card.failed-cvc-and-avs",
    "card.invalid",
    "card.invalid-account",
    "card.invalid-address",
    "card.invalid-cvc",
    "card.invalid-expiry-date",
    "card.invalid-expiry-month",
    "card.invalid-expiry-year",
    "card.invalid-name",
    "card.invalid-number",
    "card.invalid-pin",
    "card.invalid-zip",
    "card.issuer-down",
    "card.issuer-failed",
    "card.issuer-not-found",
    "card.lost",
    "card.maximum-attempts",
    "card.missing-3ds",
    "card.missing-cvc",
    "card.missing-expiry",
    "card.missing-number",
    "card.needs-authentication",
    "card.network-failed",
    "card.no-action-taken",
    "card.no-money",
    "card.not-activated",
    "card.not-authorized",
    "card.not-registered",
    "card.not-supported",
    "card.pending-3ds",
    "card.please-retry",
    "card.processing-error",
    "card.revoked",
    "card.revoked-all",
    "card.security-violation",
    "card.stolen",
    "card.test",
    "card.type-not-supported",
    "card.unsupported-3ds",
    "gateway.declined",
    "gateway.unknown-error",
    "payment.declined",
    "processout-mobile.generic.error",
    "request.bad-format",
    "request.card.invalid",
    "request.configuration.missing-gateway-configuration",
    "request.expand.invalid",
    "request.filter.invalid",
    "request.gateway.not-available",
    "request.gateway.operation-not-supported",
    "request.idempotency-key.invalid",
    "request.pagination.invalid",
    "request.rate.exceeded",
    "request.source.card-already-used",
    "request.source.invalid",
    "request.still-processing",
    "request.too-much",
    "request.transaction-blocked",
    "resource.not-linked",
    "routing-rules.transaction-blocked",
    "sandbox.not-supported",
    "service.not-supported",
];


/// Authentication failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationCode {
    Invalid,
    InvalidProjectId,
}

impl AuthenticationCode {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "request.authentication.invalid" => Some(Self::Invalid),
            "request.authentication.invalid-project-id" => Some(Self::InvalidProjectId),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "request.authentication.invalid",
            Self::InvalidProjectId => "request.authentication.invalid-project-id",
        }
    }
}

/// Where a timeout happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutCode {
    Gateway,
    Mobile,
}

impl TimeoutCode {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "gateway.timeout" => Some(Self::Gateway),
            "processout-mobile.timeout" => Some(Self::Mobile),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway.timeout",
            Self::Mobile => "processout-mobile.timeout",
        }
    }
}

/// Where an internal error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalCode {
    Gateway,
    Mobile,
}

impl InternalCode {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "gateway-internal-error" => Some(Self::Gateway),
            "processout-mobile.internal" => Some(Self::Mobile),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway-internal-error",
            Self::Mobile => "processout-mobile.internal",
        }
    }
}

/// Domain failure code.
///
/// Open-ended families (`NotFound`, `Validation`, `Generic`) keep the raw
/// backend error type because the backend adds new members over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCode {
    Authentication(AuthenticationCode),
    NotFound(String),
    Validation(String),
    Generic(String),
    Timeout(TimeoutCode),
    Internal(InternalCode),
    NetworkUnreachable,
    Cancelled,
    Unknown(String),
}

impl FailureCode {
    /// Classify a backend error type by family, ignoring the status code.
    ///
    /// Documented error types are matched exactly. Undocumented ones fall
    /// back to their family prefix so codes the backend adds later still
    /// land in the right family.
    pub fn not_found(raw: &str) -> Option<Self> {
        let known = NOT_FOUND_CODES.contains(&raw)
            || (raw.starts_with("resource.") && raw.ends_with(".not-found"));
        known.then(|| Self::NotFound(raw.to_string()))
    }

    pub fn validation(raw: &str) -> Option<Self> {
        let known = VALIDATION_CODES.contains(&raw)
            || raw.starts_with("request.validation.")
            || raw.starts_with("gateway.invalid-")
            || raw.starts_with("gateway.missing-");
        known.then(|| Self::Validation(raw.to_string()))
    }

    /// Business-rule failures (declines, rate limits, unsupported
    /// operations).
    pub fn generic(raw: &str) -> Option<Self> {
        let known = GENERIC_CODES.contains(&raw)
            || raw.starts_with("card.")
            || raw.starts_with("payment.");
        known.then(|| Self::Generic(raw.to_string()))
    }

    /// Raw code string as the backend spells it.
    pub fn raw_value(&self) -> &str {
        match self {
            Self::Authentication(code) => code.as_str(),
            Self::NotFound(raw) | Self::Validation(raw) | Self::Generic(raw) | Self::Unknown(raw) => {
                raw
            }
            Self::Timeout(code) => code.as_str(),
            Self::Internal(code) => code.as_str(),
            Self::NetworkUnreachable => "processout-mobile.network-unreachable",
            Self::Cancelled => "processout-mobile.cancelled",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw_value())
    }
}

/// Failure visible to callers of the pipeline.
#[derive(Debug, Clone)]
pub struct Failure {
    pub message: Option<String>,
    pub code: FailureCode,
    pub invalid_fields: Option<Vec<InvalidField>>,
    underlying: Option<ConnectorFailure>,
}

impl Failure {
    pub fn new(message: Option<String>, code: FailureCode) -> Self {
        Self {
            message,
            code,
            invalid_fields: None,
            underlying: None,
        }
    }

    pub fn with_invalid_fields(mut self, invalid_fields: Option<Vec<InvalidField>>) -> Self {
        self.invalid_fields = invalid_fields;
        self
    }

    pub fn with_underlying(mut self, underlying: ConnectorFailure) -> Self {
        self.underlying = Some(underlying);
        self
    }

    /// The connector failure this one was mapped from.
    pub fn underlying(&self) -> Option<&ConnectorFailure> {
        self.underlying.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == FailureCode::Cancelled
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.underlying
            .as_ref()
            .map(|failure| failure as &(dyn std::error::Error + 'static))
    }
}
