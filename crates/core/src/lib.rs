//! Shared primitives for all auditrelay crates.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across auditrelay crates.
pub type AuditResult<T> = Result<T, AuditError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AuditResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AuditError::InvalidConfiguration(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Failure categories surfaced to the event-dispatch caller.
///
/// Every failure is typed; nothing is swallowed and there is no local
/// spool-and-forward fallback.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A mandatory nested field of a domain event is absent.
    ///
    /// Carries the logical path of the missing field, e.g.
    /// `"access.attributes"`.
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    /// The generic event payload could not be parsed.
    #[error("malformed general event: {0}")]
    MalformedGeneralEvent(String),

    /// An event batch could not be encoded to its wire representation.
    ///
    /// Client-side defect; never retried.
    #[error("failed to serialize event batch: {0}")]
    SerializationFailure(String),

    /// Certificate or key parsing, or TLS context construction, failed.
    ///
    /// Fatal at construction time; the handler is not registered.
    #[error("failed to initialize certificate transport: {0}")]
    TransportInitialization(String),

    /// The ingestion endpoint returned a non-success status.
    #[error("audit log service returned unexpected status {status}: {body}")]
    UnexpectedResponseStatus {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Best-effort error response body.
        body: String,
    },

    /// Network or timeout failure after exhausting the retry budget.
    #[error("audit log service not available: {0}")]
    ServiceUnavailable(String),

    /// A service binding field is missing, empty, or malformed.
    #[error("invalid audit log configuration: {0}")]
    InvalidConfiguration(String),
}
