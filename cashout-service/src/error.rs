//! API error sum type
//!
//! Handlers return `Result<T, ApiError>`; the outer dispatcher converts
//! to wire form. No exception-style control flow anywhere.

use thiserror::Error;

/// Result type for Circuit handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// One HTTP-mappable failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status} {kind}: {message}")]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Stable machine-readable kind
    pub kind: &'static str,
    /// Human-readable detail, suppressed on 5xx wire responses
    pub message: String,
}

impl ApiError {
    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            kind: "bad-request",
            message: message.into(),
        }
    }

    /// 403
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: 403,
            kind: "forbidden",
            message: message.into(),
        }
    }

    /// 404
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: 404,
            kind: "not-found",
            message: message.into(),
        }
    }

    /// 409
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: 409,
            kind: "conflict",
            message: message.into(),
        }
    }

    /// 412
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self {
            status: 412,
            kind: "precondition-failed",
            message: message.into(),
        }
    }

    /// 500
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            kind: "internal",
            message: message.into(),
        }
    }

    /// 503
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            status: 503,
            kind: "service-unavailable",
            message: message.into(),
        }
    }
}

impl From<ledger_core::Error> for ApiError {
    fn from(err: ledger_core::Error) -> Self {
        use ledger_core::Error::*;
        match err {
            InsufficientFunds => ApiError::precondition_failed("insufficient funds"),
            ZeroAmount | BadCurrency { .. } | InvalidAmount(_) => {
                ApiError::bad_request(err.to_string())
            }
            NotFound(what) => ApiError::not_found(what),
            Duplicate(what) => ApiError::conflict(what),
            SerializationConflict | Config(_) | Invariant(_) => ApiError::internal(err.to_string()),
        }
    }
}
