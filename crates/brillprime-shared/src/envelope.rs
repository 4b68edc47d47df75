//! The uniform request outcome envelope.
//!
//! Every outbound API call resolves to `ApiResult<T>`: either the decoded
//! payload or an [`ApiFailure`] describing an *expected* failure class.
//! Expected failures are values, never panics, so each call site can branch
//! on [`ApiErrorKind`] without a catch-all handler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of an expected request failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ApiErrorKind {
    /// The device was observed offline before the request was attempted
    NetworkUnavailable,
    /// The fixed request deadline elapsed with no response
    Timeout,
    /// HTTP 401; the stored session has already been invalidated
    Unauthorized,
    /// Any other non-2xx response or transport-level failure
    Server,
}

/// An expected request failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiFailure {
    pub kind: ApiErrorKind,
    /// Human-readable message, taken from the response body when available
    pub message: String,
    /// HTTP status, when the failure came from an actual response
    pub status: Option<u16>,
}

/// Outcome of one API call.
pub type ApiResult<T> = Result<T, ApiFailure>;

impl ApiFailure {
    pub fn network_unavailable() -> Self {
        Self {
            kind: ApiErrorKind::NetworkUnavailable,
            message: "No internet connection".to_string(),
            status: None,
        }
    }

    pub fn timeout(secs: u64) -> Self {
        Self {
            kind: ApiErrorKind::Timeout,
            message: format!("Request timed out after {secs}s"),
            status: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: message.into(),
            status: Some(401),
        }
    }

    pub fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Server,
            message: message.into(),
            status,
        }
    }
}
