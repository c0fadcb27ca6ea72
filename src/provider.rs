//! Error classification for the external calendar and search backends

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failure reported by an external collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

/// Classification of provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection failure or timeout
    Network,
    /// Missing, expired or insufficient credentials (401, 403)
    Auth,
    /// Quota or rate limit (429)
    RateLimit,
    /// The addressed resource does not exist (404, 410)
    NotFound,
    /// Provider-side failure (5xx)
    Server,
    /// Response body did not match the expected shape
    InvalidResponse,
    Other,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidResponse, message)
    }

    /// Classify a transport-level failure
    pub fn from_reqwest(service: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() || err.is_connect() {
            ProviderErrorKind::Network
        } else if err.is_decode() {
            ProviderErrorKind::InvalidResponse
        } else {
            ProviderErrorKind::Other
        };
        Self::new(kind, format!("{service} request failed: {err}"))
    }

    /// Classify a non-success HTTP status, extracting the provider's message when present
    pub fn from_status(service: &str, status: StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => ProviderErrorKind::Auth,
            404 | 410 => ProviderErrorKind::NotFound,
            429 => ProviderErrorKind::RateLimit,
            500..=599 => ProviderErrorKind::Server,
            _ => ProviderErrorKind::Other,
        };
        let detail = extract_error_message(body).unwrap_or_else(|| body.trim().to_string());
        let message = match kind {
            ProviderErrorKind::Auth => format!(
                "{service} rejected the credentials ({status}): {detail}. Re-authorize the account."
            ),
            _ => format!("{service} error ({status}): {detail}"),
        };
        Self::new(kind, message)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    // {"error": {"message": "..."}}
    Nested { error: NestedError },
    // {"error": "..."} or {"detail": "..."}
    Flat {
        #[serde(alias = "detail")]
        error: String,
    },
}

#[derive(Deserialize)]
struct NestedError {
    message: String,
}

fn extract_error_message(body: &str) -> Option<String> {
    match serde_json::from_str::<ErrorBody>(body).ok()? {
        ErrorBody::Nested { error } => Some(error.message),
        ErrorBody::Flat { error } => Some(error),
    }
}
