use shared::error::ApiError;
use thiserror::Error;

use crate::{filter::FilterError, pagination::PaginationError, reorder::ReorderError};

/// Failure talking to the back-office API.
///
/// Cloneable so a single failed load can be handed to every caller that was
/// coalesced onto it.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication required: {0}")]
    Unauthorized(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_auth(&self) -> bool {
        matches!(self, TransportError::Unauthorized(_))
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let api_error = ApiError::from_body(body);
        let message = match &api_error {
            Some(err) if !err.message.is_empty() => err.message.clone(),
            _ if body.trim().is_empty() => format!("HTTP {status}"),
            _ => body.trim().chars().take(200).collect(),
        };
        if status == 401 || status == 403 || api_error.is_some_and(|err| err.is_auth_failure()) {
            TransportError::Unauthorized(message)
        } else {
            TransportError::Status { status, message }
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::from_status(status.as_u16(), "")
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::InvalidRequest(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("screen for {0} has been unmounted")]
    Unmounted(shared::domain::Resource),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
