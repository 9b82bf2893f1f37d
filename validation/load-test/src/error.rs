//! Failure kinds reported to the statistics for a single request.

use thiserror::Error;
use trackme_common::ModelError;

use crate::api::ApiResponse;

/// Characters of a response body quoted in a failure message.
const SNIPPET_LEN: usize = 100;

/// Why a request counted as failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailure {
    #[error("Connection failed: {0}")]
    Transport(String),

    #[error("Unauthorized - token may be invalid")]
    Unauthorized,

    #[error("Client not found: {0}")]
    NotFound(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    #[error("Incomplete response: {0}")]
    Incomplete(#[from] ModelError),

    #[error("No token in auth response")]
    MissingToken,
}

impl TaskFailure {
    /// Status-code failure carrying a prefix of the body.
    pub fn unexpected(response: &ApiResponse) -> Self {
        TaskFailure::UnexpectedStatus {
            status: response.status,
            body: response.snippet(SNIPPET_LEN).to_string(),
        }
    }

    /// Transport failure if no response arrived.
    pub fn transport(response: &ApiResponse) -> Option<Self> {
        response
            .transport_error
            .as_ref()
            .map(|e| TaskFailure::Transport(e.clone()))
    }

    /// Transport failure if no response arrived, else an unexpected status.
    pub fn from_response(response: &ApiResponse) -> Self {
        Self::transport(response).unwrap_or_else(|| Self::unexpected(response))
    }

    /// Default accounting: any 2xx or 3xx is a success.
    pub fn check_default(response: &ApiResponse) -> Result<(), Self> {
        if let Some(failure) = Self::transport(response) {
            return Err(failure);
        }
        match response.status {
            200..=399 => Ok(()),
            _ => Err(Self::unexpected(response)),
        }
    }
}

impl From<serde_json::Error> for TaskFailure {
    fn from(err: serde_json::Error) -> Self {
        TaskFailure::MalformedBody(err.to_string())
    }
}
