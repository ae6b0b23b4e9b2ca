//! AI provider error handling.

use std::time::Duration;

use thiserror::Error;

use crate::redaction::redact;

/// Longest provider response body kept in an error message.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Whether a failed call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// May succeed on a later attempt.
    Transient,
    /// Will fail the same way again.
    Permanent,
}

/// Errors raised while talking to an AI provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Credential environment variable is not set.
    #[error("API key not found. Set the {0} environment variable")]
    MissingCredential(String),

    /// Provider name is not in the registry.
    #[error("Unknown AI provider: {0}")]
    UnknownProvider(String),

    /// The provider rejected the credential.
    #[error("Authentication failed (HTTP {status}): {body}")]
    Authentication {
        /// HTTP status code.
        status: u16,
        /// Redacted response body.
        body: String,
    },

    /// Any other non-success HTTP status.
    #[error("API request failed (HTTP {status}): {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Redacted response body.
        body: String,
    },

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not finish within the per-call timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response could not be understood.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Builds the error for a non-success HTTP status.
    ///
    /// The body is redacted and truncated before it is stored, since it may
    /// echo parts of the request.
    pub fn from_status(status: u16, body: &str) -> Self {
        let mut body = redact(body.trim());
        if body.len() > MAX_ERROR_BODY_LEN {
            let mut cut = MAX_ERROR_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }

        match status {
            401 | 403 => Self::Authentication { status, body },
            _ => Self::Http { status, body },
        }
    }

    /// Classifies the error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { status, .. } if matches!(status, 408 | 429 | 500..=599) => {
                ErrorKind::Transient
            }
            Self::Network(_) | Self::Timeout(_) => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }
}
