//! # Payment Error Types
//!
//! Typed error handling for the lightning-cart checkout flow.
//! All checkout, coupon and reconciliation operations return `Result<T, PaymentError>`.

use thiserror::Error;

/// Core error type for all payment and authorization operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or empty cart, missing session id, etc.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing, malformed or unverifiable access credential
    #[error("Not authorized: {0}")]
    Unauthenticated(String),

    /// Access token signature was valid but the token has expired
    #[error("Token expired")]
    TokenExpired,

    /// Authenticated, but the role does not grant access
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Provider reports the checkout session as not paid
    #[error("Payment not completed for session {session_id} (status: {status})")]
    PaymentIncomplete { session_id: String, status: String },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Persistence layer failure
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::NetworkError(_) | PaymentError::ProviderError { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::InvalidInput(_) => 400,
            PaymentError::PaymentIncomplete { .. } => 400,
            PaymentError::Unauthenticated(_) => 401,
            PaymentError::TokenExpired => 401,
            PaymentError::Forbidden(_) => 403,
            PaymentError::Configuration(_)
            | PaymentError::ProviderError { .. }
            | PaymentError::NetworkError(_)
            | PaymentError::Store(_)
            | PaymentError::Internal(_)
            | PaymentError::Serialization(_) => 500,
        }
    }

    /// Stable machine-readable reason for client-facing errors.
    ///
    /// `token_expired` is kept apart from `unauthenticated` so a client can
    /// attempt a silent refresh instead of forcing a new login.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            PaymentError::InvalidInput(_) => Some("invalid_input"),
            PaymentError::Unauthenticated(_) => Some("unauthenticated"),
            PaymentError::TokenExpired => Some("token_expired"),
            PaymentError::Forbidden(_) => Some("forbidden"),
            PaymentError::PaymentIncomplete { .. } => Some("payment_incomplete"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::Serialization(err.to_string())
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
