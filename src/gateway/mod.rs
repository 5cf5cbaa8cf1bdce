//! Payout gateway abstraction for moving approved withdrawals to a bank.

use crate::domain::Money;
use async_trait::async_trait;
use std::fmt;

pub mod http;
pub mod mock;

pub use http::HttpPayoutGateway;
pub use mock::MockPayoutGateway;

/// Gateway trait for initiating bank transfers.
///
/// Implementations must handle retry/backoff and rate limiting; callers
/// treat a returned transaction reference as proof the transfer was
/// accepted downstream.
#[async_trait]
pub trait PayoutGateway: Send + Sync + fmt::Debug {
    /// Initiate a transfer for an approved withdrawal.
    ///
    /// # Arguments
    /// * `partner_id` - Recipient partner
    /// * `amount` - Transfer amount, already validated against the ledger
    /// * `bank_details` - Opaque account reference captured at request time
    /// * `reference` - Idempotency reference (the withdrawal id)
    ///
    /// # Returns
    /// The provider's transaction reference.
    async fn initiate_transfer(
        &self,
        partner_id: &str,
        amount: Money,
        bank_details: Option<&str>,
        reference: &str,
    ) -> Result<String, GatewayError>;
}

/// Error type for payout gateway operations.
#[derive(Debug, Clone)]
pub enum GatewayError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Transfer rejected by the provider
    Rejected(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            GatewayError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            GatewayError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            GatewayError::RateLimited => write!(f, "Rate limited"),
            GatewayError::Rejected(msg) => write!(f, "Transfer rejected: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = GatewayError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = GatewayError::Rejected("account closed".to_string());
        assert_eq!(err.to_string(), "Transfer rejected: account closed");

        let err = GatewayError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");
    }
}
