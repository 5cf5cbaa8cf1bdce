//! HTTP payout provider client.

use super::{GatewayError, PayoutGateway};
use crate::domain::Money;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Payout gateway speaking a provider's JSON transfer API.
#[derive(Debug, Clone)]
pub struct HttpPayoutGateway {
    client: Client,
    base_url: String,
}

impl HttpPayoutGateway {
    /// Create a new gateway against the given provider base URL.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post_transfer(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}/transfers", self.base_url);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(GatewayError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(GatewayError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(GatewayError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(GatewayError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(GatewayError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PayoutGateway for HttpPayoutGateway {
    async fn initiate_transfer(
        &self,
        partner_id: &str,
        amount: Money,
        bank_details: Option<&str>,
        reference: &str,
    ) -> Result<String, GatewayError> {
        debug!(
            "Initiating transfer for partner={}, amount={}, reference={}",
            partner_id, amount, reference
        );

        let payload = serde_json::json!({
            "beneficiary": partner_id,
            "amount": amount.to_canonical_string(),
            "account": bank_details,
            "reference": reference,
        });

        let response = self.post_transfer(payload).await?;

        if let Some(rejection) = response.get("rejectionReason").and_then(|v| v.as_str()) {
            return Err(GatewayError::Rejected(rejection.to_string()));
        }

        response
            .get("transactionRef")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                GatewayError::ParseError("Response missing transactionRef".to_string())
            })
    }
}
