//! Mock payout gateway for tests and gateway-less deployments.

use super::{GatewayError, PayoutGateway};
use crate::domain::Money;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One recorded transfer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransfer {
    pub partner_id: String,
    pub amount: Money,
    pub reference: String,
}

/// In-memory gateway that records calls and mints deterministic refs.
#[derive(Debug, Default)]
pub struct MockPayoutGateway {
    fail_next: AtomicBool,
    calls: Mutex<Vec<RecordedTransfer>>,
}

impl MockPayoutGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next transfer fail with a rejection.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Transfers recorded so far.
    pub fn calls(&self) -> Vec<RecordedTransfer> {
        self.calls.lock().expect("mock gateway lock poisoned").clone()
    }
}

#[async_trait]
impl PayoutGateway for MockPayoutGateway {
    async fn initiate_transfer(
        &self,
        partner_id: &str,
        amount: Money,
        _bank_details: Option<&str>,
        reference: &str,
    ) -> Result<String, GatewayError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Rejected("simulated failure".to_string()));
        }

        self.calls
            .lock()
            .expect("mock gateway lock poisoned")
            .push(RecordedTransfer {
                partner_id: partner_id.to_string(),
                amount,
                reference: reference.to_string(),
            });

        Ok(format!("mock-txn-{}", reference))
    }
}
