//! Partner withdrawal requests and their approval state machine.

use crate::domain::{Money, PartnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Withdrawal lifecycle. Pending requests move to Completed or Rejected
/// through admin review; Processing marks an approved transfer in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    /// An outstanding request blocks the partner from filing another.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Processing)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A partner's request to withdraw from their available balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub partner_id: PartnerId,
    pub amount: Money,
    /// Balance observed when the request was filed. Approval re-checks the
    /// live balance; this field is informational.
    pub balance_at_request: Money,
    pub status: WithdrawalStatus,
    /// Admin payout hold; a held request cannot be approved until released.
    pub on_hold: bool,
    pub bank_details: Option<String>,
    pub reviewed_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub transaction_ref: Option<String>,
    pub balance_after_payout: Option<Money>,
    pub requested_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}
