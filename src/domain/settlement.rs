//! Settlement batches and maturity-date arithmetic.

use crate::domain::{Money, OrderId, SellerId, Tier};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Lifecycle of a settlement batch. Transitions are owned by the batch
/// processor; a completed batch is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Scheduled,
    Processing,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Processing => "processing",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(ScheduleStatus::Scheduled),
            "processing" => Some(ScheduleStatus::Processing),
            "completed" => Some(ScheduleStatus::Completed),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A per-seller, per-maturity-date batch of orders awaiting settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSchedule {
    pub id: String,
    pub seller_id: SellerId,
    /// Tier recorded when the batch was opened; later tier changes do not
    /// move orders already batched.
    pub tier_at_creation: Tier,
    pub order_ids: Vec<OrderId>,
    /// Sum of member order earnings.
    pub total_amount: Money,
    pub settlement_date: NaiveDate,
    pub status: ScheduleStatus,
    /// Admin veto; the batch processor skips held batches.
    pub on_hold: bool,
    pub failure_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Maturity date for an order delivered on `delivered_date`.
///
/// Delivery date plus the tier delay, advanced to the following Monday
/// when the raw date lands on a weekend.
pub fn settlement_date_for(tier: Tier, delivered_date: NaiveDate) -> NaiveDate {
    let raw = delivered_date + Duration::days(tier.settlement_days());
    match raw.weekday() {
        Weekday::Sat => raw + Duration::days(2),
        Weekday::Sun => raw + Duration::days(1),
        _ => raw,
    }
}
