//! Cash-on-delivery collections and net settlement computation.
//!
//! COD reconciliation tracks physical cash flow independently of the
//! seller-earning ledger path, so declared-vs-collected discrepancies stay
//! auditable.

use crate::domain::{Money, OrderId, PartnerId, SellerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the collected cash stands between partner and platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemittanceStatus {
    /// Partner holds the cash.
    Collected,
    /// Partner has handed the cash to the platform.
    Remitted,
}

impl RemittanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemittanceStatus::Collected => "collected",
            RemittanceStatus::Remitted => "remitted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "collected" => Some(RemittanceStatus::Collected),
            "remitted" => Some(RemittanceStatus::Remitted),
            _ => None,
        }
    }
}

/// One COD collection, unique per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodCollection {
    pub order_id: OrderId,
    pub seller_id: SellerId,
    pub partner_id: PartnerId,
    /// Amount declared on the order.
    pub cod_amount: Money,
    /// Amount the partner actually collected at the door.
    pub collected_amount: Money,
    pub shipping_charge: Money,
    pub platform_fee: Money,
    pub cod_handling_fee: Money,
    pub net_settlement: Money,
    pub remittance_status: RemittanceStatus,
    pub collected_at: DateTime<Utc>,
    pub remitted_at: Option<DateTime<Utc>>,
}

/// Handling fee and net settlement for a collected amount.
///
/// Handling fee is 2 percent of the collected cash; net settlement is the
/// collected cash less shipping, platform fee, and handling fee, floored
/// at zero. Each step rounds to 2 decimals.
pub fn compute_cod_settlement(
    collected_amount: Money,
    shipping_charge: Money,
    platform_fee: Money,
    handling_fee_pct: Money,
) -> (Money, Money) {
    let handling_fee = collected_amount.percent(handling_fee_pct);
    let net = (collected_amount - shipping_charge - platform_fee - handling_fee)
        .round2()
        .floor_zero();
    (handling_fee, net)
}
