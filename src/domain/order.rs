//! Projection of marketplace orders as consumed by the settlement engine.
//!
//! Orders are created and moved through delivery states by the surrounding
//! platform; this subsystem only reads the financial fields and stamps the
//! settlement outcome back on.

use crate::domain::{Money, OrderId, PartnerId, SellerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Delivered,
    /// Return to origin: delivery failed, parcel returned to seller.
    Rto,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rto => "rto",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(OrderStatus::Created),
            "delivered" => Some(OrderStatus::Delivered),
            "rto" => Some(OrderStatus::Rto),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// How the consignee pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Prepaid,
    Cod,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Prepaid => "prepaid",
            PaymentMode::Cod => "cod",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prepaid" => Some(PaymentMode::Prepaid),
            "cod" => Some(PaymentMode::Cod),
            _ => None,
        }
    }
}

/// Where the order stands in the settlement pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Unscheduled,
    Scheduled,
    Settled,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Unscheduled => "unscheduled",
            SettlementStatus::Scheduled => "scheduled",
            SettlementStatus::Settled => "settled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unscheduled" => Some(SettlementStatus::Unscheduled),
            "scheduled" => Some(SettlementStatus::Scheduled),
            "settled" => Some(SettlementStatus::Settled),
            _ => None,
        }
    }
}

/// One marketplace order as seen by settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub seller_id: SellerId,
    pub partner_id: Option<PartnerId>,
    pub payment_mode: PaymentMode,
    /// Total order value charged to the consignee.
    pub order_value: Money,
    pub shipping_cost: Money,
    /// Declared COD amount (zero for prepaid).
    pub cod_amount: Money,
    /// Delivery distance, drives partner compensation.
    pub distance_km: Money,
    pub status: OrderStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub settlement_status: SettlementStatus,
    pub settlement_date: Option<chrono::NaiveDate>,
    pub platform_fee: Option<Money>,
    pub seller_earning: Option<Money>,
    /// Batch the order was scheduled into, once scheduled.
    pub batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            OrderStatus::Created,
            OrderStatus::Delivered,
            OrderStatus::Rto,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn test_payment_mode_roundtrip() {
        assert_eq!(PaymentMode::parse("cod"), Some(PaymentMode::Cod));
        assert_eq!(PaymentMode::parse("prepaid"), Some(PaymentMode::Prepaid));
        assert_eq!(PaymentMode::parse("card"), None);
    }

    #[test]
    fn test_settlement_status_roundtrip() {
        for s in [
            SettlementStatus::Unscheduled,
            SettlementStatus::Scheduled,
            SettlementStatus::Settled,
        ] {
            assert_eq!(SettlementStatus::parse(s.as_str()), Some(s));
        }
    }
}
