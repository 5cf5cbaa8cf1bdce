//! Denormalized per-seller aggregates.
//!
//! The stats row is a read-optimized cache over order, ledger, and COD
//! history. It must always equal the deterministic fold the recompute
//! procedure performs; incremental bumps are an optimization, not the
//! source of truth.

use crate::domain::{Money, SellerId, Tier};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Aggregate dashboard summary for one seller.
///
/// `rto_percent` and `delivery_success_rate` are lifetime figures; tier
/// evaluation uses trailing-month windows computed separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerStats {
    pub seller_id: SellerId,
    pub current_tier: Tier,
    pub total_orders: i64,
    pub delivered_orders: i64,
    pub rto_orders: i64,
    pub cancelled_orders: i64,
    pub gross_revenue: Money,
    pub shipping_cost: Money,
    pub platform_fees: Money,
    pub total_settled: Money,
    pub pending_settlement: Money,
    pub available_for_withdrawal: Money,
    pub total_cod_collected: Money,
    pub pending_cod_remittance: Money,
    pub rto_percent: f64,
    pub delivery_success_rate: f64,
    pub next_settlement_date: Option<NaiveDate>,
}

impl SellerStats {
    /// Empty aggregate for a seller with no history.
    pub fn empty(seller_id: SellerId, tier: Tier) -> Self {
        SellerStats {
            seller_id,
            current_tier: tier,
            total_orders: 0,
            delivered_orders: 0,
            rto_orders: 0,
            cancelled_orders: 0,
            gross_revenue: Money::zero(),
            shipping_cost: Money::zero(),
            platform_fees: Money::zero(),
            total_settled: Money::zero(),
            pending_settlement: Money::zero(),
            available_for_withdrawal: Money::zero(),
            total_cod_collected: Money::zero(),
            pending_cod_remittance: Money::zero(),
            rto_percent: 0.0,
            delivery_success_rate: 0.0,
            next_settlement_date: None,
        }
    }

    /// Recompute the lifetime percentage fields from the counters.
    pub fn refresh_rates(&mut self) {
        if self.total_orders == 0 {
            self.rto_percent = 0.0;
            self.delivery_success_rate = 0.0;
        } else {
            self.rto_percent = 100.0 * self.rto_orders as f64 / self.total_orders as f64;
            self.delivery_success_rate =
                100.0 * self.delivered_orders as f64 / self.total_orders as f64;
        }
    }
}
