//! Seller aggregate maintenance.
//!
//! Incremental bumps ride along with each engine effect; the recompute path
//! rebuilds the whole row from order, ledger, and COD history and is the
//! authoritative repair procedure.

use crate::db::Repository;
use crate::domain::{
    EntryType, Money, OrderStatus, RemittanceStatus, SellerId, SellerStats, Tier,
};
use crate::error::AppError;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

pub struct StatsEngine {
    repo: Arc<Repository>,
}

impl StatsEngine {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    async fn load_or_empty(&self, seller_id: &SellerId, tier: Tier) -> Result<SellerStats, AppError> {
        Ok(self
            .repo
            .get_seller_stats(seller_id)
            .await?
            .unwrap_or_else(|| SellerStats::empty(seller_id.clone(), tier)))
    }

    /// New order registered.
    pub async fn apply_order_created(
        &self,
        seller_id: &SellerId,
        tier: Tier,
    ) -> Result<(), AppError> {
        let mut stats = self.load_or_empty(seller_id, tier).await?;
        stats.total_orders += 1;
        stats.refresh_rates();
        self.repo.upsert_seller_stats(&stats).await?;
        Ok(())
    }

    /// Terminal delivery-state change (delivered / rto / cancelled).
    pub async fn apply_order_outcome(
        &self,
        seller_id: &SellerId,
        tier: Tier,
        status: OrderStatus,
    ) -> Result<(), AppError> {
        let mut stats = self.load_or_empty(seller_id, tier).await?;
        match status {
            OrderStatus::Delivered => stats.delivered_orders += 1,
            OrderStatus::Rto => stats.rto_orders += 1,
            OrderStatus::Cancelled => stats.cancelled_orders += 1,
            OrderStatus::Created => {}
        }
        stats.refresh_rates();
        self.repo.upsert_seller_stats(&stats).await?;
        Ok(())
    }

    /// Delivered order entered a settlement batch.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_settlement_scheduled(
        &self,
        seller_id: &SellerId,
        tier: Tier,
        order_value: Money,
        shipping_cost: Money,
        platform_fee: Money,
        seller_earning: Money,
        next_settlement_date: Option<NaiveDate>,
    ) -> Result<(), AppError> {
        let mut stats = self.load_or_empty(seller_id, tier).await?;
        stats.gross_revenue = stats.gross_revenue + order_value;
        stats.shipping_cost = stats.shipping_cost + shipping_cost;
        stats.platform_fees = stats.platform_fees + platform_fee;
        stats.pending_settlement = stats.pending_settlement + seller_earning;
        stats.next_settlement_date = next_settlement_date;
        self.repo.upsert_seller_stats(&stats).await?;
        Ok(())
    }

    /// Matured batch released pending funds to available.
    pub async fn apply_batch_settled(
        &self,
        seller_id: &SellerId,
        tier: Tier,
        total_amount: Money,
        next_settlement_date: Option<NaiveDate>,
    ) -> Result<(), AppError> {
        let mut stats = self.load_or_empty(seller_id, tier).await?;
        stats.pending_settlement = (stats.pending_settlement - total_amount).floor_zero();
        stats.available_for_withdrawal = stats.available_for_withdrawal + total_amount;
        stats.total_settled = stats.total_settled + total_amount;
        stats.next_settlement_date = next_settlement_date;
        self.repo.upsert_seller_stats(&stats).await?;
        Ok(())
    }

    /// COD cash reported collected by a partner.
    pub async fn apply_cod_collected(
        &self,
        seller_id: &SellerId,
        tier: Tier,
        collected_amount: Money,
    ) -> Result<(), AppError> {
        let mut stats = self.load_or_empty(seller_id, tier).await?;
        stats.total_cod_collected = stats.total_cod_collected + collected_amount;
        stats.pending_cod_remittance = stats.pending_cod_remittance + collected_amount;
        self.repo.upsert_seller_stats(&stats).await?;
        Ok(())
    }

    /// COD cash handed over to the platform.
    pub async fn apply_cod_remitted(
        &self,
        seller_id: &SellerId,
        tier: Tier,
        collected_amount: Money,
    ) -> Result<(), AppError> {
        let mut stats = self.load_or_empty(seller_id, tier).await?;
        stats.pending_cod_remittance =
            (stats.pending_cod_remittance - collected_amount).floor_zero();
        self.repo.upsert_seller_stats(&stats).await?;
        Ok(())
    }

    /// Tier changed (evaluation or admin override).
    pub async fn apply_tier_change(
        &self,
        seller_id: &SellerId,
        tier: Tier,
    ) -> Result<(), AppError> {
        let mut stats = self.load_or_empty(seller_id, tier).await?;
        stats.current_tier = tier;
        self.repo.upsert_seller_stats(&stats).await?;
        Ok(())
    }

    /// Rebuild the aggregate row from scratch.
    ///
    /// Deterministic fold over order, ledger, and COD history; always safe
    /// to run, and the repair for any drift the incremental path accrued.
    pub async fn recompute(&self, seller_id: &SellerId) -> Result<SellerStats, AppError> {
        let seller = self
            .repo
            .get_seller(seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("seller {} not found", seller_id)))?;

        let mut stats = SellerStats::empty(seller_id.clone(), seller.tier);

        let orders = self.repo.query_seller_orders(seller_id).await?;
        for order in &orders {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::Delivered => {
                    stats.delivered_orders += 1;
                    stats.gross_revenue = stats.gross_revenue + order.order_value;
                    stats.shipping_cost = stats.shipping_cost + order.shipping_cost;
                    if let Some(fee) = order.platform_fee {
                        stats.platform_fees = stats.platform_fees + fee;
                    }
                }
                OrderStatus::Rto => stats.rto_orders += 1,
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
                OrderStatus::Created => {}
            }
        }

        // Bucket balances come from the chain tail; total_settled is the sum
        // of settlement releases. Summed in Rust to keep decimal precision.
        let actor = crate::domain::ActorRef::seller(seller_id);
        let chain = self.repo.ledger_chain(&actor).await?;
        for entry in &chain {
            if entry.entry_type == EntryType::Settlement {
                stats.total_settled = stats.total_settled + entry.amount;
            }
        }
        if let Some(last) = chain.last() {
            if let Some(buckets) = last.buckets {
                stats.pending_settlement = buckets.pending_after;
                stats.available_for_withdrawal = buckets.available_after;
            }
        }

        let collections = self.repo.query_seller_cod_collections(seller_id).await?;
        for collection in &collections {
            stats.total_cod_collected = stats.total_cod_collected + collection.collected_amount;
            if collection.remittance_status == RemittanceStatus::Collected {
                stats.pending_cod_remittance =
                    stats.pending_cod_remittance + collection.collected_amount;
            }
        }

        stats.next_settlement_date = self.repo.next_settlement_date(seller_id).await?;
        stats.refresh_rates();

        self.repo.upsert_seller_stats(&stats).await?;
        info!(seller = %seller_id, "Recomputed seller stats from history");
        Ok(stats)
    }
}
