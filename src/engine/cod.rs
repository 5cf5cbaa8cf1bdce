//! COD reconciliation: records cash collected at the door and tracks its
//! remittance back to the platform.

use crate::db::Repository;
use crate::domain::{
    compute_cod_settlement, CodCollection, Money, OrderId, PartnerId, PaymentMode,
    RemittanceStatus,
};
use crate::engine::StatsEngine;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

pub struct CodReconciler {
    repo: Arc<Repository>,
    stats: Arc<StatsEngine>,
    handling_fee_pct: Money,
    platform_fee_pct: Money,
}

impl CodReconciler {
    pub fn new(
        repo: Arc<Repository>,
        stats: Arc<StatsEngine>,
        handling_fee_pct: Money,
        platform_fee_pct: Money,
    ) -> Self {
        Self {
            repo,
            stats,
            handling_fee_pct,
            platform_fee_pct,
        }
    }

    /// Record a partner's report of cash collected for a COD order.
    ///
    /// Independent of the seller-earning path: this tracks the physical
    /// cash, while the settlement ledger tracks the platform's own
    /// order-value accounting.
    pub async fn record_collection(
        &self,
        order_id: &OrderId,
        partner_id: &PartnerId,
        collected_amount: Money,
        now: DateTime<Utc>,
    ) -> Result<CodCollection, AppError> {
        if !collected_amount.is_positive() {
            return Err(AppError::Validation(
                "collected amount must be positive".to_string(),
            ));
        }

        let order = self
            .repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

        if order.payment_mode != PaymentMode::Cod {
            return Err(AppError::Validation(format!(
                "order {} is not cash-on-delivery",
                order_id
            )));
        }

        self.repo
            .get_partner(partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("partner {} not found", partner_id)))?;

        // The order may not be scheduled yet; fall back to the configured
        // fee rate when the stamped fee is absent.
        let platform_fee = order
            .platform_fee
            .unwrap_or_else(|| order.order_value.percent(self.platform_fee_pct));

        let (cod_handling_fee, net_settlement) = compute_cod_settlement(
            collected_amount,
            order.shipping_cost,
            platform_fee,
            self.handling_fee_pct,
        );

        let collection = CodCollection {
            order_id: order_id.clone(),
            seller_id: order.seller_id.clone(),
            partner_id: partner_id.clone(),
            cod_amount: order.cod_amount,
            collected_amount,
            shipping_charge: order.shipping_cost,
            platform_fee,
            cod_handling_fee,
            net_settlement,
            remittance_status: RemittanceStatus::Collected,
            collected_at: now,
            remitted_at: None,
        };

        let inserted = self.repo.insert_cod_collection(&collection).await?;
        if !inserted {
            return Err(AppError::Conflict(format!(
                "COD collection already recorded for order {}",
                order_id
            )));
        }

        let seller = self.repo.get_seller(&order.seller_id).await?;
        let tier = seller.map(|s| s.tier).unwrap_or(crate::domain::Tier::Bronze);
        self.stats
            .apply_cod_collected(&order.seller_id, tier, collected_amount)
            .await?;

        info!(
            order = %order_id,
            partner = %partner_id,
            collected = %collected_amount,
            net = %net_settlement,
            "COD collection recorded"
        );

        Ok(collection)
    }

    /// Mark a collection's cash as remitted to the platform.
    pub async fn mark_remitted(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<CodCollection, AppError> {
        let collection = self
            .repo
            .get_cod_collection(order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no COD collection for order {}", order_id))
            })?;

        let updated = self.repo.mark_cod_remitted(order_id, now).await?;
        if !updated {
            return Err(AppError::Conflict(format!(
                "COD collection for order {} already remitted",
                order_id
            )));
        }

        let seller = self.repo.get_seller(&collection.seller_id).await?;
        let tier = seller.map(|s| s.tier).unwrap_or(crate::domain::Tier::Bronze);
        self.stats
            .apply_cod_remitted(&collection.seller_id, tier, collection.collected_amount)
            .await?;

        info!(order = %order_id, "COD cash remitted");

        self.repo
            .get_cod_collection(order_id)
            .await?
            .ok_or_else(|| AppError::Internal("collection vanished after remit".to_string()))
    }
}
