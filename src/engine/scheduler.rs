//! Settlement scheduler: turns a delivery confirmation into an earning
//! entry and a batched settlement schedule.

use crate::db::repo::NewLedgerEntry;
use crate::db::Repository;
use crate::domain::{
    settlement_date_for, ActorRef, EntryType, Money, OrderId, OrderStatus, ScheduleStatus,
    SettlementSchedule, SettlementStatus, Tier,
};
use crate::engine::{LedgerWriter, StatsEngine};
use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

/// Outcome of scheduling one delivered order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledSettlement {
    pub order_id: OrderId,
    pub batch_id: String,
    pub platform_fee: Money,
    pub seller_earning: Money,
    pub settlement_date: NaiveDate,
    pub tier: Tier,
}

pub struct SettlementScheduler {
    repo: Arc<Repository>,
    ledger: Arc<LedgerWriter>,
    stats: Arc<StatsEngine>,
    platform_fee_pct: Money,
}

impl SettlementScheduler {
    pub fn new(
        repo: Arc<Repository>,
        ledger: Arc<LedgerWriter>,
        stats: Arc<StatsEngine>,
        platform_fee_pct: Money,
    ) -> Self {
        Self {
            repo,
            ledger,
            stats,
            platform_fee_pct,
        }
    }

    /// Schedule settlement for an order that just became delivered.
    ///
    /// Idempotent at every layer: the precondition check, the conditional
    /// order stamp, and the ledger entry key all reject a re-trigger with
    /// `Conflict` rather than duplicating the earning.
    pub async fn schedule_on_delivery(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<ScheduledSettlement, AppError> {
        let order = self
            .repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

        if order.status != OrderStatus::Delivered {
            return Err(AppError::Conflict(format!(
                "order {} is not delivered (status {})",
                order_id,
                order.status.as_str()
            )));
        }
        match order.settlement_status {
            SettlementStatus::Unscheduled => {}
            SettlementStatus::Scheduled | SettlementStatus::Settled => {
                return Err(AppError::Conflict(format!(
                    "order {} settlement already {}",
                    order_id,
                    order.settlement_status.as_str()
                )));
            }
        }

        let seller = self
            .repo
            .get_seller(&order.seller_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("seller {} not found", order.seller_id))
            })?;

        let platform_fee = order.order_value.percent(self.platform_fee_pct);
        let seller_earning = (order.order_value - order.shipping_cost - platform_fee)
            .round2()
            .floor_zero();

        let delivered_date = order.delivered_at.unwrap_or(now).date_naive();
        let settlement_date = settlement_date_for(seller.tier, delivered_date);

        let schedule = self
            .find_or_create_schedule(&order.seller_id, seller.tier, settlement_date, now)
            .await?;

        // The conditional stamp is the duplicate-trigger gate: exactly one
        // invocation can move the order out of unscheduled.
        let stamped = self
            .repo
            .stamp_order_scheduled(
                order_id,
                platform_fee,
                seller_earning,
                settlement_date,
                &schedule.id,
            )
            .await?;
        if !stamped {
            return Err(AppError::Conflict(format!(
                "order {} was scheduled concurrently",
                order_id
            )));
        }

        self.ledger
            .append(
                NewLedgerEntry {
                    actor: ActorRef::seller(&order.seller_id),
                    entry_type: EntryType::Earning,
                    amount: seller_earning,
                    description: format!("Earning for delivered order {}", order_id),
                    order_id: Some(order_id.clone()),
                    batch_id: Some(schedule.id.clone()),
                    source: format!("order:{}", order_id),
                },
                now,
            )
            .await?;

        self.repo
            .append_order_to_schedule(&schedule.id, order_id, seller_earning)
            .await?;

        let next_date = self.repo.next_settlement_date(&order.seller_id).await?;
        self.stats
            .apply_settlement_scheduled(
                &order.seller_id,
                seller.tier,
                order.order_value,
                order.shipping_cost,
                platform_fee,
                seller_earning,
                next_date,
            )
            .await?;

        info!(
            order = %order_id,
            seller = %order.seller_id,
            batch = %schedule.id,
            earning = %seller_earning,
            settlement_date = %settlement_date,
            "Order scheduled for settlement"
        );

        Ok(ScheduledSettlement {
            order_id: order_id.clone(),
            batch_id: schedule.id,
            platform_fee,
            seller_earning,
            settlement_date,
            tier: seller.tier,
        })
    }

    /// The open batch for (seller, date), created on first use.
    ///
    /// A concurrent create loses to the partial unique index and falls back
    /// to the winner's row.
    async fn find_or_create_schedule(
        &self,
        seller_id: &crate::domain::SellerId,
        tier: Tier,
        settlement_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<SettlementSchedule, AppError> {
        if let Some(existing) = self
            .repo
            .find_open_schedule(seller_id, settlement_date)
            .await?
        {
            return Ok(existing);
        }

        let schedule = SettlementSchedule {
            id: uuid::Uuid::new_v4().to_string(),
            seller_id: seller_id.clone(),
            tier_at_creation: tier,
            order_ids: Vec::new(),
            total_amount: Money::zero(),
            settlement_date,
            status: ScheduleStatus::Scheduled,
            on_hold: false,
            failure_reason: None,
            processed_at: None,
            created_at: now,
        };

        match self.repo.insert_schedule(&schedule).await {
            Ok(()) => Ok(schedule),
            Err(e) => {
                // Lost a concurrent create; the open batch must now exist.
                if let Some(existing) = self
                    .repo
                    .find_open_schedule(seller_id, settlement_date)
                    .await?
                {
                    Ok(existing)
                } else {
                    Err(e.into())
                }
            }
        }
    }
}
