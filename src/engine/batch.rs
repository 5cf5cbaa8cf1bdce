//! Settlement batch processor: promotes due batches from pending to
//! available funds.
//!
//! Batches are processed independently; one batch failing is recorded on
//! that batch and never blocks or rolls back its siblings.

use crate::db::repo::NewLedgerEntry;
use crate::db::Repository;
use crate::domain::{ActorRef, EntryType, Money, ScheduleStatus, SellerId, SettlementSchedule};
use crate::engine::{LedgerWriter, StatsEngine};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-batch result of one processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub seller_id: SellerId,
    pub status: ScheduleStatus,
    pub total_amount: Money,
    pub orders_settled: usize,
    pub failure_reason: Option<String>,
}

pub struct BatchProcessor {
    repo: Arc<Repository>,
    ledger: Arc<LedgerWriter>,
    stats: Arc<StatsEngine>,
}

impl BatchProcessor {
    pub fn new(repo: Arc<Repository>, ledger: Arc<LedgerWriter>, stats: Arc<StatsEngine>) -> Self {
        Self { repo, ledger, stats }
    }

    /// Process every batch due at `now`. Returns one outcome per batch that
    /// this run claimed; batches claimed by a concurrent run are skipped.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<Vec<BatchOutcome>, AppError> {
        let today = now.date_naive();
        let due = self.repo.due_schedules(today).await?;
        if due.is_empty() {
            debug!(date = %today, "No settlement batches due");
            return Ok(Vec::new());
        }

        info!(count = due.len(), date = %today, "Processing due settlement batches");

        let outcomes = join_all(
            due.into_iter()
                .map(|schedule| self.process_batch(schedule, now)),
        )
        .await;

        Ok(outcomes.into_iter().flatten().collect())
    }

    /// Process one claimed batch; errors inside become a failed outcome.
    async fn process_batch(
        &self,
        schedule: SettlementSchedule,
        now: DateTime<Utc>,
    ) -> Option<BatchOutcome> {
        // Exclusive scheduled->processing claim; losing it means another
        // worker owns this batch.
        match self.repo.claim_schedule(&schedule.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(batch = %schedule.id, "Batch already claimed, skipping");
                return None;
            }
            Err(e) => {
                warn!(batch = %schedule.id, error = %e, "Failed to claim batch");
                return None;
            }
        }

        match self.settle_batch(&schedule, now).await {
            Ok(orders_settled) => {
                info!(
                    batch = %schedule.id,
                    seller = %schedule.seller_id,
                    total = %schedule.total_amount,
                    orders = orders_settled,
                    "Settlement batch completed"
                );
                Some(BatchOutcome {
                    batch_id: schedule.id.clone(),
                    seller_id: schedule.seller_id.clone(),
                    status: ScheduleStatus::Completed,
                    total_amount: schedule.total_amount,
                    orders_settled,
                    failure_reason: None,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(batch = %schedule.id, error = %reason, "Settlement batch failed");
                if let Err(mark_err) = self.repo.fail_schedule(&schedule.id, &reason).await {
                    warn!(batch = %schedule.id, error = %mark_err, "Failed to record batch failure");
                }
                Some(BatchOutcome {
                    batch_id: schedule.id.clone(),
                    seller_id: schedule.seller_id.clone(),
                    status: ScheduleStatus::Failed,
                    total_amount: schedule.total_amount,
                    orders_settled: 0,
                    failure_reason: Some(reason),
                })
            }
        }
    }

    async fn settle_batch(
        &self,
        schedule: &SettlementSchedule,
        now: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let mut orders_settled = 0;

        // An empty batch (opened but never fed) completes with no ledger
        // movement.
        if !schedule.order_ids.is_empty() {
            self.ledger
                .append(
                    NewLedgerEntry {
                        actor: ActorRef::seller(&schedule.seller_id),
                        entry_type: EntryType::Settlement,
                        amount: schedule.total_amount,
                        description: format!(
                            "Settlement of {} orders matured {}",
                            schedule.order_ids.len(),
                            schedule.settlement_date
                        ),
                        order_id: None,
                        batch_id: Some(schedule.id.clone()),
                        source: format!("batch:{}", schedule.id),
                    },
                    now,
                )
                .await?;

            orders_settled = self.repo.mark_batch_orders_settled(&schedule.id).await? as usize;
        }

        self.repo.complete_schedule(&schedule.id, now).await?;

        let next_date = self.repo.next_settlement_date(&schedule.seller_id).await?;
        self.stats
            .apply_batch_settled(
                &schedule.seller_id,
                schedule.tier_at_creation,
                schedule.total_amount,
                next_date,
            )
            .await?;

        Ok(orders_settled)
    }
}
