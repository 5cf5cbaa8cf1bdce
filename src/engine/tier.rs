//! Tier evaluator: trailing-month metrics drive the upgrade/downgrade
//! pipeline, and every run is logged whether or not the tier moved.

use crate::db::Repository;
use crate::domain::{evaluate_tier, SellerId, Tier, TierEvaluationLog};
use crate::engine::StatsEngine;
use crate::error::AppError;
use chrono::{DateTime, Months, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct TierEvaluator {
    repo: Arc<Repository>,
    stats: Arc<StatsEngine>,
}

impl TierEvaluator {
    pub fn new(repo: Arc<Repository>, stats: Arc<StatsEngine>) -> Self {
        Self { repo, stats }
    }

    /// Evaluate one seller over the trailing month ending at `now`.
    ///
    /// Orders already batched keep the tier recorded at batch creation;
    /// only future settlements see a changed tier.
    pub async fn evaluate_seller(
        &self,
        seller_id: &SellerId,
        now: DateTime<Utc>,
        triggered_by: &str,
    ) -> Result<TierEvaluationLog, AppError> {
        let seller = self
            .repo
            .get_seller(seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("seller {} not found", seller_id)))?;

        let window_start = now
            .checked_sub_months(Months::new(1))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let metrics = self
            .repo
            .seller_window_metrics(seller_id, window_start, now)
            .await?;

        let previous_tier = seller.tier;
        let new_tier = evaluate_tier(previous_tier, &metrics);
        let auto_upgrade = new_tier > previous_tier;

        let reason = if new_tier > previous_tier {
            format!(
                "upgraded on {} orders at {:.1}% RTO",
                metrics.orders,
                metrics.rto_percent()
            )
        } else if new_tier < previous_tier {
            format!(
                "downgraded on {} orders at {:.1}% RTO",
                metrics.orders,
                metrics.rto_percent()
            )
        } else {
            format!(
                "unchanged on {} orders at {:.1}% RTO",
                metrics.orders,
                metrics.rto_percent()
            )
        };

        let mut log = TierEvaluationLog {
            id: 0,
            seller_id: seller_id.clone(),
            evaluated_at: now,
            period_start: window_start.date_naive(),
            period_end: now.date_naive(),
            previous_tier,
            new_tier,
            monthly_orders: metrics.orders,
            rto_percent: metrics.rto_percent(),
            reason,
            auto_upgrade,
            triggered_by: triggered_by.to_string(),
        };
        log.id = self.repo.insert_tier_evaluation(&log).await?;

        if new_tier != previous_tier {
            self.repo.update_seller_tier(seller_id, new_tier, now).await?;
            self.stats.apply_tier_change(seller_id, new_tier).await?;
            info!(
                seller = %seller_id,
                from = %previous_tier,
                to = %new_tier,
                orders = metrics.orders,
                "Seller tier changed"
            );
        }

        Ok(log)
    }

    /// Evaluate every active seller; per-seller failures are logged and do
    /// not stop the sweep.
    pub async fn evaluate_all(
        &self,
        now: DateTime<Utc>,
        triggered_by: &str,
    ) -> Result<Vec<TierEvaluationLog>, AppError> {
        let seller_ids = self.repo.list_seller_ids().await?;
        let mut logs = Vec::with_capacity(seller_ids.len());

        for seller_id in seller_ids {
            match self.evaluate_seller(&seller_id, now, triggered_by).await {
                Ok(log) => logs.push(log),
                Err(e) => {
                    warn!(seller = %seller_id, error = %e, "Tier evaluation failed for seller");
                }
            }
        }

        info!(evaluated = logs.len(), "Tier evaluation sweep complete");
        Ok(logs)
    }

    /// Evaluation history for one seller, newest first.
    pub async fn history(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<TierEvaluationLog>, AppError> {
        self.repo
            .get_seller(seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("seller {} not found", seller_id)))?;
        Ok(self.repo.query_tier_evaluations(seller_id).await?)
    }

    /// Current tier shortcut used by intake paths.
    pub async fn current_tier(&self, seller_id: &SellerId) -> Result<Tier, AppError> {
        Ok(self
            .repo
            .get_seller(seller_id)
            .await?
            .map(|s| s.tier)
            .unwrap_or(Tier::Bronze))
    }
}
