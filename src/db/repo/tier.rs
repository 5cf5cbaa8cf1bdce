//! Tier evaluation log operations.

use super::{fmt_date, fmt_datetime, parse_date, parse_datetime, parse_tier, Repository};
use crate::domain::{SellerId, TierEvaluationLog};
use sqlx::Row;

impl Repository {
    /// Append one evaluation row; returns the assigned row id.
    pub async fn insert_tier_evaluation(
        &self,
        log: &TierEvaluationLog,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO tier_evaluations
            (seller_id, evaluated_at, period_start, period_end, previous_tier, new_tier,
             monthly_orders, rto_percent, reason, auto_upgrade, triggered_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.seller_id.as_str())
        .bind(fmt_datetime(log.evaluated_at))
        .bind(fmt_date(log.period_start))
        .bind(fmt_date(log.period_end))
        .bind(log.previous_tier.as_str())
        .bind(log.new_tier.as_str())
        .bind(log.monthly_orders)
        .bind(log.rto_percent)
        .bind(&log.reason)
        .bind(log.auto_upgrade as i64)
        .bind(&log.triggered_by)
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Evaluation history for a seller, newest first.
    pub async fn query_tier_evaluations(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<TierEvaluationLog>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tier_evaluations
            WHERE seller_id = ?
            ORDER BY evaluated_at DESC, id DESC
            "#,
        )
        .bind(seller_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|r| TierEvaluationLog {
                id: r.get("id"),
                seller_id: SellerId::new(r.get::<String, _>("seller_id")),
                evaluated_at: parse_datetime(
                    &r.get::<String, _>("evaluated_at"),
                    "tier_evaluations.evaluated_at",
                ),
                period_start: parse_date(
                    &r.get::<String, _>("period_start"),
                    "tier_evaluations.period_start",
                ),
                period_end: parse_date(
                    &r.get::<String, _>("period_end"),
                    "tier_evaluations.period_end",
                ),
                previous_tier: parse_tier(&r.get::<String, _>("previous_tier")),
                new_tier: parse_tier(&r.get::<String, _>("new_tier")),
                monthly_orders: r.get("monthly_orders"),
                rto_percent: r.get("rto_percent"),
                reason: r.get("reason"),
                auto_upgrade: r.get::<i64, _>("auto_upgrade") != 0,
                triggered_by: r.get("triggered_by"),
            })
            .collect())
    }
}
