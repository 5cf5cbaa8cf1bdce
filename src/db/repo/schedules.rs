//! Settlement batch lifecycle operations.

use super::{fmt_date, fmt_datetime, parse_date, parse_datetime, parse_money, parse_tier, Repository};
use crate::domain::{Money, OrderId, ScheduleStatus, SellerId, SettlementSchedule};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use tracing::warn;

impl Repository {
    /// The open (status=scheduled) batch for a seller and maturity date.
    pub async fn find_open_schedule(
        &self,
        seller_id: &SellerId,
        settlement_date: NaiveDate,
    ) -> Result<Option<SettlementSchedule>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM settlement_schedules
            WHERE seller_id = ? AND settlement_date = ? AND status = 'scheduled'
            "#,
        )
        .bind(seller_id.as_str())
        .bind(fmt_date(settlement_date))
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| map_schedule_row(&r)))
    }

    /// Open a new batch. The partial unique index on open (seller, date)
    /// pairs rejects a concurrent duplicate create.
    pub async fn insert_schedule(
        &self,
        schedule: &SettlementSchedule,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO settlement_schedules
            (id, seller_id, tier_at_creation, order_ids, total_amount, settlement_date,
             status, on_hold, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&schedule.id)
        .bind(schedule.seller_id.as_str())
        .bind(schedule.tier_at_creation.as_str())
        .bind(encode_order_ids(&schedule.order_ids))
        .bind(schedule.total_amount.to_canonical_string())
        .bind(fmt_date(schedule.settlement_date))
        .bind(schedule.status.as_str())
        .bind(schedule.on_hold as i64)
        .bind(fmt_datetime(schedule.created_at))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Append an order to an open batch and grow its total.
    ///
    /// Conditional on the batch still being open; returns false when the
    /// batch was promoted underneath the caller.
    pub async fn append_order_to_schedule(
        &self,
        schedule_id: &str,
        order_id: &OrderId,
        add_amount: Money,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            "SELECT order_ids, total_amount FROM settlement_schedules WHERE id = ? AND status = 'scheduled'",
        )
        .bind(schedule_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };

        let mut order_ids = decode_order_ids(&row.get::<String, _>("order_ids"));
        if !order_ids.iter().any(|o| o == order_id) {
            order_ids.push(order_id.clone());
        }
        let total = parse_money(
            &row.get::<String, _>("total_amount"),
            "settlement_schedules.total_amount",
        ) + add_amount;

        sqlx::query(
            "UPDATE settlement_schedules SET order_ids = ?, total_amount = ? WHERE id = ?",
        )
        .bind(encode_order_ids(&order_ids))
        .bind(total.to_canonical_string())
        .bind(schedule_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn get_schedule(
        &self,
        schedule_id: &str,
    ) -> Result<Option<SettlementSchedule>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM settlement_schedules WHERE id = ?")
            .bind(schedule_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| map_schedule_row(&r)))
    }

    /// Batches due on or before `today`, excluding held ones.
    pub async fn due_schedules(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<SettlementSchedule>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM settlement_schedules
            WHERE status = 'scheduled' AND on_hold = 0 AND settlement_date <= ?
            ORDER BY settlement_date ASC, id ASC
            "#,
        )
        .bind(fmt_date(today))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_schedule_row).collect())
    }

    /// Exclusive scheduled->processing claim. Exactly one concurrent caller
    /// wins; everyone else sees false.
    pub async fn claim_schedule(&self, schedule_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE settlement_schedules
            SET status = 'processing'
            WHERE id = ? AND status = 'scheduled' AND on_hold = 0
            "#,
        )
        .bind(schedule_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn complete_schedule(
        &self,
        schedule_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE settlement_schedules
            SET status = 'completed', processed_at = ?, failure_reason = NULL
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(fmt_datetime(processed_at))
        .bind(schedule_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn fail_schedule(
        &self,
        schedule_id: &str,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE settlement_schedules
            SET status = 'failed', failure_reason = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(reason)
        .bind(schedule_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Admin hold flag. Only meaningful while the batch is still open.
    pub async fn set_schedule_hold(
        &self,
        schedule_id: &str,
        on_hold: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE settlement_schedules SET on_hold = ? WHERE id = ? AND status = 'scheduled'",
        )
        .bind(on_hold as i64)
        .bind(schedule_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Admin total adjustment on an open batch.
    pub async fn adjust_schedule_amount(
        &self,
        schedule_id: &str,
        new_total: Money,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE settlement_schedules SET total_amount = ? WHERE id = ? AND status = 'scheduled'",
        )
        .bind(new_total.to_canonical_string())
        .bind(schedule_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Earliest open maturity date for a seller, for the stats cache.
    pub async fn next_settlement_date(
        &self,
        seller_id: &SellerId,
    ) -> Result<Option<NaiveDate>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT MIN(settlement_date) as next_date
            FROM settlement_schedules
            WHERE seller_id = ? AND status = 'scheduled'
            "#,
        )
        .bind(seller_id.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(row
            .get::<Option<String>, _>("next_date")
            .map(|s| parse_date(&s, "settlement_schedules.settlement_date")))
    }

    /// All batches for a seller, newest maturity first.
    pub async fn query_seller_schedules(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<SettlementSchedule>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM settlement_schedules
            WHERE seller_id = ?
            ORDER BY settlement_date DESC, id ASC
            "#,
        )
        .bind(seller_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_schedule_row).collect())
    }
}

fn encode_order_ids(order_ids: &[OrderId]) -> String {
    serde_json::to_string(&order_ids.iter().map(|o| o.as_str()).collect::<Vec<_>>())
        .unwrap_or_else(|_| "[]".to_string())
}

fn decode_order_ids(raw: &str) -> Vec<OrderId> {
    serde_json::from_str::<Vec<String>>(raw)
        .map(|ids| ids.into_iter().map(OrderId::new).collect())
        .unwrap_or_else(|e| {
            warn!(raw, error = %e, "Failed to parse schedule order_ids, using empty list");
            Vec::new()
        })
}

fn map_schedule_row(row: &sqlx::sqlite::SqliteRow) -> SettlementSchedule {
    let status_str: String = row.get("status");
    let status = ScheduleStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(value = %status_str, "Unknown schedule status in database, defaulting to scheduled");
        ScheduleStatus::Scheduled
    });

    SettlementSchedule {
        id: row.get("id"),
        seller_id: SellerId::new(row.get::<String, _>("seller_id")),
        tier_at_creation: parse_tier(&row.get::<String, _>("tier_at_creation")),
        order_ids: decode_order_ids(&row.get::<String, _>("order_ids")),
        total_amount: parse_money(
            &row.get::<String, _>("total_amount"),
            "settlement_schedules.total_amount",
        ),
        settlement_date: parse_date(
            &row.get::<String, _>("settlement_date"),
            "settlement_schedules.settlement_date",
        ),
        status,
        on_hold: row.get::<i64, _>("on_hold") != 0,
        failure_reason: row.get("failure_reason"),
        processed_at: row
            .get::<Option<String>, _>("processed_at")
            .map(|s| parse_datetime(&s, "settlement_schedules.processed_at")),
        created_at: parse_datetime(
            &row.get::<String, _>("created_at"),
            "settlement_schedules.created_at",
        ),
    }
}
