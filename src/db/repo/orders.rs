//! Order projection operations.

use super::{fmt_date, fmt_datetime, parse_date, parse_datetime, parse_money, Repository};
use crate::domain::{
    Money, Order, OrderId, OrderStatus, PartnerId, PaymentMode, SellerId, SettlementStatus,
    TierMetrics,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

impl Repository {
    /// Insert an order projection idempotently. Returns true when newly
    /// inserted.
    pub async fn insert_order(&self, order: &Order) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders
            (order_id, seller_id, partner_id, payment_mode, order_value, shipping_cost,
             cod_amount, distance_km, status, delivered_at, settlement_status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(order_id) DO NOTHING
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.seller_id.as_str())
        .bind(order.partner_id.as_ref().map(|p| p.as_str()))
        .bind(order.payment_mode.as_str())
        .bind(order.order_value.to_canonical_string())
        .bind(order.shipping_cost.to_canonical_string())
        .bind(order.cod_amount.to_canonical_string())
        .bind(order.distance_km.to_canonical_string())
        .bind(order.status.as_str())
        .bind(order.delivered_at.map(fmt_datetime))
        .bind(order.settlement_status.as_str())
        .bind(fmt_datetime(order.created_at))
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = ?")
            .bind(order_id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| map_order_row(&r)))
    }

    /// Record a delivery-state change coming in from the platform.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?, delivered_at = COALESCE(?, delivered_at)
            WHERE order_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(delivered_at.map(fmt_datetime))
        .bind(order_id.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp the settlement outcome on a just-scheduled order.
    ///
    /// Conditional on the order still being unscheduled; the scheduler uses
    /// the affected-row count as its duplicate-trigger guard.
    pub async fn stamp_order_scheduled(
        &self,
        order_id: &OrderId,
        platform_fee: Money,
        seller_earning: Money,
        settlement_date: chrono::NaiveDate,
        batch_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET settlement_status = 'scheduled', platform_fee = ?, seller_earning = ?,
                settlement_date = ?, batch_id = ?
            WHERE order_id = ? AND settlement_status = 'unscheduled'
            "#,
        )
        .bind(platform_fee.to_canonical_string())
        .bind(seller_earning.to_canonical_string())
        .bind(fmt_date(settlement_date))
        .bind(batch_id)
        .bind(order_id.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bulk-mark a completed batch's member orders as settled.
    pub async fn mark_batch_orders_settled(&self, batch_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET settlement_status = 'settled'
            WHERE batch_id = ? AND settlement_status = 'scheduled'
            "#,
        )
        .bind(batch_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Trailing-window order counts for tier evaluation.
    pub async fn seller_window_metrics(
        &self,
        seller_id: &SellerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TierMetrics, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as orders,
                SUM(CASE WHEN status = 'delivered' THEN 1 ELSE 0 END) as delivered,
                SUM(CASE WHEN status = 'rto' THEN 1 ELSE 0 END) as rto,
                SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END) as cancelled
            FROM orders
            WHERE seller_id = ? AND created_at >= ? AND created_at < ?
            "#,
        )
        .bind(seller_id.as_str())
        .bind(fmt_datetime(from))
        .bind(fmt_datetime(to))
        .fetch_one(self.pool())
        .await?;

        Ok(TierMetrics {
            orders: row.get::<i64, _>("orders"),
            delivered: row.get::<Option<i64>, _>("delivered").unwrap_or(0),
            rto: row.get::<Option<i64>, _>("rto").unwrap_or(0),
            cancelled: row.get::<Option<i64>, _>("cancelled").unwrap_or(0),
        })
    }

    /// All orders for one seller, oldest first. Feeds the stats recompute
    /// fold, which sums decimals in Rust to avoid REAL aggregation.
    pub async fn query_seller_orders(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<Order>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE seller_id = ? ORDER BY created_at ASC, order_id ASC",
        )
        .bind(seller_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_order_row).collect())
    }
}

fn map_order_row(row: &sqlx::sqlite::SqliteRow) -> Order {
    let status_str: String = row.get("status");
    let status = OrderStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(value = %status_str, "Unknown order status in database, defaulting to created");
        OrderStatus::Created
    });
    let mode_str: String = row.get("payment_mode");
    let payment_mode = PaymentMode::parse(&mode_str).unwrap_or_else(|| {
        warn!(value = %mode_str, "Unknown payment mode in database, defaulting to prepaid");
        PaymentMode::Prepaid
    });
    let settle_str: String = row.get("settlement_status");
    let settlement_status = SettlementStatus::parse(&settle_str).unwrap_or_else(|| {
        warn!(value = %settle_str, "Unknown settlement status in database, defaulting to unscheduled");
        SettlementStatus::Unscheduled
    });

    Order {
        order_id: OrderId::new(row.get::<String, _>("order_id")),
        seller_id: SellerId::new(row.get::<String, _>("seller_id")),
        partner_id: row
            .get::<Option<String>, _>("partner_id")
            .map(PartnerId::new),
        payment_mode,
        order_value: parse_money(&row.get::<String, _>("order_value"), "orders.order_value"),
        shipping_cost: parse_money(
            &row.get::<String, _>("shipping_cost"),
            "orders.shipping_cost",
        ),
        cod_amount: parse_money(&row.get::<String, _>("cod_amount"), "orders.cod_amount"),
        distance_km: parse_money(&row.get::<String, _>("distance_km"), "orders.distance_km"),
        status,
        delivered_at: row
            .get::<Option<String>, _>("delivered_at")
            .map(|s| parse_datetime(&s, "orders.delivered_at")),
        settlement_status,
        settlement_date: row
            .get::<Option<String>, _>("settlement_date")
            .map(|s| parse_date(&s, "orders.settlement_date")),
        platform_fee: row
            .get::<Option<String>, _>("platform_fee")
            .map(|s| parse_money(&s, "orders.platform_fee")),
        seller_earning: row
            .get::<Option<String>, _>("seller_earning")
            .map(|s| parse_money(&s, "orders.seller_earning")),
        batch_id: row.get("batch_id"),
        created_at: parse_datetime(&row.get::<String, _>("created_at"), "orders.created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::setup_test_db;
    use super::*;
    use crate::domain::Tier;

    pub(crate) fn sample_order(order_id: &str, seller_id: &str) -> Order {
        Order {
            order_id: OrderId::new(order_id),
            seller_id: SellerId::new(seller_id),
            partner_id: Some(PartnerId::new("p-1")),
            payment_mode: PaymentMode::Prepaid,
            order_value: Money::from_i64(1000),
            shipping_cost: Money::from_i64(150),
            cod_amount: Money::zero(),
            distance_km: Money::from_i64(12),
            status: OrderStatus::Created,
            delivered_at: None,
            settlement_status: SettlementStatus::Unscheduled,
            settlement_date: None,
            platform_fee: None,
            seller_earning: None,
            batch_id: None,
            created_at: Utc::now(),
        }
    }

    async fn seed(repo: &Repository, order: &Order) {
        repo.insert_seller(&order.seller_id, Tier::Bronze, Utc::now())
            .await
            .unwrap();
        if let Some(p) = &order.partner_id {
            repo.insert_partner(p, Utc::now()).await.unwrap();
        }
        assert!(repo.insert_order(order).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_and_get_order() {
        let (repo, _temp) = setup_test_db().await;
        let order = sample_order("o-1", "s-1");
        seed(&repo, &order).await;

        let loaded = repo.get_order(&order.order_id).await.unwrap().unwrap();
        assert_eq!(loaded.order_value, Money::from_i64(1000));
        assert_eq!(loaded.settlement_status, SettlementStatus::Unscheduled);

        // duplicate insert is a no-op
        assert!(!repo.insert_order(&order).await.unwrap());
    }

    #[tokio::test]
    async fn test_stamp_order_scheduled_is_exclusive() {
        let (repo, _temp) = setup_test_db().await;
        let order = sample_order("o-1", "s-1");
        seed(&repo, &order).await;

        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let first = repo
            .stamp_order_scheduled(
                &order.order_id,
                Money::from_i64(50),
                Money::from_i64(800),
                date,
                "b-1",
            )
            .await
            .unwrap();
        let second = repo
            .stamp_order_scheduled(
                &order.order_id,
                Money::from_i64(50),
                Money::from_i64(800),
                date,
                "b-2",
            )
            .await
            .unwrap();

        assert!(first);
        assert!(!second, "second stamp must not win");

        let loaded = repo.get_order(&order.order_id).await.unwrap().unwrap();
        assert_eq!(loaded.batch_id.as_deref(), Some("b-1"));
        assert_eq!(loaded.seller_earning, Some(Money::from_i64(800)));
    }

    #[tokio::test]
    async fn test_window_metrics_counts_by_status() {
        let (repo, _temp) = setup_test_db().await;
        let now = Utc::now();

        for (id, status) in [
            ("o-1", OrderStatus::Delivered),
            ("o-2", OrderStatus::Delivered),
            ("o-3", OrderStatus::Rto),
            ("o-4", OrderStatus::Cancelled),
        ] {
            let order = sample_order(id, "s-1");
            seed(&repo, &order).await;
            repo.update_order_status(&order.order_id, status, Some(now))
                .await
                .unwrap();
        }

        let metrics = repo
            .seller_window_metrics(
                &SellerId::new("s-1"),
                now - chrono::Duration::days(30),
                now + chrono::Duration::days(1),
            )
            .await
            .unwrap();

        assert_eq!(metrics.orders, 4);
        assert_eq!(metrics.delivered, 2);
        assert_eq!(metrics.rto, 1);
        assert_eq!(metrics.cancelled, 1);
    }

    #[tokio::test]
    async fn test_mark_batch_orders_settled() {
        let (repo, _temp) = setup_test_db().await;
        let o1 = sample_order("o-1", "s-1");
        let o2 = sample_order("o-2", "s-1");
        seed(&repo, &o1).await;
        seed(&repo, &o2).await;

        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        for o in [&o1, &o2] {
            repo.stamp_order_scheduled(
                &o.order_id,
                Money::from_i64(50),
                Money::from_i64(800),
                date,
                "b-1",
            )
            .await
            .unwrap();
        }

        let updated = repo.mark_batch_orders_settled("b-1").await.unwrap();
        assert_eq!(updated, 2);

        let loaded = repo.get_order(&o1.order_id).await.unwrap().unwrap();
        assert_eq!(loaded.settlement_status, SettlementStatus::Settled);
    }
}
