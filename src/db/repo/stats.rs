//! Seller aggregate cache operations.

use super::{fmt_date, parse_date, parse_money, parse_tier, Repository};
use crate::domain::{SellerId, SellerStats};
use sqlx::Row;

impl Repository {
    pub async fn get_seller_stats(
        &self,
        seller_id: &SellerId,
    ) -> Result<Option<SellerStats>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM seller_stats WHERE seller_id = ?")
            .bind(seller_id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| map_stats_row(&r)))
    }

    /// Write the full aggregate row, replacing any prior value.
    ///
    /// Callers hold the authoritative fold (incremental or recomputed);
    /// the cache itself carries no derivation logic.
    pub async fn upsert_seller_stats(&self, stats: &SellerStats) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO seller_stats
            (seller_id, current_tier, total_orders, delivered_orders, rto_orders,
             cancelled_orders, gross_revenue, shipping_cost, platform_fees, total_settled,
             pending_settlement, available_for_withdrawal, total_cod_collected,
             pending_cod_remittance, rto_percent, delivery_success_rate, next_settlement_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(seller_id) DO UPDATE SET
                current_tier = excluded.current_tier,
                total_orders = excluded.total_orders,
                delivered_orders = excluded.delivered_orders,
                rto_orders = excluded.rto_orders,
                cancelled_orders = excluded.cancelled_orders,
                gross_revenue = excluded.gross_revenue,
                shipping_cost = excluded.shipping_cost,
                platform_fees = excluded.platform_fees,
                total_settled = excluded.total_settled,
                pending_settlement = excluded.pending_settlement,
                available_for_withdrawal = excluded.available_for_withdrawal,
                total_cod_collected = excluded.total_cod_collected,
                pending_cod_remittance = excluded.pending_cod_remittance,
                rto_percent = excluded.rto_percent,
                delivery_success_rate = excluded.delivery_success_rate,
                next_settlement_date = excluded.next_settlement_date
            "#,
        )
        .bind(stats.seller_id.as_str())
        .bind(stats.current_tier.as_str())
        .bind(stats.total_orders)
        .bind(stats.delivered_orders)
        .bind(stats.rto_orders)
        .bind(stats.cancelled_orders)
        .bind(stats.gross_revenue.to_canonical_string())
        .bind(stats.shipping_cost.to_canonical_string())
        .bind(stats.platform_fees.to_canonical_string())
        .bind(stats.total_settled.to_canonical_string())
        .bind(stats.pending_settlement.to_canonical_string())
        .bind(stats.available_for_withdrawal.to_canonical_string())
        .bind(stats.total_cod_collected.to_canonical_string())
        .bind(stats.pending_cod_remittance.to_canonical_string())
        .bind(stats.rto_percent)
        .bind(stats.delivery_success_rate)
        .bind(stats.next_settlement_date.map(fmt_date))
        .execute(self.pool())
        .await?;

        Ok(())
    }
}

fn map_stats_row(row: &sqlx::sqlite::SqliteRow) -> SellerStats {
    SellerStats {
        seller_id: SellerId::new(row.get::<String, _>("seller_id")),
        current_tier: parse_tier(&row.get::<String, _>("current_tier")),
        total_orders: row.get("total_orders"),
        delivered_orders: row.get("delivered_orders"),
        rto_orders: row.get("rto_orders"),
        cancelled_orders: row.get("cancelled_orders"),
        gross_revenue: parse_money(
            &row.get::<String, _>("gross_revenue"),
            "seller_stats.gross_revenue",
        ),
        shipping_cost: parse_money(
            &row.get::<String, _>("shipping_cost"),
            "seller_stats.shipping_cost",
        ),
        platform_fees: parse_money(
            &row.get::<String, _>("platform_fees"),
            "seller_stats.platform_fees",
        ),
        total_settled: parse_money(
            &row.get::<String, _>("total_settled"),
            "seller_stats.total_settled",
        ),
        pending_settlement: parse_money(
            &row.get::<String, _>("pending_settlement"),
            "seller_stats.pending_settlement",
        ),
        available_for_withdrawal: parse_money(
            &row.get::<String, _>("available_for_withdrawal"),
            "seller_stats.available_for_withdrawal",
        ),
        total_cod_collected: parse_money(
            &row.get::<String, _>("total_cod_collected"),
            "seller_stats.total_cod_collected",
        ),
        pending_cod_remittance: parse_money(
            &row.get::<String, _>("pending_cod_remittance"),
            "seller_stats.pending_cod_remittance",
        ),
        rto_percent: row.get("rto_percent"),
        delivery_success_rate: row.get("delivery_success_rate"),
        next_settlement_date: row
            .get::<Option<String>, _>("next_settlement_date")
            .map(|s| parse_date(&s, "seller_stats.next_settlement_date")),
    }
}
