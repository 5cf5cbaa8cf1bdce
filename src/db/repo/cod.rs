//! COD collection operations.

use super::{fmt_datetime, parse_datetime, parse_money, Repository};
use crate::domain::{CodCollection, OrderId, PartnerId, RemittanceStatus, SellerId};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

impl Repository {
    /// Insert a collection idempotently; one collection per order. Returns
    /// false when the order already has one.
    pub async fn insert_cod_collection(
        &self,
        collection: &CodCollection,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO cod_collections
            (order_id, seller_id, partner_id, cod_amount, collected_amount, shipping_charge,
             platform_fee, cod_handling_fee, net_settlement, remittance_status, collected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(order_id) DO NOTHING
            "#,
        )
        .bind(collection.order_id.as_str())
        .bind(collection.seller_id.as_str())
        .bind(collection.partner_id.as_str())
        .bind(collection.cod_amount.to_canonical_string())
        .bind(collection.collected_amount.to_canonical_string())
        .bind(collection.shipping_charge.to_canonical_string())
        .bind(collection.platform_fee.to_canonical_string())
        .bind(collection.cod_handling_fee.to_canonical_string())
        .bind(collection.net_settlement.to_canonical_string())
        .bind(collection.remittance_status.as_str())
        .bind(fmt_datetime(collection.collected_at))
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_cod_collection(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<CodCollection>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM cod_collections WHERE order_id = ?")
            .bind(order_id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| map_cod_row(&r)))
    }

    /// Collected -> remitted transition. Returns false when the collection
    /// is absent or already remitted.
    pub async fn mark_cod_remitted(
        &self,
        order_id: &OrderId,
        remitted_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE cod_collections
            SET remittance_status = 'remitted', remitted_at = ?
            WHERE order_id = ? AND remittance_status = 'collected'
            "#,
        )
        .bind(fmt_datetime(remitted_at))
        .bind(order_id.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All collections for a seller, oldest first. Feeds the stats
    /// recompute fold.
    pub async fn query_seller_cod_collections(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<CodCollection>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM cod_collections WHERE seller_id = ? ORDER BY collected_at ASC, order_id ASC",
        )
        .bind(seller_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_cod_row).collect())
    }
}

fn map_cod_row(row: &sqlx::sqlite::SqliteRow) -> CodCollection {
    let status_str: String = row.get("remittance_status");
    let remittance_status = RemittanceStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(value = %status_str, "Unknown remittance status in database, defaulting to collected");
        RemittanceStatus::Collected
    });

    CodCollection {
        order_id: OrderId::new(row.get::<String, _>("order_id")),
        seller_id: SellerId::new(row.get::<String, _>("seller_id")),
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        cod_amount: parse_money(&row.get::<String, _>("cod_amount"), "cod_collections.cod_amount"),
        collected_amount: parse_money(
            &row.get::<String, _>("collected_amount"),
            "cod_collections.collected_amount",
        ),
        shipping_charge: parse_money(
            &row.get::<String, _>("shipping_charge"),
            "cod_collections.shipping_charge",
        ),
        platform_fee: parse_money(
            &row.get::<String, _>("platform_fee"),
            "cod_collections.platform_fee",
        ),
        cod_handling_fee: parse_money(
            &row.get::<String, _>("cod_handling_fee"),
            "cod_collections.cod_handling_fee",
        ),
        net_settlement: parse_money(
            &row.get::<String, _>("net_settlement"),
            "cod_collections.net_settlement",
        ),
        remittance_status,
        collected_at: parse_datetime(
            &row.get::<String, _>("collected_at"),
            "cod_collections.collected_at",
        ),
        remitted_at: row
            .get::<Option<String>, _>("remitted_at")
            .map(|s| parse_datetime(&s, "cod_collections.remitted_at")),
    }
}
