//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `orders.rs` - order projection and settlement stamps
//! - `ledger.rs` - append-only ledger entries and balance lookups
//! - `schedules.rs` - settlement batch lifecycle
//! - `stats.rs` - seller aggregate cache
//! - `cod.rs` - COD collections
//! - `withdrawals.rs` - withdrawal requests
//! - `tier.rs` - tier evaluation log
//! - `overrides.rs` - admin override audit records

mod cod;
mod ledger;
mod orders;
mod overrides;
mod schedules;
mod stats;
mod tier;
mod withdrawals;

pub use ledger::NewLedgerEntry;
pub(crate) use ledger::is_unique_violation;

use crate::domain::{
    AccountStatus, Money, Partner, PartnerId, Seller, SellerId, Tier,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Seller and partner accounts
    // =========================================================================

    /// Insert a seller if absent. Returns true when newly created.
    pub async fn insert_seller(
        &self,
        seller_id: &SellerId,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO sellers (seller_id, tier, account_status, created_at)
            VALUES (?, ?, 'active', ?)
            ON CONFLICT(seller_id) DO NOTHING
            "#,
        )
        .bind(seller_id.as_str())
        .bind(tier.as_str())
        .bind(fmt_datetime(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_seller(&self, seller_id: &SellerId) -> Result<Option<Seller>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT seller_id, tier, tier_updated_at, account_status, created_at
            FROM sellers
            WHERE seller_id = ?
            "#,
        )
        .bind(seller_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let tier_str: String = r.get("tier");
            let status_str: String = r.get("account_status");
            Seller {
                seller_id: SellerId::new(r.get::<String, _>("seller_id")),
                tier: parse_tier(&tier_str),
                tier_updated_at: r
                    .get::<Option<String>, _>("tier_updated_at")
                    .map(|s| parse_datetime(&s, "sellers.tier_updated_at")),
                account_status: parse_account_status(&status_str),
                created_at: parse_datetime(&r.get::<String, _>("created_at"), "sellers.created_at"),
            }
        }))
    }

    pub async fn list_seller_ids(&self) -> Result<Vec<SellerId>, sqlx::Error> {
        let rows = sqlx::query("SELECT seller_id FROM sellers WHERE account_status != 'deleted'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| SellerId::new(r.get::<String, _>("seller_id")))
            .collect())
    }

    pub async fn update_seller_tier(
        &self,
        seller_id: &SellerId,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sellers SET tier = ?, tier_updated_at = ? WHERE seller_id = ?")
            .bind(tier.as_str())
            .bind(fmt_datetime(now))
            .bind(seller_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_seller_account_status(
        &self,
        seller_id: &SellerId,
        status: AccountStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sellers SET account_status = ? WHERE seller_id = ?")
            .bind(status.as_str())
            .bind(seller_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a partner if absent. Returns true when newly created.
    pub async fn insert_partner(
        &self,
        partner_id: &PartnerId,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO partners (partner_id, account_status, created_at)
            VALUES (?, 'active', ?)
            ON CONFLICT(partner_id) DO NOTHING
            "#,
        )
        .bind(partner_id.as_str())
        .bind(fmt_datetime(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_partner(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Option<Partner>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT partner_id, account_status, created_at FROM partners WHERE partner_id = ?",
        )
        .bind(partner_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let status_str: String = r.get("account_status");
            Partner {
                partner_id: PartnerId::new(r.get::<String, _>("partner_id")),
                account_status: parse_account_status(&status_str),
                created_at: parse_datetime(
                    &r.get::<String, _>("created_at"),
                    "partners.created_at",
                ),
            }
        }))
    }
}

// =============================================================================
// Column parsing helpers
// =============================================================================
//
// Monetary and temporal columns are TEXT; parse failures are logged and fall
// back to a default rather than poisoning whole result sets.

pub(crate) fn parse_money(value: &str, column: &str) -> Money {
    Money::from_str(value).unwrap_or_else(|e| {
        warn!(column, value, error = %e, "Failed to parse money column, using default");
        Money::default()
    })
}

pub(crate) fn parse_datetime(value: &str, column: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(column, value, error = %e, "Failed to parse datetime column, using epoch");
            DateTime::<Utc>::UNIX_EPOCH
        })
}

pub(crate) fn parse_date(value: &str, column: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!(column, value, error = %e, "Failed to parse date column, using epoch date");
        NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date is valid")
    })
}

pub(crate) fn parse_tier(value: &str) -> Tier {
    Tier::parse(value).unwrap_or_else(|| {
        warn!(value, "Unknown tier in database, defaulting to bronze");
        Tier::Bronze
    })
}

pub(crate) fn parse_account_status(value: &str) -> AccountStatus {
    AccountStatus::parse(value).unwrap_or_else(|| {
        warn!(value, "Unknown account status in database, defaulting to active");
        AccountStatus::Active
    })
}

pub(crate) fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}


#[cfg(test)]
mod tests {
    use super::testutil::setup_test_db;
    use super::*;

    #[tokio::test]
    async fn test_insert_seller_idempotent() {
        let (repo, _temp) = setup_test_db().await;
        let seller = SellerId::new("s-1");

        let created = repo
            .insert_seller(&seller, Tier::Bronze, Utc::now())
            .await
            .unwrap();
        let again = repo
            .insert_seller(&seller, Tier::Gold, Utc::now())
            .await
            .unwrap();

        assert!(created);
        assert!(!again);

        // The duplicate insert must not have touched the original tier.
        let loaded = repo.get_seller(&seller).await.unwrap().unwrap();
        assert_eq!(loaded.tier, Tier::Bronze);
        assert_eq!(loaded.account_status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_update_seller_tier() {
        let (repo, _temp) = setup_test_db().await;
        let seller = SellerId::new("s-1");
        repo.insert_seller(&seller, Tier::Bronze, Utc::now())
            .await
            .unwrap();

        let now = Utc::now();
        repo.update_seller_tier(&seller, Tier::Silver, now)
            .await
            .unwrap();

        let loaded = repo.get_seller(&seller).await.unwrap().unwrap();
        assert_eq!(loaded.tier, Tier::Silver);
        assert!(loaded.tier_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_partner_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        let partner = PartnerId::new("p-1");

        assert!(repo.insert_partner(&partner, Utc::now()).await.unwrap());
        assert!(!repo.insert_partner(&partner, Utc::now()).await.unwrap());

        let loaded = repo.get_partner(&partner).await.unwrap().unwrap();
        assert_eq!(loaded.partner_id, partner);
    }

    #[tokio::test]
    async fn test_list_seller_ids_excludes_deleted() {
        let (repo, _temp) = setup_test_db().await;
        repo.insert_seller(&SellerId::new("s-1"), Tier::Bronze, Utc::now())
            .await
            .unwrap();
        repo.insert_seller(&SellerId::new("s-2"), Tier::Bronze, Utc::now())
            .await
            .unwrap();
        repo.update_seller_account_status(&SellerId::new("s-2"), AccountStatus::Deleted)
            .await
            .unwrap();

        let ids = repo.list_seller_ids().await.unwrap();
        assert_eq!(ids, vec![SellerId::new("s-1")]);
    }
}
