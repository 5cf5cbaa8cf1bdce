//! Ledger entry operations.
//!
//! The append path runs read-last and insert-next inside one transaction,
//! stamping a monotonic per-actor `seq`. A UNIQUE(actor_kind, actor_id, seq)
//! index rejects any append that lost a race, and UNIQUE(entry_key) rejects
//! re-triggered financial events.

use super::{fmt_datetime, parse_datetime, parse_money, Repository};
use crate::domain::{
    ActorKind, ActorRef, BucketSnapshot, EntryType, LedgerEntry, Money, OrderId,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

/// Input for one ledger append.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub actor: ActorRef,
    pub entry_type: EntryType,
    /// Non-negative magnitude; direction comes from the type.
    pub amount: Money,
    pub description: String,
    pub order_id: Option<OrderId>,
    pub batch_id: Option<String>,
    /// Idempotency source reference, e.g. `order:o-1` or `batch:<uuid>`.
    pub source: String,
}

/// True when the error is a UNIQUE constraint rejection.
///
/// The append path relies on this to distinguish duplicate triggers and
/// lost seq races from real failures.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.message().contains("UNIQUE constraint failed"))
        .unwrap_or(false)
}

impl Repository {
    /// Append one entry to an actor's chain.
    ///
    /// Must be called under the per-actor serialization the ledger writer
    /// provides; the transaction plus unique seq index close the remaining
    /// cross-process window.
    ///
    /// # Errors
    /// Returns the underlying sqlx error; unique violations surface for the
    /// caller to classify (duplicate entry_key vs. seq race).
    pub async fn append_ledger_entry(
        &self,
        new: &NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, sqlx::Error> {
        let entry_key =
            LedgerEntry::compute_entry_key(&new.actor, new.entry_type, &new.source);

        let mut tx = self.pool().begin().await?;

        let last = sqlx::query(
            r#"
            SELECT seq, balance_after, pending_after, available_after
            FROM ledger_entries
            WHERE actor_kind = ? AND actor_id = ?
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(new.actor.kind.as_str())
        .bind(new.actor.id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let (seq, balance_before, pending_before, available_before) = match last {
            Some(row) => {
                let seq: i64 = row.get("seq");
                let balance = parse_money(
                    &row.get::<String, _>("balance_after"),
                    "ledger_entries.balance_after",
                );
                let pending = row
                    .get::<Option<String>, _>("pending_after")
                    .map(|s| parse_money(&s, "ledger_entries.pending_after"))
                    .unwrap_or_else(Money::zero);
                let available = row
                    .get::<Option<String>, _>("available_after")
                    .map(|s| parse_money(&s, "ledger_entries.available_after"))
                    .unwrap_or_else(Money::zero);
                (seq + 1, balance, pending, available)
            }
            None => (1, Money::zero(), Money::zero(), Money::zero()),
        };

        let signed = match new.entry_type.sign() {
            1 => new.amount,
            -1 => -new.amount,
            _ => Money::zero(),
        };
        let balance_after = balance_before + signed;

        let buckets = match new.actor.kind {
            ActorKind::Seller => Some(BucketSnapshot::apply(
                new.entry_type,
                new.amount,
                pending_before,
                available_before,
            )),
            ActorKind::Partner => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries
            (entry_key, actor_kind, actor_id, seq, order_id, batch_id, entry_type,
             amount, description, balance_before, balance_after,
             pending_before, pending_after, available_before, available_after, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry_key)
        .bind(new.actor.kind.as_str())
        .bind(new.actor.id.as_str())
        .bind(seq)
        .bind(new.order_id.as_ref().map(|o| o.as_str()))
        .bind(new.batch_id.as_deref())
        .bind(new.entry_type.as_str())
        .bind(new.amount.to_canonical_string())
        .bind(&new.description)
        .bind(balance_before.to_canonical_string())
        .bind(balance_after.to_canonical_string())
        .bind(buckets.map(|b| b.pending_before.to_canonical_string()))
        .bind(buckets.map(|b| b.pending_after.to_canonical_string()))
        .bind(buckets.map(|b| b.available_before.to_canonical_string()))
        .bind(buckets.map(|b| b.available_after.to_canonical_string()))
        .bind(fmt_datetime(now))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LedgerEntry {
            id: result.last_insert_rowid(),
            entry_key,
            actor: new.actor.clone(),
            seq,
            order_id: new.order_id.clone(),
            batch_id: new.batch_id.clone(),
            entry_type: new.entry_type,
            amount: new.amount,
            description: new.description.clone(),
            balance_before,
            balance_after,
            buckets,
            created_at: now,
        })
    }

    /// The most recent entry for an actor, by sequence number.
    pub async fn latest_ledger_entry(
        &self,
        actor: &ActorRef,
    ) -> Result<Option<LedgerEntry>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM ledger_entries
            WHERE actor_kind = ? AND actor_id = ?
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(actor.kind.as_str())
        .bind(actor.id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| map_entry_row(&r)))
    }

    /// Full chain for an actor in sequence order.
    pub async fn ledger_chain(&self, actor: &ActorRef) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ledger_entries
            WHERE actor_kind = ? AND actor_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(actor.kind.as_str())
        .bind(actor.id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_entry_row).collect())
    }

    /// Paginated entry query filtered by type and creation window.
    pub async fn query_ledger_entries(
        &self,
        actor: &ActorRef,
        entry_type: Option<EntryType>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ledger_entries
            WHERE actor_kind = ? AND actor_id = ?
              AND (? IS NULL OR entry_type = ?)
              AND (? IS NULL OR created_at >= ?)
              AND (? IS NULL OR created_at <= ?)
            ORDER BY seq DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(actor.kind.as_str())
        .bind(actor.id.as_str())
        .bind(entry_type.map(|t| t.as_str()))
        .bind(entry_type.map(|t| t.as_str()))
        .bind(from.map(fmt_datetime))
        .bind(from.map(fmt_datetime))
        .bind(to.map(fmt_datetime))
        .bind(to.map(fmt_datetime))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_entry_row).collect())
    }

    /// Total entries matching the same filters as `query_ledger_entries`.
    pub async fn count_ledger_entries(
        &self,
        actor: &ActorRef,
        entry_type: Option<EntryType>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as n FROM ledger_entries
            WHERE actor_kind = ? AND actor_id = ?
              AND (? IS NULL OR entry_type = ?)
              AND (? IS NULL OR created_at >= ?)
              AND (? IS NULL OR created_at <= ?)
            "#,
        )
        .bind(actor.kind.as_str())
        .bind(actor.id.as_str())
        .bind(entry_type.map(|t| t.as_str()))
        .bind(entry_type.map(|t| t.as_str()))
        .bind(from.map(fmt_datetime))
        .bind(from.map(fmt_datetime))
        .bind(to.map(fmt_datetime))
        .bind(to.map(fmt_datetime))
        .fetch_one(self.pool())
        .await?;

        Ok(row.get("n"))
    }
}

fn map_entry_row(row: &sqlx::sqlite::SqliteRow) -> LedgerEntry {
    let kind_str: String = row.get("actor_kind");
    let kind = ActorKind::parse(&kind_str).unwrap_or_else(|| {
        warn!(value = %kind_str, "Unknown actor kind in ledger row, defaulting to seller");
        ActorKind::Seller
    });
    let type_str: String = row.get("entry_type");
    let entry_type = EntryType::parse(&type_str).unwrap_or_else(|| {
        warn!(value = %type_str, "Unknown entry type in ledger row, defaulting to earning");
        EntryType::Earning
    });

    let pending_before: Option<String> = row.get("pending_before");
    let buckets = pending_before.map(|pb| BucketSnapshot {
        pending_before: parse_money(&pb, "ledger_entries.pending_before"),
        pending_after: parse_money(
            &row.get::<String, _>("pending_after"),
            "ledger_entries.pending_after",
        ),
        available_before: parse_money(
            &row.get::<String, _>("available_before"),
            "ledger_entries.available_before",
        ),
        available_after: parse_money(
            &row.get::<String, _>("available_after"),
            "ledger_entries.available_after",
        ),
    });

    LedgerEntry {
        id: row.get("id"),
        entry_key: row.get("entry_key"),
        actor: ActorRef {
            kind,
            id: row.get("actor_id"),
        },
        seq: row.get("seq"),
        order_id: row
            .get::<Option<String>, _>("order_id")
            .map(OrderId::new),
        batch_id: row.get("batch_id"),
        entry_type,
        amount: parse_money(&row.get::<String, _>("amount"), "ledger_entries.amount"),
        description: row.get("description"),
        balance_before: parse_money(
            &row.get::<String, _>("balance_before"),
            "ledger_entries.balance_before",
        ),
        balance_after: parse_money(
            &row.get::<String, _>("balance_after"),
            "ledger_entries.balance_after",
        ),
        buckets,
        created_at: parse_datetime(
            &row.get::<String, _>("created_at"),
            "ledger_entries.created_at",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::setup_test_db;
    use super::*;
    use crate::domain::SellerId;

    fn earning(actor: &ActorRef, amount: i64, source: &str) -> NewLedgerEntry {
        NewLedgerEntry {
            actor: actor.clone(),
            entry_type: EntryType::Earning,
            amount: Money::from_i64(amount),
            description: "order earning".to_string(),
            order_id: None,
            batch_id: None,
            source: source.to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_builds_chain() {
        let (repo, _temp) = setup_test_db().await;
        let actor = ActorRef::seller(&SellerId::new("s-1"));

        let e1 = repo
            .append_ledger_entry(&earning(&actor, 100, "order:o-1"), Utc::now())
            .await
            .unwrap();
        let e2 = repo
            .append_ledger_entry(&earning(&actor, 50, "order:o-2"), Utc::now())
            .await
            .unwrap();

        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
        assert_eq!(e1.balance_before, Money::zero());
        assert_eq!(e1.balance_after, Money::from_i64(100));
        assert_eq!(e2.balance_before, Money::from_i64(100));
        assert_eq!(e2.balance_after, Money::from_i64(150));

        let buckets = e2.buckets.expect("seller entries carry buckets");
        assert_eq!(buckets.pending_after, Money::from_i64(150));
    }

    #[tokio::test]
    async fn test_duplicate_source_rejected() {
        let (repo, _temp) = setup_test_db().await;
        let actor = ActorRef::seller(&SellerId::new("s-1"));

        repo.append_ledger_entry(&earning(&actor, 100, "order:o-1"), Utc::now())
            .await
            .unwrap();
        let err = repo
            .append_ledger_entry(&earning(&actor, 100, "order:o-1"), Utc::now())
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_partner_entries_have_no_buckets() {
        let (repo, _temp) = setup_test_db().await;
        let actor = ActorRef::partner(&crate::domain::PartnerId::new("p-1"));

        let entry = repo
            .append_ledger_entry(&earning(&actor, 75, "order:o-9"), Utc::now())
            .await
            .unwrap();
        assert!(entry.buckets.is_none());

        let loaded = repo.latest_ledger_entry(&actor).await.unwrap().unwrap();
        assert!(loaded.buckets.is_none());
        assert_eq!(loaded.balance_after, Money::from_i64(75));
    }

    #[tokio::test]
    async fn test_query_entries_filters_by_type() {
        let (repo, _temp) = setup_test_db().await;
        let actor = ActorRef::seller(&SellerId::new("s-1"));

        repo.append_ledger_entry(&earning(&actor, 100, "order:o-1"), Utc::now())
            .await
            .unwrap();
        repo.append_ledger_entry(
            &NewLedgerEntry {
                actor: actor.clone(),
                entry_type: EntryType::Settlement,
                amount: Money::from_i64(100),
                description: "batch settled".to_string(),
                order_id: None,
                batch_id: Some("b-1".to_string()),
                source: "batch:b-1".to_string(),
            },
            Utc::now(),
        )
        .await
        .unwrap();

        let settlements = repo
            .query_ledger_entries(&actor, Some(EntryType::Settlement), None, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(settlements[0].entry_type, EntryType::Settlement);

        let all = repo
            .query_ledger_entries(&actor, None, None, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let count = repo
            .count_ledger_entries(&actor, None, None, None)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_settlement_moves_buckets_not_balance() {
        let (repo, _temp) = setup_test_db().await;
        let actor = ActorRef::seller(&SellerId::new("s-1"));

        repo.append_ledger_entry(&earning(&actor, 800, "order:o-1"), Utc::now())
            .await
            .unwrap();
        let settled = repo
            .append_ledger_entry(
                &NewLedgerEntry {
                    actor: actor.clone(),
                    entry_type: EntryType::Settlement,
                    amount: Money::from_i64(800),
                    description: "batch settled".to_string(),
                    order_id: None,
                    batch_id: Some("b-1".to_string()),
                    source: "batch:b-1".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(settled.balance_before, Money::from_i64(800));
        assert_eq!(settled.balance_after, Money::from_i64(800));
        let buckets = settled.buckets.unwrap();
        assert_eq!(buckets.pending_after, Money::zero());
        assert_eq!(buckets.available_after, Money::from_i64(800));
    }
}
