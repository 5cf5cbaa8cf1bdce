//! Ledger entry types and the balance-chain arithmetic.
//!
//! Entries are append-only: corrections are new entries, never edits.
//! Each entry records the actor's balance before and after, and seller
//! entries additionally snapshot the pending/available buckets.

use crate::domain::{ActorRef, Money, OrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of balance-affecting event kinds.
///
/// The sign effect is explicit; nothing downstream compares type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Funds earned on a delivered order. Credits balance and pending.
    Earning,
    /// Funds paid out to the actor's bank. Debits balance and available.
    Payout,
    /// Matured batch release: moves value pending -> available.
    /// Total balance is unchanged, so its sign is zero.
    Settlement,
    /// Manual credit correction.
    Refund,
    /// Manual debit correction.
    Deduction,
}

impl EntryType {
    /// Signed multiplier applied to `amount` for the total-balance chain.
    pub fn sign(&self) -> i32 {
        match self {
            EntryType::Earning | EntryType::Refund => 1,
            EntryType::Payout | EntryType::Deduction => -1,
            EntryType::Settlement => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Earning => "earning",
            EntryType::Payout => "payout",
            EntryType::Settlement => "settlement",
            EntryType::Refund => "refund",
            EntryType::Deduction => "deduction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earning" => Some(EntryType::Earning),
            "payout" => Some(EntryType::Payout),
            "settlement" => Some(EntryType::Settlement),
            "refund" => Some(EntryType::Refund),
            "deduction" => Some(EntryType::Deduction),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seller pending/available bucket snapshot carried on seller entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub pending_before: Money,
    pub pending_after: Money,
    pub available_before: Money,
    pub available_after: Money,
}

impl BucketSnapshot {
    /// Apply an entry's bucket effect to the prior bucket state.
    ///
    /// Earnings accrue to pending; settlements drain pending (floored at
    /// zero) into available; payouts and deductions draw down available;
    /// refunds credit available directly.
    pub fn apply(entry_type: EntryType, amount: Money, pending: Money, available: Money) -> Self {
        let (pending_after, available_after) = match entry_type {
            EntryType::Earning => (pending + amount, available),
            EntryType::Settlement => ((pending - amount).floor_zero(), available + amount),
            EntryType::Payout | EntryType::Deduction => (pending, available - amount),
            EntryType::Refund => (pending, available + amount),
        };
        BucketSnapshot {
            pending_before: pending,
            pending_after,
            available_before: available,
            available_after,
        }
    }
}

/// One immutable row in an actor's balance chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Database row id.
    pub id: i64,
    /// Stable idempotency key, unique across the ledger.
    pub entry_key: String,
    pub actor: ActorRef,
    /// Monotonic per-actor sequence number; the chain orders by this.
    pub seq: i64,
    pub order_id: Option<OrderId>,
    pub batch_id: Option<String>,
    pub entry_type: EntryType,
    /// Non-negative magnitude; direction comes from the type's sign.
    pub amount: Money,
    pub description: String,
    pub balance_before: Money,
    pub balance_after: Money,
    /// Present on seller entries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buckets: Option<BucketSnapshot>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The signed contribution of this entry to the total balance.
    pub fn signed_amount(&self) -> Money {
        match self.entry_type.sign() {
            1 => self.amount,
            -1 => -self.amount,
            _ => Money::zero(),
        }
    }

    /// Generate the stable idempotency key for an entry.
    ///
    /// The key is a hash of the actor, the entry type, and the source
    /// reference (order, batch, withdrawal, or override id). Re-triggering
    /// the same financial event therefore collides at the storage layer
    /// even if a precondition check was raced past.
    pub fn compute_entry_key(actor: &ActorRef, entry_type: EntryType, source: &str) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(actor.kind.as_str());
        hasher.update(b":");
        hasher.update(actor.id.as_bytes());
        hasher.update(b":");
        hasher.update(entry_type.as_str());
        hasher.update(b":");
        hasher.update(source.as_bytes());
        let hash = hasher.finalize();
        hex::encode(&hash[..16])
    }
}
