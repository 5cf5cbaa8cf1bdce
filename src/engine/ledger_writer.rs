//! Single-writer ledger append path.
//!
//! Reading the current balance (last entry) and appending the next entry
//! must behave as one atomic unit per actor. An in-process per-actor mutex
//! serializes appenders; the monotonic seq with its unique index rejects
//! anything that still races past (e.g. a second process on the same file).

use crate::db::repo::{is_unique_violation, NewLedgerEntry};
use crate::db::Repository;
use crate::domain::{ActorKind, ActorRef, LedgerEntry, Money};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serialized append access to the per-actor balance chains.
pub struct LedgerWriter {
    repo: Arc<Repository>,
    locks: Mutex<HashMap<(ActorKind, String), Arc<Mutex<()>>>>,
}

impl LedgerWriter {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the actor's append lock.
    ///
    /// Held guards serialize every balance-affecting step for that actor:
    /// appends, and read-check-append sequences like withdrawal approval.
    pub async fn acquire(&self, actor: &ActorRef) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry((actor.kind, actor.id.clone()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Append an entry, taking the actor lock internally.
    pub async fn append(
        &self,
        new: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, AppError> {
        let _guard = self.acquire(&new.actor).await;
        self.append_locked(new, now).await
    }

    /// Append an entry while the caller already holds the actor's lock.
    pub async fn append_locked(
        &self,
        new: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, AppError> {
        match self.repo.append_ledger_entry(&new, now).await {
            Ok(entry) => Ok(entry),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "ledger entry already recorded for {} ({})",
                new.source, new.entry_type
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Current total balance: the last entry's balance_after, zero when the
    /// chain is empty.
    pub async fn current_balance(&self, actor: &ActorRef) -> Result<Money, AppError> {
        Ok(self
            .repo
            .latest_ledger_entry(actor)
            .await?
            .map(|e| e.balance_after)
            .unwrap_or_else(Money::zero))
    }

    /// Current seller buckets (pending, available), zeros when empty.
    pub async fn current_buckets(&self, actor: &ActorRef) -> Result<(Money, Money), AppError> {
        Ok(self
            .repo
            .latest_ledger_entry(actor)
            .await?
            .and_then(|e| e.buckets)
            .map(|b| (b.pending_after, b.available_after))
            .unwrap_or((Money::zero(), Money::zero())))
    }
}
