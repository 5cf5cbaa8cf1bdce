//! Audited admin overrides.
//!
//! Every manual mutation requires a non-empty reason and produces exactly
//! one override record with before/after snapshots, written before the
//! live state moves.

use crate::db::repo::NewLedgerEntry;
use crate::db::Repository;
use crate::domain::{
    AccountStatus, ActorRef, AdminId, AdminOverride, EntryType, LedgerEntry, Money,
    OverrideAction, SellerId, TargetType, Tier,
};
use crate::engine::{LedgerWriter, StatsEngine};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct AdminEngine {
    repo: Arc<Repository>,
    ledger: Arc<LedgerWriter>,
    stats: Arc<StatsEngine>,
}

impl AdminEngine {
    pub fn new(repo: Arc<Repository>, ledger: Arc<LedgerWriter>, stats: Arc<StatsEngine>) -> Self {
        Self { repo, ledger, stats }
    }

    fn require_reason(reason: &str) -> Result<(), AppError> {
        if reason.trim().is_empty() {
            Err(AppError::Validation(
                "override reason must not be empty".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn record(
        &self,
        admin: &AdminId,
        target_type: TargetType,
        target_id: &str,
        action: OverrideAction,
        previous_value: serde_json::Value,
        new_value: serde_json::Value,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        let record = AdminOverride {
            id: uuid::Uuid::new_v4().to_string(),
            admin_id: admin.clone(),
            target_type,
            target_id: target_id.to_string(),
            action,
            previous_value,
            new_value,
            reason: reason.to_string(),
            created_at: now,
        };
        self.repo.insert_admin_override(&record).await?;
        info!(
            admin = %admin,
            target = %target_id,
            action = action.as_str(),
            "Admin override recorded"
        );
        Ok(record)
    }

    /// Force a seller's tier, bypassing the evaluator.
    pub async fn override_tier(
        &self,
        admin: &AdminId,
        seller_id: &SellerId,
        new_tier: Tier,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        Self::require_reason(reason)?;
        let seller = self
            .repo
            .get_seller(seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("seller {} not found", seller_id)))?;

        let record = self
            .record(
                admin,
                TargetType::Seller,
                seller_id.as_str(),
                OverrideAction::TierOverride,
                json!({"tier": seller.tier.as_str()}),
                json!({"tier": new_tier.as_str()}),
                reason,
                now,
            )
            .await?;

        self.repo.update_seller_tier(seller_id, new_tier, now).await?;
        self.stats.apply_tier_change(seller_id, new_tier).await?;
        Ok(record)
    }

    /// Change a seller's account standing (hold / restrict / reinstate /
    /// delete). Deletion is soft and audited like every other mutation.
    pub async fn set_account_status(
        &self,
        admin: &AdminId,
        seller_id: &SellerId,
        status: AccountStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        Self::require_reason(reason)?;
        let seller = self
            .repo
            .get_seller(seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("seller {} not found", seller_id)))?;

        let action = if status == AccountStatus::Deleted {
            OverrideAction::AccountDeletion
        } else {
            OverrideAction::AccountStatus
        };

        let record = self
            .record(
                admin,
                TargetType::Seller,
                seller_id.as_str(),
                action,
                json!({"accountStatus": seller.account_status.as_str()}),
                json!({"accountStatus": status.as_str()}),
                reason,
                now,
            )
            .await?;

        self.repo
            .update_seller_account_status(seller_id, status)
            .await?;
        Ok(record)
    }

    /// Veto an open settlement batch, keeping the processor off it.
    pub async fn hold_settlement(
        &self,
        admin: &AdminId,
        schedule_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        self.set_settlement_hold(admin, schedule_id, true, OverrideAction::SettlementHold, reason, now)
            .await
    }

    /// Release a held batch back to the processor.
    pub async fn release_settlement(
        &self,
        admin: &AdminId,
        schedule_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        self.set_settlement_hold(
            admin,
            schedule_id,
            false,
            OverrideAction::SettlementRelease,
            reason,
            now,
        )
        .await
    }

    async fn set_settlement_hold(
        &self,
        admin: &AdminId,
        schedule_id: &str,
        on_hold: bool,
        action: OverrideAction,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        Self::require_reason(reason)?;
        let schedule = self
            .repo
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("schedule {} not found", schedule_id)))?;
        if schedule.status != crate::domain::ScheduleStatus::Scheduled {
            return Err(AppError::Conflict(format!(
                "schedule {} is not open (status {})",
                schedule_id, schedule.status
            )));
        }

        let record = self
            .record(
                admin,
                TargetType::SettlementSchedule,
                schedule_id,
                action,
                json!({"onHold": schedule.on_hold}),
                json!({"onHold": on_hold}),
                reason,
                now,
            )
            .await?;

        let updated = self.repo.set_schedule_hold(schedule_id, on_hold).await?;
        if !updated {
            return Err(AppError::Conflict(format!(
                "schedule {} was promoted concurrently",
                schedule_id
            )));
        }
        Ok(record)
    }

    /// Adjust an open batch's total amount.
    pub async fn adjust_settlement(
        &self,
        admin: &AdminId,
        schedule_id: &str,
        new_total: Money,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        Self::require_reason(reason)?;
        if new_total.is_negative() {
            return Err(AppError::Validation(
                "adjusted total must not be negative".to_string(),
            ));
        }

        let schedule = self
            .repo
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("schedule {} not found", schedule_id)))?;
        if schedule.status != crate::domain::ScheduleStatus::Scheduled {
            return Err(AppError::Conflict(format!(
                "schedule {} is not open (status {})",
                schedule_id, schedule.status
            )));
        }

        let record = self
            .record(
                admin,
                TargetType::SettlementSchedule,
                schedule_id,
                OverrideAction::SettlementAdjust,
                json!({"totalAmount": schedule.total_amount.to_canonical_string()}),
                json!({"totalAmount": new_total.to_canonical_string()}),
                reason,
                now,
            )
            .await?;

        let updated = self
            .repo
            .adjust_schedule_amount(schedule_id, new_total)
            .await?;
        if !updated {
            return Err(AppError::Conflict(format!(
                "schedule {} was promoted concurrently",
                schedule_id
            )));
        }
        Ok(record)
    }

    /// Hold or release a pending withdrawal.
    pub async fn set_payout_hold(
        &self,
        admin: &AdminId,
        withdrawal_id: &str,
        on_hold: bool,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminOverride, AppError> {
        Self::require_reason(reason)?;
        let request = self
            .repo
            .get_withdrawal_request(withdrawal_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("withdrawal {} not found", withdrawal_id))
            })?;
        if request.status != crate::domain::WithdrawalStatus::Pending {
            return Err(AppError::Conflict(format!(
                "withdrawal {} is {}, not pending",
                withdrawal_id, request.status
            )));
        }

        let action = if on_hold {
            OverrideAction::PayoutHold
        } else {
            OverrideAction::PayoutRelease
        };

        let record = self
            .record(
                admin,
                TargetType::Withdrawal,
                withdrawal_id,
                action,
                json!({"onHold": request.on_hold}),
                json!({"onHold": on_hold}),
                reason,
                now,
            )
            .await?;

        let updated = self.repo.set_withdrawal_hold(withdrawal_id, on_hold).await?;
        if !updated {
            return Err(AppError::Conflict(format!(
                "withdrawal {} is not pending",
                withdrawal_id
            )));
        }
        Ok(record)
    }

    /// Manual ledger correction: a positive amount posts a refund, a
    /// negative one a deduction of its magnitude. The correction is itself
    /// a ledger entry riding the normal balance-chain discipline.
    pub async fn ledger_correction(
        &self,
        admin: &AdminId,
        actor: &ActorRef,
        amount: Money,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(AdminOverride, LedgerEntry), AppError> {
        Self::require_reason(reason)?;
        if amount.is_zero() {
            return Err(AppError::Validation(
                "correction amount must not be zero".to_string(),
            ));
        }

        let (entry_type, magnitude) = if amount.is_negative() {
            (EntryType::Deduction, amount.abs())
        } else {
            (EntryType::Refund, amount)
        };

        // Snapshot and append under the same actor lock so the recorded
        // before/after pair matches the entry actually written.
        let guard = self.ledger.acquire(actor).await;
        let balance_before = self.ledger.current_balance(actor).await?;
        let signed = match entry_type {
            EntryType::Refund => magnitude,
            _ => -magnitude,
        };
        let balance_after = balance_before + signed;

        let override_id = uuid::Uuid::new_v4().to_string();
        let record = self
            .record(
                admin,
                TargetType::LedgerEntry,
                &format!("{}", actor),
                OverrideAction::LedgerCorrection,
                json!({"balance": balance_before.to_canonical_string()}),
                json!({"balance": balance_after.to_canonical_string()}),
                reason,
                now,
            )
            .await?;

        let entry = self
            .ledger
            .append_locked(
                NewLedgerEntry {
                    actor: actor.clone(),
                    entry_type,
                    amount: magnitude,
                    description: reason.to_string(),
                    order_id: None,
                    batch_id: None,
                    source: format!("override:{}", override_id),
                },
                now,
            )
            .await?;
        drop(guard);

        Ok((record, entry))
    }
}
