//! Partner compensation and the withdrawal workflow.
//!
//! Withdrawal approval re-checks the live balance under the same per-actor
//! serialization as ledger appends, so an approval racing a new earning or
//! a concurrent payout can never overdraw the chain.

use crate::db::repo::NewLedgerEntry;
use crate::db::Repository;
use crate::domain::{
    partner_earning, ActorRef, AdminId, EntryType, LedgerEntry, Money, Order, PartnerId,
    WithdrawalRequest, WithdrawalStatus,
};
use crate::engine::LedgerWriter;
use crate::error::AppError;
use crate::gateway::PayoutGateway;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

pub struct PayoutEngine {
    repo: Arc<Repository>,
    ledger: Arc<LedgerWriter>,
    gateway: Arc<dyn PayoutGateway>,
    rate_per_km: Money,
}

impl PayoutEngine {
    pub fn new(
        repo: Arc<Repository>,
        ledger: Arc<LedgerWriter>,
        gateway: Arc<dyn PayoutGateway>,
        rate_per_km: Money,
    ) -> Self {
        Self {
            repo,
            ledger,
            gateway,
            rate_per_km,
        }
    }

    /// Record the partner's earning for a delivered order.
    ///
    /// Returns None when the order carries no partner assignment.
    pub async fn record_delivery_earning(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<Option<LedgerEntry>, AppError> {
        let Some(partner_id) = &order.partner_id else {
            return Ok(None);
        };

        self.repo
            .get_partner(partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("partner {} not found", partner_id)))?;

        let earning = partner_earning(order.distance_km, self.rate_per_km);

        let entry = self
            .ledger
            .append(
                NewLedgerEntry {
                    actor: ActorRef::partner(partner_id),
                    entry_type: EntryType::Earning,
                    amount: earning,
                    description: format!(
                        "Delivery earning for order {} ({} km)",
                        order.order_id, order.distance_km
                    ),
                    order_id: Some(order.order_id.clone()),
                    batch_id: None,
                    source: format!("order:{}", order.order_id),
                },
                now,
            )
            .await?;

        info!(
            partner = %partner_id,
            order = %order.order_id,
            earning = %earning,
            "Partner delivery earning recorded"
        );

        Ok(Some(entry))
    }

    /// File a withdrawal request against the partner's current balance.
    ///
    /// Runs under the partner's ledger lock so two racing requests cannot
    /// both pass the single-outstanding check.
    pub async fn request_withdrawal(
        &self,
        partner_id: &PartnerId,
        amount: Money,
        bank_details: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, AppError> {
        if !amount.is_positive() {
            return Err(AppError::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }

        self.repo
            .get_partner(partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("partner {} not found", partner_id)))?;

        let actor = ActorRef::partner(partner_id);
        let _guard = self.ledger.acquire(&actor).await;

        if let Some(outstanding) = self.repo.outstanding_withdrawal(partner_id).await? {
            return Err(AppError::Conflict(format!(
                "partner {} already has withdrawal {} in {} state",
                partner_id, outstanding.id, outstanding.status
            )));
        }

        let balance = self.ledger.current_balance(&actor).await?;
        if amount > balance {
            return Err(AppError::InsufficientBalance(format!(
                "requested {} exceeds balance {}",
                amount, balance
            )));
        }

        let request = WithdrawalRequest {
            id: uuid::Uuid::new_v4().to_string(),
            partner_id: partner_id.clone(),
            amount,
            balance_at_request: balance,
            status: WithdrawalStatus::Pending,
            on_hold: false,
            bank_details,
            reviewed_by: None,
            rejection_reason: None,
            transaction_ref: None,
            balance_after_payout: None,
            requested_at: now,
            paid_at: None,
        };
        self.repo.insert_withdrawal_request(&request).await?;

        info!(
            partner = %partner_id,
            withdrawal = %request.id,
            amount = %amount,
            "Withdrawal requested"
        );

        Ok(request)
    }

    /// Admin approval: re-check balance, execute the transfer, append the
    /// payout entry, stamp the request completed.
    pub async fn approve_withdrawal(
        &self,
        withdrawal_id: &str,
        admin: &AdminId,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, AppError> {
        let request = self
            .repo
            .get_withdrawal_request(withdrawal_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("withdrawal {} not found", withdrawal_id))
            })?;

        if request.status != WithdrawalStatus::Pending {
            return Err(AppError::Conflict(format!(
                "withdrawal {} is {}, not pending",
                withdrawal_id, request.status
            )));
        }
        if request.on_hold {
            return Err(AppError::Conflict(format!(
                "withdrawal {} is on payout hold",
                withdrawal_id
            )));
        }

        let actor = ActorRef::partner(&request.partner_id);
        let _guard = self.ledger.acquire(&actor).await;

        // Status may have moved while we waited on the lock.
        let fresh = self
            .repo
            .get_withdrawal_request(withdrawal_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("withdrawal {} not found", withdrawal_id))
            })?;
        if fresh.status != WithdrawalStatus::Pending || fresh.on_hold {
            return Err(AppError::Conflict(format!(
                "withdrawal {} is no longer approvable",
                withdrawal_id
            )));
        }

        // Only the balance read under this lock counts; the balance at
        // request time is informational.
        let balance = self.ledger.current_balance(&actor).await?;
        if request.amount > balance {
            return Err(AppError::InsufficientBalance(format!(
                "balance {} dropped below requested {}",
                balance, request.amount
            )));
        }

        let transaction_ref = self
            .gateway
            .initiate_transfer(
                request.partner_id.as_str(),
                request.amount,
                request.bank_details.as_deref(),
                withdrawal_id,
            )
            .await?;

        let entry = self
            .ledger
            .append_locked(
                NewLedgerEntry {
                    actor: actor.clone(),
                    entry_type: EntryType::Payout,
                    amount: request.amount,
                    description: format!("Withdrawal payout {}", withdrawal_id),
                    order_id: None,
                    batch_id: None,
                    source: format!("withdrawal:{}", withdrawal_id),
                },
                now,
            )
            .await?;

        let completed = self
            .repo
            .complete_withdrawal(
                withdrawal_id,
                admin.as_str(),
                &transaction_ref,
                entry.balance_after,
                now,
            )
            .await?;
        if !completed {
            return Err(AppError::Internal(format!(
                "withdrawal {} state changed during approval",
                withdrawal_id
            )));
        }

        info!(
            withdrawal = %withdrawal_id,
            partner = %request.partner_id,
            amount = %request.amount,
            txn = %transaction_ref,
            "Withdrawal approved and paid"
        );

        self.repo
            .get_withdrawal_request(withdrawal_id)
            .await?
            .ok_or_else(|| AppError::Internal("withdrawal vanished after approval".to_string()))
    }

    /// Admin rejection of a pending request.
    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: &str,
        admin: &AdminId,
        reason: &str,
    ) -> Result<WithdrawalRequest, AppError> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "rejection reason must not be empty".to_string(),
            ));
        }

        self.repo
            .get_withdrawal_request(withdrawal_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("withdrawal {} not found", withdrawal_id))
            })?;

        let rejected = self
            .repo
            .reject_withdrawal(withdrawal_id, admin.as_str(), reason)
            .await?;
        if !rejected {
            return Err(AppError::Conflict(format!(
                "withdrawal {} is not pending",
                withdrawal_id
            )));
        }

        info!(withdrawal = %withdrawal_id, "Withdrawal rejected");

        self.repo
            .get_withdrawal_request(withdrawal_id)
            .await?
            .ok_or_else(|| AppError::Internal("withdrawal vanished after rejection".to_string()))
    }

    /// Withdrawal history for a partner, newest first.
    pub async fn partner_withdrawals(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Vec<WithdrawalRequest>, AppError> {
        self.repo
            .get_partner(partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("partner {} not found", partner_id)))?;
        Ok(self.repo.query_partner_withdrawals(partner_id).await?)
    }
}
