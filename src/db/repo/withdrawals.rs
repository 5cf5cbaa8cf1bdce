//! Withdrawal request operations.

use super::{fmt_datetime, parse_datetime, parse_money, Repository};
use crate::domain::{Money, PartnerId, WithdrawalRequest, WithdrawalStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

impl Repository {
    pub async fn insert_withdrawal_request(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests
            (id, partner_id, amount, balance_at_request, status, on_hold, bank_details,
             requested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(request.partner_id.as_str())
        .bind(request.amount.to_canonical_string())
        .bind(request.balance_at_request.to_canonical_string())
        .bind(request.status.as_str())
        .bind(request.on_hold as i64)
        .bind(request.bank_details.as_deref())
        .bind(fmt_datetime(request.requested_at))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn get_withdrawal_request(
        &self,
        id: &str,
    ) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM withdrawal_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| map_withdrawal_row(&r)))
    }

    /// The partner's outstanding (pending or processing) request, if any.
    pub async fn outstanding_withdrawal(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM withdrawal_requests
            WHERE partner_id = ? AND status IN ('pending', 'processing')
            ORDER BY requested_at DESC
            LIMIT 1
            "#,
        )
        .bind(partner_id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| map_withdrawal_row(&r)))
    }

    /// Pending -> completed, stamping the review outcome. Conditional on the
    /// request still being pending and not held.
    pub async fn complete_withdrawal(
        &self,
        id: &str,
        reviewed_by: &str,
        transaction_ref: &str,
        balance_after_payout: Money,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = 'completed', reviewed_by = ?, transaction_ref = ?,
                balance_after_payout = ?, paid_at = ?
            WHERE id = ? AND status = 'pending' AND on_hold = 0
            "#,
        )
        .bind(reviewed_by)
        .bind(transaction_ref)
        .bind(balance_after_payout.to_canonical_string())
        .bind(fmt_datetime(paid_at))
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending -> rejected, stamping the reviewer and reason.
    pub async fn reject_withdrawal(
        &self,
        id: &str,
        reviewed_by: &str,
        rejection_reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = 'rejected', reviewed_by = ?, rejection_reason = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(reviewed_by)
        .bind(rejection_reason)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Admin payout hold flag on a pending request.
    pub async fn set_withdrawal_hold(
        &self,
        id: &str,
        on_hold: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE withdrawal_requests SET on_hold = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(on_hold as i64)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All requests for a partner, newest first.
    pub async fn query_partner_withdrawals(
        &self,
        partner_id: &PartnerId,
    ) -> Result<Vec<WithdrawalRequest>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM withdrawal_requests
            WHERE partner_id = ?
            ORDER BY requested_at DESC, id ASC
            "#,
        )
        .bind(partner_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_withdrawal_row).collect())
    }
}

fn map_withdrawal_row(row: &sqlx::sqlite::SqliteRow) -> WithdrawalRequest {
    let status_str: String = row.get("status");
    let status = WithdrawalStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(value = %status_str, "Unknown withdrawal status in database, defaulting to pending");
        WithdrawalStatus::Pending
    });

    WithdrawalRequest {
        id: row.get("id"),
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        amount: parse_money(&row.get::<String, _>("amount"), "withdrawal_requests.amount"),
        balance_at_request: parse_money(
            &row.get::<String, _>("balance_at_request"),
            "withdrawal_requests.balance_at_request",
        ),
        status,
        on_hold: row.get::<i64, _>("on_hold") != 0,
        bank_details: row.get("bank_details"),
        reviewed_by: row.get("reviewed_by"),
        rejection_reason: row.get("rejection_reason"),
        transaction_ref: row.get("transaction_ref"),
        balance_after_payout: row
            .get::<Option<String>, _>("balance_after_payout")
            .map(|s| parse_money(&s, "withdrawal_requests.balance_after_payout")),
        requested_at: parse_datetime(
            &row.get::<String, _>("requested_at"),
            "withdrawal_requests.requested_at",
        ),
        paid_at: row
            .get::<Option<String>, _>("paid_at")
            .map(|s| parse_datetime(&s, "withdrawal_requests.paid_at")),
    }
}
