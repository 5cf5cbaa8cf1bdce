use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{AdminId, Money, PartnerId, WithdrawalRequest};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequestBody {
    pub amount: Money,
    pub bank_details: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDto {
    pub id: String,
    pub partner_id: String,
    pub amount: String,
    pub balance_at_request: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after_payout: Option<String>,
}

impl From<WithdrawalRequest> for WithdrawalDto {
    fn from(w: WithdrawalRequest) -> Self {
        WithdrawalDto {
            id: w.id,
            partner_id: w.partner_id.as_str().to_string(),
            amount: w.amount.to_canonical_string(),
            balance_at_request: w.balance_at_request.to_canonical_string(),
            status: w.status.as_str().to_string(),
            reviewed_by: w.reviewed_by,
            rejection_reason: w.rejection_reason,
            transaction_ref: w.transaction_ref,
            balance_after_payout: w.balance_after_payout.map(|b| b.to_canonical_string()),
        }
    }
}

pub async fn request_withdrawal(
    Path(partner_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<WithdrawalRequestBody>,
) -> Result<Json<WithdrawalDto>, AppError> {
    let request = state
        .payout
        .request_withdrawal(
            &PartnerId::new(partner_id),
            req.amount,
            req.bank_details,
            Utc::now(),
        )
        .await?;

    Ok(Json(request.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalListResponse {
    pub withdrawals: Vec<WithdrawalDto>,
}

pub async fn list_withdrawals(
    Path(partner_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WithdrawalListResponse>, AppError> {
    let withdrawals = state
        .payout
        .partner_withdrawals(&PartnerId::new(partner_id))
        .await?;

    Ok(Json(WithdrawalListResponse {
        withdrawals: withdrawals.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub admin_id: String,
    pub reason: Option<String>,
}

pub async fn approve_withdrawal(
    Path(withdrawal_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<WithdrawalDto>, AppError> {
    let request = state
        .payout
        .approve_withdrawal(&withdrawal_id, &AdminId::new(req.admin_id), Utc::now())
        .await?;

    Ok(Json(request.into()))
}

pub async fn reject_withdrawal(
    Path(withdrawal_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<WithdrawalDto>, AppError> {
    let reason = req
        .reason
        .ok_or_else(|| AppError::Validation("rejection reason is required".to_string()))?;

    let request = state
        .payout
        .reject_withdrawal(&withdrawal_id, &AdminId::new(req.admin_id), &reason)
        .await?;

    Ok(Json(request.into()))
}
