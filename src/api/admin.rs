use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{
    AccountStatus, ActorKind, ActorRef, AdminId, AdminOverride, Money, SellerId, TargetType, Tier,
};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideDto {
    pub id: String,
    pub admin_id: String,
    pub target_type: String,
    pub target_id: String,
    pub action: String,
    pub previous_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub reason: String,
}

impl From<AdminOverride> for OverrideDto {
    fn from(o: AdminOverride) -> Self {
        OverrideDto {
            id: o.id,
            admin_id: o.admin_id.as_str().to_string(),
            target_type: o.target_type.as_str().to_string(),
            target_id: o.target_id,
            action: o.action.as_str().to_string(),
            previous_value: o.previous_value,
            new_value: o.new_value,
            reason: o.reason,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierOverrideRequest {
    pub admin_id: String,
    pub seller_id: String,
    pub tier: String,
    pub reason: String,
}

pub async fn override_tier(
    State(state): State<AppState>,
    Json(req): Json<TierOverrideRequest>,
) -> Result<Json<OverrideDto>, AppError> {
    let tier = Tier::parse(&req.tier)
        .ok_or_else(|| AppError::Validation(format!("invalid tier {}", req.tier)))?;

    let record = state
        .admin
        .override_tier(
            &AdminId::new(req.admin_id),
            &SellerId::new(req.seller_id),
            tier,
            &req.reason,
            Utc::now(),
        )
        .await?;

    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusRequest {
    pub admin_id: String,
    pub seller_id: String,
    pub status: String,
    pub reason: String,
}

pub async fn set_account_status(
    State(state): State<AppState>,
    Json(req): Json<AccountStatusRequest>,
) -> Result<Json<OverrideDto>, AppError> {
    let status = AccountStatus::parse(&req.status)
        .ok_or_else(|| AppError::Validation(format!("invalid account status {}", req.status)))?;

    let record = state
        .admin
        .set_account_status(
            &AdminId::new(req.admin_id),
            &SellerId::new(req.seller_id),
            status,
            &req.reason,
            Utc::now(),
        )
        .await?;

    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleActionRequest {
    pub admin_id: String,
    pub reason: String,
    pub new_total: Option<Money>,
}

pub async fn hold_settlement(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ScheduleActionRequest>,
) -> Result<Json<OverrideDto>, AppError> {
    let record = state
        .admin
        .hold_settlement(
            &AdminId::new(req.admin_id),
            &schedule_id,
            &req.reason,
            Utc::now(),
        )
        .await?;
    Ok(Json(record.into()))
}

pub async fn release_settlement(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ScheduleActionRequest>,
) -> Result<Json<OverrideDto>, AppError> {
    let record = state
        .admin
        .release_settlement(
            &AdminId::new(req.admin_id),
            &schedule_id,
            &req.reason,
            Utc::now(),
        )
        .await?;
    Ok(Json(record.into()))
}

pub async fn adjust_settlement(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ScheduleActionRequest>,
) -> Result<Json<OverrideDto>, AppError> {
    let new_total = req
        .new_total
        .ok_or_else(|| AppError::Validation("newTotal is required".to_string()))?;

    let record = state
        .admin
        .adjust_settlement(
            &AdminId::new(req.admin_id),
            &schedule_id,
            new_total,
            &req.reason,
            Utc::now(),
        )
        .await?;
    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutHoldRequest {
    pub admin_id: String,
    pub on_hold: bool,
    pub reason: String,
}

pub async fn set_payout_hold(
    Path(withdrawal_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<PayoutHoldRequest>,
) -> Result<Json<OverrideDto>, AppError> {
    let record = state
        .admin
        .set_payout_hold(
            &AdminId::new(req.admin_id),
            &withdrawal_id,
            req.on_hold,
            &req.reason,
            Utc::now(),
        )
        .await?;
    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionRequest {
    pub admin_id: String,
    pub actor_kind: String,
    pub actor_id: String,
    /// Signed amount: positive posts a refund, negative a deduction.
    pub amount: Money,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionResponse {
    #[serde(rename = "override")]
    pub override_record: OverrideDto,
    pub entry_type: String,
    pub amount: String,
    pub balance_after: String,
}

pub async fn ledger_correction(
    State(state): State<AppState>,
    Json(req): Json<CorrectionRequest>,
) -> Result<Json<CorrectionResponse>, AppError> {
    let kind = ActorKind::parse(&req.actor_kind)
        .ok_or_else(|| AppError::Validation(format!("invalid actor kind {}", req.actor_kind)))?;
    let actor = ActorRef {
        kind,
        id: req.actor_id,
    };

    let (record, entry) = state
        .admin
        .ledger_correction(
            &AdminId::new(req.admin_id),
            &actor,
            req.amount,
            &req.reason,
            Utc::now(),
        )
        .await?;

    Ok(Json(CorrectionResponse {
        override_record: record.into(),
        entry_type: entry.entry_type.as_str().to_string(),
        amount: entry.amount.to_canonical_string(),
        balance_after: entry.balance_after.to_canonical_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverridesQuery {
    pub target_type: String,
    pub target_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverridesResponse {
    pub overrides: Vec<OverrideDto>,
}

pub async fn query_overrides(
    Query(params): Query<OverridesQuery>,
    State(state): State<AppState>,
) -> Result<Json<OverridesResponse>, AppError> {
    let target_type = TargetType::parse(&params.target_type).ok_or_else(|| {
        AppError::Validation(format!("invalid target type {}", params.target_type))
    })?;

    let overrides = state
        .repo
        .query_admin_overrides(target_type, &params.target_id)
        .await?;

    Ok(Json(OverridesResponse {
        overrides: overrides.into_iter().map(Into::into).collect(),
    }))
}
