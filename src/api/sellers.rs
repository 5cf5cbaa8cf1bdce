use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{SellerId, SellerStats, TierEvaluationLog};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub seller_id: String,
    pub current_tier: String,
    pub total_orders: i64,
    pub delivered_orders: i64,
    pub rto_orders: i64,
    pub cancelled_orders: i64,
    pub gross_revenue: String,
    pub shipping_cost: String,
    pub platform_fees: String,
    pub total_settled: String,
    pub pending_settlement: String,
    pub available_for_withdrawal: String,
    pub total_cod_collected: String,
    pub pending_cod_remittance: String,
    pub rto_percent: f64,
    pub delivery_success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_settlement_date: Option<String>,
}

impl From<SellerStats> for StatsDto {
    fn from(s: SellerStats) -> Self {
        StatsDto {
            seller_id: s.seller_id.as_str().to_string(),
            current_tier: s.current_tier.as_str().to_string(),
            total_orders: s.total_orders,
            delivered_orders: s.delivered_orders,
            rto_orders: s.rto_orders,
            cancelled_orders: s.cancelled_orders,
            gross_revenue: s.gross_revenue.to_canonical_string(),
            shipping_cost: s.shipping_cost.to_canonical_string(),
            platform_fees: s.platform_fees.to_canonical_string(),
            total_settled: s.total_settled.to_canonical_string(),
            pending_settlement: s.pending_settlement.to_canonical_string(),
            available_for_withdrawal: s.available_for_withdrawal.to_canonical_string(),
            total_cod_collected: s.total_cod_collected.to_canonical_string(),
            pending_cod_remittance: s.pending_cod_remittance.to_canonical_string(),
            rto_percent: s.rto_percent,
            delivery_success_rate: s.delivery_success_rate,
            next_settlement_date: s
                .next_settlement_date
                .map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

pub async fn get_stats(
    Path(seller_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StatsDto>, AppError> {
    let seller_id = SellerId::new(seller_id);
    state
        .repo
        .get_seller(&seller_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("seller {} not found", seller_id)))?;

    let stats = match state.repo.get_seller_stats(&seller_id).await? {
        Some(stats) => stats,
        // No cached row yet; derive one from history.
        None => state.stats.recompute(&seller_id).await?,
    };

    Ok(Json(stats.into()))
}

pub async fn recompute_stats(
    Path(seller_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StatsDto>, AppError> {
    let stats = state.stats.recompute(&SellerId::new(seller_id)).await?;
    Ok(Json(stats.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub triggered_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDto {
    pub seller_id: String,
    pub previous_tier: String,
    pub new_tier: String,
    pub monthly_orders: i64,
    pub rto_percent: f64,
    pub reason: String,
    pub auto_upgrade: bool,
    pub triggered_by: String,
}

impl From<TierEvaluationLog> for EvaluationDto {
    fn from(log: TierEvaluationLog) -> Self {
        EvaluationDto {
            seller_id: log.seller_id.as_str().to_string(),
            previous_tier: log.previous_tier.as_str().to_string(),
            new_tier: log.new_tier.as_str().to_string(),
            monthly_orders: log.monthly_orders,
            rto_percent: log.rto_percent,
            reason: log.reason,
            auto_upgrade: log.auto_upgrade,
            triggered_by: log.triggered_by,
        }
    }
}

pub async fn evaluate_tier(
    Path(seller_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluationDto>, AppError> {
    let triggered_by = req.triggered_by.unwrap_or_else(|| "api".to_string());
    let log = state
        .tier
        .evaluate_seller(&SellerId::new(seller_id), Utc::now(), &triggered_by)
        .await?;

    Ok(Json(log.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierHistoryResponse {
    pub evaluations: Vec<EvaluationDto>,
}

pub async fn tier_history(
    Path(seller_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TierHistoryResponse>, AppError> {
    let history = state.tier.history(&SellerId::new(seller_id)).await?;

    Ok(Json(TierHistoryResponse {
        evaluations: history.into_iter().map(Into::into).collect(),
    }))
}
