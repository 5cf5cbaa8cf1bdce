use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::api::AppState;
use crate::domain::{SellerId, SettlementSchedule};
use crate::engine::BatchOutcome;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcomeDto {
    pub batch_id: String,
    pub seller_id: String,
    pub status: String,
    pub total_amount: String,
    pub orders_settled: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<BatchOutcome> for BatchOutcomeDto {
    fn from(o: BatchOutcome) -> Self {
        BatchOutcomeDto {
            batch_id: o.batch_id,
            seller_id: o.seller_id.as_str().to_string(),
            status: o.status.as_str().to_string(),
            total_amount: o.total_amount.to_canonical_string(),
            orders_settled: o.orders_settled,
            failure_reason: o.failure_reason,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub processed: usize,
    pub outcomes: Vec<BatchOutcomeDto>,
}

/// Admin/timer trigger for the due-batch run.
pub async fn run_batches(State(state): State<AppState>) -> Result<Json<RunResponse>, AppError> {
    let outcomes = state.batch.process_due(Utc::now()).await?;

    Ok(Json(RunResponse {
        processed: outcomes.len(),
        outcomes: outcomes.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDto {
    pub id: String,
    pub tier_at_creation: String,
    pub order_ids: Vec<String>,
    pub total_amount: String,
    pub settlement_date: String,
    pub status: String,
    pub on_hold: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<SettlementSchedule> for ScheduleDto {
    fn from(s: SettlementSchedule) -> Self {
        ScheduleDto {
            id: s.id,
            tier_at_creation: s.tier_at_creation.as_str().to_string(),
            order_ids: s
                .order_ids
                .into_iter()
                .map(|o| o.as_str().to_string())
                .collect(),
            total_amount: s.total_amount.to_canonical_string(),
            settlement_date: s.settlement_date.format("%Y-%m-%d").to_string(),
            status: s.status.as_str().to_string(),
            on_hold: s.on_hold,
            failure_reason: s.failure_reason,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleListResponse {
    pub schedules: Vec<ScheduleDto>,
}

pub async fn list_seller_settlements(
    Path(seller_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ScheduleListResponse>, AppError> {
    let seller_id = SellerId::new(seller_id);
    state
        .repo
        .get_seller(&seller_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("seller {} not found", seller_id)))?;

    let schedules = state.repo.query_seller_schedules(&seller_id).await?;

    Ok(Json(ScheduleListResponse {
        schedules: schedules.into_iter().map(Into::into).collect(),
    }))
}
