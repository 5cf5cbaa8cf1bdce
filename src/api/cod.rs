use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{CodCollection, Money, OrderId, PartnerId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    pub order_id: String,
    pub partner_id: String,
    pub collected_amount: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDto {
    pub order_id: String,
    pub collected_amount: String,
    pub cod_handling_fee: String,
    pub net_settlement: String,
    pub remittance_status: String,
}

impl From<CodCollection> for CollectionDto {
    fn from(c: CodCollection) -> Self {
        CollectionDto {
            order_id: c.order_id.as_str().to_string(),
            collected_amount: c.collected_amount.to_canonical_string(),
            cod_handling_fee: c.cod_handling_fee.to_canonical_string(),
            net_settlement: c.net_settlement.to_canonical_string(),
            remittance_status: c.remittance_status.as_str().to_string(),
        }
    }
}

pub async fn record_collection(
    State(state): State<AppState>,
    Json(req): Json<CollectionRequest>,
) -> Result<Json<CollectionDto>, AppError> {
    let collection = state
        .cod
        .record_collection(
            &OrderId::new(req.order_id),
            &PartnerId::new(req.partner_id),
            req.collected_amount,
            Utc::now(),
        )
        .await?;

    Ok(Json(collection.into()))
}

pub async fn remit_collection(
    Path(order_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CollectionDto>, AppError> {
    let collection = state
        .cod
        .mark_remitted(&OrderId::new(order_id), Utc::now())
        .await?;

    Ok(Json(collection.into()))
}
