use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{
    Money, Order, OrderId, OrderStatus, PartnerId, PaymentMode, SellerId, SettlementStatus, Tier,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_id: String,
    pub seller_id: String,
    pub partner_id: Option<String>,
    pub payment_mode: String,
    pub order_value: Money,
    pub shipping_cost: Money,
    pub cod_amount: Option<Money>,
    pub distance_km: Option<Money>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub created: bool,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let payment_mode = PaymentMode::parse(&req.payment_mode)
        .ok_or_else(|| AppError::Validation(format!("invalid payment mode {}", req.payment_mode)))?;

    let cod_amount = req.cod_amount.unwrap_or_else(Money::zero);
    let distance_km = req.distance_km.unwrap_or_else(Money::zero);

    if !req.order_value.is_positive() {
        return Err(AppError::Validation("orderValue must be positive".to_string()));
    }
    if req.shipping_cost.is_negative() {
        return Err(AppError::Validation(
            "shippingCost must not be negative".to_string(),
        ));
    }
    if payment_mode == PaymentMode::Cod && !cod_amount.is_positive() {
        return Err(AppError::Validation(
            "codAmount must be positive for COD orders".to_string(),
        ));
    }

    let now = Utc::now();
    let seller_id = SellerId::new(req.seller_id);
    let partner_id = req.partner_id.map(PartnerId::new);

    // The surrounding platform owns account onboarding; the settlement
    // engine materializes the projections it needs on first sight.
    state
        .repo
        .insert_seller(&seller_id, Tier::Bronze, now)
        .await?;
    if let Some(partner) = &partner_id {
        state.repo.insert_partner(partner, now).await?;
    }

    let order = Order {
        order_id: OrderId::new(req.order_id.clone()),
        seller_id: seller_id.clone(),
        partner_id,
        payment_mode,
        order_value: req.order_value,
        shipping_cost: req.shipping_cost,
        cod_amount,
        distance_km,
        status: OrderStatus::Created,
        delivered_at: None,
        settlement_status: SettlementStatus::Unscheduled,
        settlement_date: None,
        platform_fee: None,
        seller_earning: None,
        batch_id: None,
        created_at: now,
    };

    let created = state.repo.insert_order(&order).await?;
    if created {
        let tier = state.tier.current_tier(&seller_id).await?;
        state.stats.apply_order_created(&seller_id, tier).await?;
    }

    Ok(Json(CreateOrderResponse {
        order_id: req.order_id,
        created,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredRequest {
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredResponse {
    pub order_id: String,
    pub batch_id: String,
    pub platform_fee: String,
    pub seller_earning: String,
    pub settlement_date: String,
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_earning: Option<String>,
}

pub async fn order_delivered(
    Path(order_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<DeliveredRequest>,
) -> Result<Json<DeliveredResponse>, AppError> {
    let order_id = OrderId::new(order_id);
    let order = state
        .repo
        .get_order(&order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

    if order.status == OrderStatus::Delivered {
        return Err(AppError::Conflict(format!(
            "order {} already delivered",
            order_id
        )));
    }

    let now = Utc::now();
    let delivered_at = req.delivered_at.unwrap_or(now);

    state
        .repo
        .update_order_status(&order_id, OrderStatus::Delivered, Some(delivered_at))
        .await?;
    let tier = state.tier.current_tier(&order.seller_id).await?;
    state
        .stats
        .apply_order_outcome(&order.seller_id, tier, OrderStatus::Delivered)
        .await?;

    let scheduled = state.scheduler.schedule_on_delivery(&order_id, now).await?;

    // Partner compensation rides the same delivery event.
    let delivered_order = state
        .repo
        .get_order(&order_id)
        .await?
        .ok_or_else(|| AppError::Internal("order vanished after scheduling".to_string()))?;
    let partner_entry = state
        .payout
        .record_delivery_earning(&delivered_order, now)
        .await?;

    Ok(Json(DeliveredResponse {
        order_id: order_id.as_str().to_string(),
        batch_id: scheduled.batch_id,
        platform_fee: scheduled.platform_fee.to_canonical_string(),
        seller_earning: scheduled.seller_earning.to_canonical_string(),
        settlement_date: scheduled.settlement_date.format("%Y-%m-%d").to_string(),
        tier: scheduled.tier.as_str().to_string(),
        partner_earning: partner_entry.map(|e| e.amount.to_canonical_string()),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub order_id: String,
    pub status: String,
}

/// Terminal non-delivery outcomes (RTO / cancelled) reported by the
/// platform. Delivery goes through the dedicated endpoint.
pub async fn update_status(
    Path(order_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = OrderStatus::parse(&req.status)
        .ok_or_else(|| AppError::Validation(format!("invalid status {}", req.status)))?;
    if !matches!(status, OrderStatus::Rto | OrderStatus::Cancelled) {
        return Err(AppError::Validation(
            "only rto and cancelled are accepted here".to_string(),
        ));
    }

    let order_id = OrderId::new(order_id);
    let order = state
        .repo
        .get_order(&order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

    if order.status != OrderStatus::Created {
        return Err(AppError::Conflict(format!(
            "order {} is already {}",
            order_id,
            order.status.as_str()
        )));
    }

    state
        .repo
        .update_order_status(&order_id, status, None)
        .await?;
    let tier = state.tier.current_tier(&order.seller_id).await?;
    state
        .stats
        .apply_order_outcome(&order.seller_id, tier, status)
        .await?;

    Ok(Json(StatusResponse {
        order_id: order_id.as_str().to_string(),
        status: status.as_str().to_string(),
    }))
}
