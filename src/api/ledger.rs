use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{ActorKind, ActorRef, EntryType, LedgerEntry};
use crate::error::AppError;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerQuery {
    pub actor_kind: String,
    pub actor_id: String,
    pub entry_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryDto {
    pub seq: i64,
    pub entry_type: String,
    pub amount: String,
    pub description: String,
    pub balance_before: String,
    pub balance_after: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryDto {
    fn from(e: LedgerEntry) -> Self {
        LedgerEntryDto {
            seq: e.seq,
            entry_type: e.entry_type.as_str().to_string(),
            amount: e.amount.to_canonical_string(),
            description: e.description,
            balance_before: e.balance_before.to_canonical_string(),
            balance_after: e.balance_after.to_canonical_string(),
            pending_after: e.buckets.map(|b| b.pending_after.to_canonical_string()),
            available_after: e.buckets.map(|b| b.available_after.to_canonical_string()),
            order_id: e.order_id.map(|o| o.as_str().to_string()),
            batch_id: e.batch_id,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub actor_kind: String,
    pub actor_id: String,
    pub current_balance: String,
    pub total_entries: i64,
    pub page: i64,
    pub limit: i64,
    pub entries: Vec<LedgerEntryDto>,
}

fn parse_query(params: &LedgerQuery) -> Result<(ActorRef, Option<EntryType>, i64, i64), AppError> {
    let kind = ActorKind::parse(&params.actor_kind)
        .ok_or_else(|| AppError::Validation(format!("invalid actor kind {}", params.actor_kind)))?;
    let actor = ActorRef {
        kind,
        id: params.actor_id.clone(),
    };

    let entry_type = match &params.entry_type {
        Some(raw) => Some(
            EntryType::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("invalid entry type {}", raw)))?,
        ),
        None => None,
    };

    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    Ok((actor, entry_type, page, limit))
}

pub async fn query_ledger(
    Query(params): Query<LedgerQuery>,
    State(state): State<AppState>,
) -> Result<Json<LedgerResponse>, AppError> {
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::Validation("from must be <= to".to_string()));
        }
    }

    let (actor, entry_type, page, limit) = parse_query(&params)?;

    let entries = state
        .repo
        .query_ledger_entries(
            &actor,
            entry_type,
            params.from,
            params.to,
            limit,
            (page - 1) * limit,
        )
        .await?;
    let total_entries = state
        .repo
        .count_ledger_entries(&actor, entry_type, params.from, params.to)
        .await?;
    let current_balance = state.ledger.current_balance(&actor).await?;

    Ok(Json(LedgerResponse {
        actor_kind: actor.kind.as_str().to_string(),
        actor_id: actor.id,
        current_balance: current_balance.to_canonical_string(),
        total_entries,
        page,
        limit,
        entries: entries.into_iter().map(Into::into).collect(),
    }))
}

/// CSV statement export of the full chain for one actor.
pub async fn export_ledger(
    Query(params): Query<LedgerQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let (actor, _, _, _) = parse_query(&params)?;

    let entries = state.repo.ledger_chain(&actor).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "seq",
            "created_at",
            "entry_type",
            "amount",
            "balance_before",
            "balance_after",
            "order_id",
            "batch_id",
            "description",
        ])
        .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;

    for entry in entries {
        writer
            .write_record([
                entry.seq.to_string(),
                entry.created_at.to_rfc3339(),
                entry.entry_type.as_str().to_string(),
                entry.amount.to_canonical_string(),
                entry.balance_before.to_canonical_string(),
                entry.balance_after.to_canonical_string(),
                entry
                    .order_id
                    .map(|o| o.as_str().to_string())
                    .unwrap_or_default(),
                entry.batch_id.unwrap_or_default(),
                entry.description,
            ])
            .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;
    }

    let body = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV flush failed: {}", e)))?;

    let filename = format!("ledger-{}-{}.csv", actor.kind, actor.id);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}
