pub mod admin;
pub mod cod;
pub mod health;
pub mod ledger;
pub mod orders;
pub mod sellers;
pub mod settlements;
pub mod withdrawals;

use crate::config::Config;
use crate::db::Repository;
use crate::engine::{
    AdminEngine, BatchProcessor, CodReconciler, LedgerWriter, PayoutEngine, SettlementScheduler,
    StatsEngine, TierEvaluator,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub ledger: Arc<LedgerWriter>,
    pub scheduler: Arc<SettlementScheduler>,
    pub batch: Arc<BatchProcessor>,
    pub cod: Arc<CodReconciler>,
    pub tier: Arc<TierEvaluator>,
    pub payout: Arc<PayoutEngine>,
    pub admin: Arc<AdminEngine>,
    pub stats: Arc<StatsEngine>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/orders", post(orders::create_order))
        .route("/v1/orders/:order_id/delivered", post(orders::order_delivered))
        .route("/v1/orders/:order_id/status", post(orders::update_status))
        .route("/v1/cod/collections", post(cod::record_collection))
        .route("/v1/cod/collections/:order_id/remit", post(cod::remit_collection))
        .route(
            "/v1/partners/:partner_id/withdrawals",
            post(withdrawals::request_withdrawal).get(withdrawals::list_withdrawals),
        )
        .route(
            "/v1/withdrawals/:withdrawal_id/approve",
            post(withdrawals::approve_withdrawal),
        )
        .route(
            "/v1/withdrawals/:withdrawal_id/reject",
            post(withdrawals::reject_withdrawal),
        )
        .route("/v1/ledger", get(ledger::query_ledger))
        .route("/v1/ledger/export", get(ledger::export_ledger))
        .route("/v1/sellers/:seller_id/stats", get(sellers::get_stats))
        .route(
            "/v1/sellers/:seller_id/stats/recompute",
            post(sellers::recompute_stats),
        )
        .route(
            "/v1/sellers/:seller_id/tier/evaluate",
            post(sellers::evaluate_tier),
        )
        .route(
            "/v1/sellers/:seller_id/tier/history",
            get(sellers::tier_history),
        )
        .route(
            "/v1/sellers/:seller_id/settlements",
            get(settlements::list_seller_settlements),
        )
        .route("/v1/settlements/run", post(settlements::run_batches))
        .route("/v1/admin/tier", post(admin::override_tier))
        .route("/v1/admin/account-status", post(admin::set_account_status))
        .route(
            "/v1/admin/settlements/:schedule_id/hold",
            post(admin::hold_settlement),
        )
        .route(
            "/v1/admin/settlements/:schedule_id/release",
            post(admin::release_settlement),
        )
        .route(
            "/v1/admin/settlements/:schedule_id/adjust",
            post(admin::adjust_settlement),
        )
        .route(
            "/v1/admin/withdrawals/:withdrawal_id/hold",
            post(admin::set_payout_hold),
        )
        .route(
            "/v1/admin/ledger-corrections",
            post(admin::ledger_correction),
        )
        .route("/v1/admin/overrides", get(admin::query_overrides))
        .layer(cors)
        .with_state(state)
}
