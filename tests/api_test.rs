use axum::http::StatusCode;
use haulpay::api::{self, AppState};
use haulpay::config::Config;
use haulpay::db::init_db;
use haulpay::engine::{
    AdminEngine, BatchProcessor, CodReconciler, LedgerWriter, PayoutEngine, SettlementScheduler,
    StatsEngine, TierEvaluator,
};
use haulpay::gateway::{MockPayoutGateway, PayoutGateway};
use haulpay::Repository;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), db_path.clone());
    let config = Config::from_env_map(env).expect("config");

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let ledger = Arc::new(LedgerWriter::new(repo.clone()));
    let stats = Arc::new(StatsEngine::new(repo.clone()));
    let gateway: Arc<dyn PayoutGateway> = Arc::new(MockPayoutGateway::new());

    let scheduler = Arc::new(SettlementScheduler::new(
        repo.clone(),
        ledger.clone(),
        stats.clone(),
        config.platform_fee_pct,
    ));
    let batch = Arc::new(BatchProcessor::new(
        repo.clone(),
        ledger.clone(),
        stats.clone(),
    ));
    let cod = Arc::new(CodReconciler::new(
        repo.clone(),
        stats.clone(),
        config.cod_handling_fee_pct,
        config.platform_fee_pct,
    ));
    let tier = Arc::new(TierEvaluator::new(repo.clone(), stats.clone()));
    let payout = Arc::new(PayoutEngine::new(
        repo.clone(),
        ledger.clone(),
        gateway,
        config.partner_rate_per_km,
    ));
    let admin = Arc::new(AdminEngine::new(
        repo.clone(),
        ledger.clone(),
        stats.clone(),
    ));

    let state = AppState {
        repo,
        config,
        ledger,
        scheduler,
        batch,
        cod,
        tier,
        payout,
        admin,
        stats,
    };

    (api::create_router(state), temp_dir)
}

fn post_json(uri: &str, body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _temp) = setup_test_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let (app, _temp) = setup_test_app().await;

    let response = app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_order_delivery_flow_over_http() {
    let (app, _temp) = setup_test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/orders",
            serde_json::json!({
                "orderId": "o-1",
                "sellerId": "s-1",
                "partnerId": "p-1",
                "paymentMode": "prepaid",
                "orderValue": 1000,
                "shippingCost": 150,
                "distanceKm": 10
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["created"], true);

    let response = app
        .clone()
        .oneshot(post_json("/v1/orders/o-1/delivered", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["platformFee"], "50");
    assert_eq!(body["sellerEarning"], "800");
    assert_eq!(body["tier"], "bronze");
    // 10 km * 9 + 25 slab
    assert_eq!(body["partnerEarning"], "115");

    // Re-delivering is a conflict.
    let response = app
        .clone()
        .oneshot(post_json("/v1/orders/o-1/delivered", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The seller ledger shows the earning.
    let response = app
        .clone()
        .oneshot(get("/v1/ledger?actorKind=seller&actorId=s-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["currentBalance"], "800");
    assert_eq!(body["totalEntries"], 1);
    assert_eq!(body["entries"][0]["entryType"], "earning");

    // Stats reflect the scheduled settlement.
    let response = app
        .clone()
        .oneshot(get("/v1/sellers/s-1/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["pendingSettlement"], "800");
    assert_eq!(body["deliveredOrders"], 1);
}

#[tokio::test]
async fn test_unknown_order_returns_not_found() {
    let (app, _temp) = setup_test_app().await;

    let response = app
        .oneshot(post_json("/v1/orders/ghost/delivered", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_payment_mode_is_bad_request() {
    let (app, _temp) = setup_test_app().await;

    let response = app
        .oneshot(post_json(
            "/v1/orders",
            serde_json::json!({
                "orderId": "o-1",
                "sellerId": "s-1",
                "paymentMode": "card",
                "orderValue": 1000,
                "shippingCost": 150
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cod_flow_over_http() {
    let (app, _temp) = setup_test_app().await;

    app.clone()
        .oneshot(post_json(
            "/v1/orders",
            serde_json::json!({
                "orderId": "o-1",
                "sellerId": "s-1",
                "partnerId": "p-1",
                "paymentMode": "cod",
                "orderValue": 1000,
                "shippingCost": 150,
                "codAmount": 1000,
                "distanceKm": 8
            }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/cod/collections",
            serde_json::json!({
                "orderId": "o-1",
                "partnerId": "p-1",
                "collectedAmount": 1000
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["codHandlingFee"], "20");
    assert_eq!(body["netSettlement"], "780");
    assert_eq!(body["remittanceStatus"], "collected");

    // Duplicate report conflicts.
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/cod/collections",
            serde_json::json!({
                "orderId": "o-1",
                "partnerId": "p-1",
                "collectedAmount": 1000
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/cod/collections/o-1/remit",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["remittanceStatus"], "remitted");
}

#[tokio::test]
async fn test_withdrawal_flow_over_http() {
    let (app, _temp) = setup_test_app().await;

    // Build a partner balance through a delivered order.
    app.clone()
        .oneshot(post_json(
            "/v1/orders",
            serde_json::json!({
                "orderId": "o-1",
                "sellerId": "s-1",
                "partnerId": "p-1",
                "paymentMode": "prepaid",
                "orderValue": 1000,
                "shippingCost": 150,
                "distanceKm": 20
            }),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/v1/orders/o-1/delivered", serde_json::json!({})))
        .await
        .unwrap();

    // 20 km * 9 + 50 slab = 230
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/partners/p-1/withdrawals",
            serde_json::json!({"amount": 200, "bankDetails": "acct-7"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let withdrawal_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["balanceAtRequest"], "230");

    // Second request while pending conflicts.
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/partners/p-1/withdrawals",
            serde_json::json!({"amount": 10}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/v1/withdrawals/{}/approve", withdrawal_id),
            serde_json::json!({"adminId": "admin-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["balanceAfterPayout"], "30");
    assert!(body["transactionRef"].as_str().unwrap().starts_with("mock-txn-"));
}

#[tokio::test]
async fn test_ledger_export_returns_csv() {
    let (app, _temp) = setup_test_app().await;

    app.clone()
        .oneshot(post_json(
            "/v1/orders",
            serde_json::json!({
                "orderId": "o-1",
                "sellerId": "s-1",
                "paymentMode": "prepaid",
                "orderValue": 1000,
                "shippingCost": 150
            }),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/v1/orders/o-1/delivered", serde_json::json!({})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/v1/ledger/export?actorKind=seller&actorId=s-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/csv"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("seq,created_at,entry_type"));
    assert!(text.contains("earning"));
    assert!(text.contains("800"));
}

#[tokio::test]
async fn test_admin_tier_override_over_http() {
    let (app, _temp) = setup_test_app().await;

    app.clone()
        .oneshot(post_json(
            "/v1/orders",
            serde_json::json!({
                "orderId": "o-1",
                "sellerId": "s-1",
                "paymentMode": "prepaid",
                "orderValue": 1000,
                "shippingCost": 150
            }),
        ))
        .await
        .unwrap();

    // Missing reason is rejected.
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/admin/tier",
            serde_json::json!({
                "adminId": "admin-1",
                "sellerId": "s-1",
                "tier": "gold",
                "reason": ""
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/admin/tier",
            serde_json::json!({
                "adminId": "admin-1",
                "sellerId": "s-1",
                "tier": "gold",
                "reason": "enterprise onboarding"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["action"], "tier_override");
    assert_eq!(body["newValue"]["tier"], "gold");

    let response = app
        .clone()
        .oneshot(get("/v1/admin/overrides?targetType=seller&targetId=s-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["overrides"].as_array().unwrap().len(), 1);
}
