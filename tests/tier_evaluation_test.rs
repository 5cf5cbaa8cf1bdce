use chrono::{Duration, Utc};
use haulpay::db::init_db;
use haulpay::domain::{
    Money, Order, OrderId, OrderStatus, PaymentMode, SellerId, SettlementStatus, Tier,
};
use haulpay::engine::{StatsEngine, TierEvaluator};
use haulpay::{AppError, Repository};
use std::sync::Arc;
use tempfile::TempDir;

struct TestHarness {
    repo: Arc<Repository>,
    tier: TierEvaluator,
    _temp: TempDir,
}

async fn setup() -> TestHarness {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("test.db").to_string_lossy().to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let stats = Arc::new(StatsEngine::new(repo.clone()));
    let tier = TierEvaluator::new(repo.clone(), stats);

    TestHarness {
        repo,
        tier,
        _temp: temp,
    }
}

/// Seed `total` orders in the trailing window, `rto` of them returned, the
/// rest delivered.
async fn seed_window_orders(harness: &TestHarness, seller: &str, tier: Tier, total: i64, rto: i64) {
    let seller_id = SellerId::new(seller);
    harness
        .repo
        .insert_seller(&seller_id, tier, Utc::now())
        .await
        .unwrap();

    let created_at = Utc::now() - Duration::days(10);
    for i in 0..total {
        let order_id = format!("{}-o-{}", seller, i);
        harness
            .repo
            .insert_order(&Order {
                order_id: OrderId::new(order_id.clone()),
                seller_id: seller_id.clone(),
                partner_id: None,
                payment_mode: PaymentMode::Prepaid,
                order_value: Money::from_i64(500),
                shipping_cost: Money::from_i64(50),
                cod_amount: Money::zero(),
                distance_km: Money::zero(),
                status: OrderStatus::Created,
                delivered_at: None,
                settlement_status: SettlementStatus::Unscheduled,
                settlement_date: None,
                platform_fee: None,
                seller_earning: None,
                batch_id: None,
                created_at,
            })
            .await
            .unwrap();

        let status = if i < rto {
            OrderStatus::Rto
        } else {
            OrderStatus::Delivered
        };
        harness
            .repo
            .update_order_status(&OrderId::new(order_id), status, None)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_high_volume_low_rto_upgrades_to_gold() {
    let harness = setup().await;
    // 850 orders, 10% RTO
    seed_window_orders(&harness, "s-1", Tier::Bronze, 850, 85).await;

    let log = harness
        .tier
        .evaluate_seller(&SellerId::new("s-1"), Utc::now(), "test")
        .await
        .unwrap();

    assert_eq!(log.previous_tier, Tier::Bronze);
    assert_eq!(log.new_tier, Tier::Gold);
    assert_eq!(log.monthly_orders, 850);
    assert!(log.auto_upgrade);
    assert!((log.rto_percent - 10.0).abs() < 0.01);

    let seller = harness
        .repo
        .get_seller(&SellerId::new("s-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seller.tier, Tier::Gold);
    assert!(seller.tier_updated_at.is_some());
}

#[tokio::test]
async fn test_rto_above_threshold_blocks_upgrade() {
    let harness = setup().await;
    // 820 orders at ~16.1% RTO: volume qualifies for gold, RTO disqualifies.
    seed_window_orders(&harness, "s-1", Tier::Bronze, 820, 132).await;

    let log = harness
        .tier
        .evaluate_seller(&SellerId::new("s-1"), Utc::now(), "test")
        .await
        .unwrap();

    assert_eq!(log.previous_tier, Tier::Bronze);
    assert_eq!(log.new_tier, Tier::Bronze);
    assert!(!log.auto_upgrade);
    assert!(log.rto_percent > 15.0);

    // Unchanged evaluations are still logged.
    let history = harness
        .repo
        .query_tier_evaluations(&SellerId::new("s-1"))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_gold_low_volume_downgrades_to_silver() {
    let harness = setup().await;
    // 450 orders at ~2% RTO: below the gold volume floor.
    seed_window_orders(&harness, "s-1", Tier::Gold, 450, 9).await;

    let log = harness
        .tier
        .evaluate_seller(&SellerId::new("s-1"), Utc::now(), "test")
        .await
        .unwrap();

    assert_eq!(log.previous_tier, Tier::Gold);
    assert_eq!(log.new_tier, Tier::Silver);
    assert!(!log.auto_upgrade);

    let seller = harness
        .repo
        .get_seller(&SellerId::new("s-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seller.tier, Tier::Silver);
}

#[tokio::test]
async fn test_quiet_month_zero_orders() {
    let harness = setup().await;
    harness
        .repo
        .insert_seller(&SellerId::new("s-1"), Tier::Silver, Utc::now())
        .await
        .unwrap();

    let log = harness
        .tier
        .evaluate_seller(&SellerId::new("s-1"), Utc::now(), "test")
        .await
        .unwrap();

    // Zero orders means 0% RTO, but the volume floor still downgrades.
    assert_eq!(log.monthly_orders, 0);
    assert_eq!(log.rto_percent, 0.0);
    assert_eq!(log.new_tier, Tier::Bronze);
}

#[tokio::test]
async fn test_unknown_seller_is_not_found() {
    let harness = setup().await;
    let err = harness
        .tier
        .evaluate_seller(&SellerId::new("ghost"), Utc::now(), "test")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_sweep_covers_all_sellers_and_logs_each() {
    let harness = setup().await;
    seed_window_orders(&harness, "s-1", Tier::Bronze, 400, 20).await;
    seed_window_orders(&harness, "s-2", Tier::Bronze, 10, 0).await;

    let logs = harness.tier.evaluate_all(Utc::now(), "scheduler").await.unwrap();
    assert_eq!(logs.len(), 2);

    let s1 = logs
        .iter()
        .find(|l| l.seller_id == SellerId::new("s-1"))
        .unwrap();
    assert_eq!(s1.new_tier, Tier::Silver);
    assert_eq!(s1.triggered_by, "scheduler");

    let s2 = logs
        .iter()
        .find(|l| l.seller_id == SellerId::new("s-2"))
        .unwrap();
    assert_eq!(s2.new_tier, Tier::Bronze);
}

#[tokio::test]
async fn test_old_orders_fall_out_of_window() {
    let harness = setup().await;
    let seller_id = SellerId::new("s-1");
    harness
        .repo
        .insert_seller(&seller_id, Tier::Bronze, Utc::now())
        .await
        .unwrap();

    // 400 delivered orders, but all created two months ago.
    let created_at = Utc::now() - Duration::days(60);
    for i in 0..400 {
        let order_id = format!("old-o-{}", i);
        harness
            .repo
            .insert_order(&Order {
                order_id: OrderId::new(order_id.clone()),
                seller_id: seller_id.clone(),
                partner_id: None,
                payment_mode: PaymentMode::Prepaid,
                order_value: Money::from_i64(500),
                shipping_cost: Money::from_i64(50),
                cod_amount: Money::zero(),
                distance_km: Money::zero(),
                status: OrderStatus::Created,
                delivered_at: None,
                settlement_status: SettlementStatus::Unscheduled,
                settlement_date: None,
                platform_fee: None,
                seller_earning: None,
                batch_id: None,
                created_at,
            })
            .await
            .unwrap();
        harness
            .repo
            .update_order_status(&OrderId::new(order_id), OrderStatus::Delivered, None)
            .await
            .unwrap();
    }

    let log = harness
        .tier
        .evaluate_seller(&seller_id, Utc::now(), "test")
        .await
        .unwrap();
    assert_eq!(log.monthly_orders, 0);
    assert_eq!(log.new_tier, Tier::Bronze);
}
