use chrono::Utc;
use haulpay::db::init_db;
use haulpay::domain::{
    Money, Order, OrderId, OrderStatus, PartnerId, PaymentMode, RemittanceStatus, SellerId,
    SettlementStatus, Tier,
};
use haulpay::engine::{CodReconciler, StatsEngine};
use haulpay::{AppError, Repository};
use std::sync::Arc;
use tempfile::TempDir;

struct TestHarness {
    repo: Arc<Repository>,
    cod: CodReconciler,
    _temp: TempDir,
}

async fn setup() -> TestHarness {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("test.db").to_string_lossy().to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let stats = Arc::new(StatsEngine::new(repo.clone()));
    let cod = CodReconciler::new(repo.clone(), stats, Money::from_i64(2), Money::from_i64(5));

    TestHarness {
        repo,
        cod,
        _temp: temp,
    }
}

async fn seed_order(harness: &TestHarness, order_id: &str, mode: PaymentMode, platform_fee: Option<Money>) {
    harness
        .repo
        .insert_seller(&SellerId::new("s-1"), Tier::Bronze, Utc::now())
        .await
        .unwrap();
    harness
        .repo
        .insert_partner(&PartnerId::new("p-1"), Utc::now())
        .await
        .unwrap();
    harness
        .repo
        .insert_order(&Order {
            order_id: OrderId::new(order_id),
            seller_id: SellerId::new("s-1"),
            partner_id: Some(PartnerId::new("p-1")),
            payment_mode: mode,
            order_value: Money::from_i64(1000),
            shipping_cost: Money::from_i64(150),
            cod_amount: Money::from_i64(1000),
            distance_km: Money::from_i64(10),
            status: OrderStatus::Delivered,
            delivered_at: Some(Utc::now()),
            settlement_status: SettlementStatus::Unscheduled,
            settlement_date: None,
            platform_fee: None,
            seller_earning: None,
            batch_id: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    if let Some(fee) = platform_fee {
        harness
            .repo
            .stamp_order_scheduled(
                &OrderId::new(order_id),
                fee,
                Money::from_i64(800),
                chrono::NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
                "b-1",
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_reference_net_settlement() {
    let harness = setup().await;
    seed_order(&harness, "o-1", PaymentMode::Cod, Some(Money::from_i64(50))).await;

    let collection = harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::from_i64(1000),
            Utc::now(),
        )
        .await
        .unwrap();

    // collected=1000, shipping=150, platformFee=50, handling=20 => 780
    assert_eq!(collection.cod_handling_fee, Money::from_i64(20));
    assert_eq!(collection.net_settlement, Money::from_i64(780));
    assert_eq!(collection.remittance_status, RemittanceStatus::Collected);
    assert_eq!(collection.cod_amount, Money::from_i64(1000));

    let stats = harness
        .repo
        .get_seller_stats(&SellerId::new("s-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_cod_collected, Money::from_i64(1000));
    assert_eq!(stats.pending_cod_remittance, Money::from_i64(1000));
}

#[tokio::test]
async fn test_duplicate_collection_is_conflict() {
    let harness = setup().await;
    seed_order(&harness, "o-1", PaymentMode::Cod, Some(Money::from_i64(50))).await;

    harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::from_i64(1000),
            Utc::now(),
        )
        .await
        .unwrap();

    let err = harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::from_i64(900),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Stats were bumped exactly once.
    let stats = harness
        .repo
        .get_seller_stats(&SellerId::new("s-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_cod_collected, Money::from_i64(1000));
}

#[tokio::test]
async fn test_prepaid_order_is_rejected() {
    let harness = setup().await;
    seed_order(&harness, "o-1", PaymentMode::Prepaid, None).await;

    let err = harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::from_i64(1000),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let harness = setup().await;
    seed_order(&harness, "o-1", PaymentMode::Cod, None).await;

    let err = harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::zero(),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_unscheduled_order_falls_back_to_configured_fee() {
    let harness = setup().await;
    // COD arrives before the settlement path stamped a platform fee.
    seed_order(&harness, "o-1", PaymentMode::Cod, None).await;

    let collection = harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::from_i64(1000),
            Utc::now(),
        )
        .await
        .unwrap();

    // Fee computed from config: 5% of 1000 = 50, same net as stamped case.
    assert_eq!(collection.platform_fee, Money::from_i64(50));
    assert_eq!(collection.net_settlement, Money::from_i64(780));
}

#[tokio::test]
async fn test_short_collection_floors_at_zero() {
    let harness = setup().await;
    seed_order(&harness, "o-1", PaymentMode::Cod, Some(Money::from_i64(50))).await;

    // Partner collected far less than declared; fees exceed the cash.
    let collection = harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::from_i64(100),
            Utc::now(),
        )
        .await
        .unwrap();

    assert_eq!(collection.net_settlement, Money::zero());
    // Declared vs collected discrepancy stays visible.
    assert_eq!(collection.cod_amount, Money::from_i64(1000));
    assert_eq!(collection.collected_amount, Money::from_i64(100));
}

#[tokio::test]
async fn test_remittance_drains_pending() {
    let harness = setup().await;
    seed_order(&harness, "o-1", PaymentMode::Cod, Some(Money::from_i64(50))).await;

    harness
        .cod
        .record_collection(
            &OrderId::new("o-1"),
            &PartnerId::new("p-1"),
            Money::from_i64(1000),
            Utc::now(),
        )
        .await
        .unwrap();

    let remitted = harness
        .cod
        .mark_remitted(&OrderId::new("o-1"), Utc::now())
        .await
        .unwrap();
    assert_eq!(remitted.remittance_status, RemittanceStatus::Remitted);
    assert!(remitted.remitted_at.is_some());

    let stats = harness
        .repo
        .get_seller_stats(&SellerId::new("s-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_cod_collected, Money::from_i64(1000));
    assert_eq!(stats.pending_cod_remittance, Money::zero());

    // Remitting twice is a conflict.
    let err = harness
        .cod
        .mark_remitted(&OrderId::new("o-1"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
