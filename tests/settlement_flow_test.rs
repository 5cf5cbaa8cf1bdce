use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use haulpay::db::init_db;
use haulpay::domain::{
    ActorRef, EntryType, Money, Order, OrderId, OrderStatus, PartnerId, PaymentMode,
    ScheduleStatus, SellerId, SettlementStatus, Tier,
};
use haulpay::engine::{LedgerWriter, SettlementScheduler, StatsEngine};
use haulpay::{AppError, Repository};
use std::sync::Arc;
use tempfile::TempDir;

struct TestHarness {
    repo: Arc<Repository>,
    ledger: Arc<LedgerWriter>,
    scheduler: SettlementScheduler,
    _temp: TempDir,
}

async fn setup() -> TestHarness {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("test.db").to_string_lossy().to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let ledger = Arc::new(LedgerWriter::new(repo.clone()));
    let stats = Arc::new(StatsEngine::new(repo.clone()));
    let scheduler = SettlementScheduler::new(
        repo.clone(),
        ledger.clone(),
        stats,
        Money::from_i64(5),
    );

    TestHarness {
        repo,
        ledger,
        scheduler,
        _temp: temp,
    }
}

fn order(order_id: &str, seller: &str, value: i64, shipping: i64) -> Order {
    Order {
        order_id: OrderId::new(order_id),
        seller_id: SellerId::new(seller),
        partner_id: Some(PartnerId::new("p-1")),
        payment_mode: PaymentMode::Prepaid,
        order_value: Money::from_i64(value),
        shipping_cost: Money::from_i64(shipping),
        cod_amount: Money::zero(),
        distance_km: Money::from_i64(10),
        status: OrderStatus::Created,
        delivered_at: None,
        settlement_status: SettlementStatus::Unscheduled,
        settlement_date: None,
        platform_fee: None,
        seller_earning: None,
        batch_id: None,
        created_at: Utc::now(),
    }
}

async fn seed_delivered_order(
    harness: &TestHarness,
    order_id: &str,
    seller: &str,
    tier: Tier,
    value: i64,
    shipping: i64,
    delivered_at: DateTime<Utc>,
) {
    harness
        .repo
        .insert_seller(&SellerId::new(seller), tier, Utc::now())
        .await
        .unwrap();
    harness
        .repo
        .insert_partner(&PartnerId::new("p-1"), Utc::now())
        .await
        .unwrap();
    harness
        .repo
        .insert_order(&order(order_id, seller, value, shipping))
        .await
        .unwrap();
    harness
        .repo
        .update_order_status(
            &OrderId::new(order_id),
            OrderStatus::Delivered,
            Some(delivered_at),
        )
        .await
        .unwrap();
}

fn friday_2024_03_01() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn test_delivery_schedules_settlement_with_reference_numbers() {
    let harness = setup().await;
    let delivered = friday_2024_03_01();
    seed_delivered_order(&harness, "o-1", "s-1", Tier::Bronze, 1000, 150, delivered).await;

    let scheduled = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-1"), delivered)
        .await
        .unwrap();

    // platformFee = round2(1000 * 5%) = 50, earning = 1000 - 150 - 50 = 800
    assert_eq!(scheduled.platform_fee, Money::from_i64(50));
    assert_eq!(scheduled.seller_earning, Money::from_i64(800));
    // bronze delivered Friday 2024-03-01 matures Friday 2024-03-08
    assert_eq!(
        scheduled.settlement_date,
        NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()
    );

    let loaded = harness
        .repo
        .get_order(&OrderId::new("o-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.settlement_status, SettlementStatus::Scheduled);
    assert_eq!(loaded.platform_fee, Some(Money::from_i64(50)));
    assert_eq!(loaded.batch_id.as_deref(), Some(scheduled.batch_id.as_str()));

    let schedule = harness
        .repo
        .get_schedule(&scheduled.batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(schedule.status, ScheduleStatus::Scheduled);
    assert_eq!(schedule.total_amount, Money::from_i64(800));
    assert_eq!(schedule.order_ids, vec![OrderId::new("o-1")]);
    assert_eq!(schedule.tier_at_creation, Tier::Bronze);

    // The earning entry credits balance and pending.
    let actor = ActorRef::seller(&SellerId::new("s-1"));
    let entry = harness
        .repo
        .latest_ledger_entry(&actor)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.entry_type, EntryType::Earning);
    assert_eq!(entry.amount, Money::from_i64(800));
    let buckets = entry.buckets.unwrap();
    assert_eq!(buckets.pending_after, Money::from_i64(800));
    assert_eq!(buckets.available_after, Money::zero());
}

#[tokio::test]
async fn test_second_trigger_is_conflict_with_single_earning_entry() {
    let harness = setup().await;
    let delivered = friday_2024_03_01();
    seed_delivered_order(&harness, "o-1", "s-1", Tier::Bronze, 1000, 150, delivered).await;

    harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-1"), delivered)
        .await
        .unwrap();
    let err = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-1"), delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let actor = ActorRef::seller(&SellerId::new("s-1"));
    let chain = harness.repo.ledger_chain(&actor).await.unwrap();
    assert_eq!(chain.len(), 1, "exactly one earning entry");
    assert_eq!(
        harness.ledger.current_balance(&actor).await.unwrap(),
        Money::from_i64(800)
    );
}

#[tokio::test]
async fn test_undelivered_order_is_conflict() {
    let harness = setup().await;
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
        .insert_order(&order("o-1", "s-1", 1000, 150))
        .await
        .unwrap();

    let err = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-1"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // No state was touched.
    let actor = ActorRef::seller(&SellerId::new("s-1"));
    assert!(harness.repo.ledger_chain(&actor).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_order_is_not_found() {
    let harness = setup().await;
    let err = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("ghost"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_same_maturity_orders_share_one_batch() {
    let harness = setup().await;
    let delivered = friday_2024_03_01();
    seed_delivered_order(&harness, "o-1", "s-1", Tier::Bronze, 1000, 150, delivered).await;

    let first = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-1"), delivered)
        .await
        .unwrap();

    harness
        .repo
        .insert_order(&order("o-2", "s-1", 500, 100))
        .await
        .unwrap();
    harness
        .repo
        .update_order_status(&OrderId::new("o-2"), OrderStatus::Delivered, Some(delivered))
        .await
        .unwrap();
    let second = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-2"), delivered)
        .await
        .unwrap();

    assert_eq!(first.batch_id, second.batch_id);

    let schedule = harness
        .repo
        .get_schedule(&first.batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(schedule.order_ids.len(), 2);
    // 800 + (500 - 100 - 25) = 1175
    assert_eq!(schedule.total_amount, Money::from_i64(1175));
}

#[tokio::test]
async fn test_gold_tier_and_weekend_shift() {
    let harness = setup().await;

    // Gold delivered Wednesday 2024-03-06: +3 lands Saturday, shifts to
    // Monday 2024-03-11.
    let delivered = Utc.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap();
    seed_delivered_order(&harness, "o-1", "s-1", Tier::Gold, 1000, 150, delivered).await;

    let scheduled = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-1"), delivered)
        .await
        .unwrap();
    assert_eq!(
        scheduled.settlement_date,
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    );
    assert_eq!(scheduled.tier, Tier::Gold);
}

#[tokio::test]
async fn test_earning_floors_at_zero() {
    let harness = setup().await;
    let delivered = friday_2024_03_01();
    // shipping exceeds order value
    seed_delivered_order(&harness, "o-1", "s-1", Tier::Bronze, 100, 200, delivered).await;

    let scheduled = harness
        .scheduler
        .schedule_on_delivery(&OrderId::new("o-1"), delivered)
        .await
        .unwrap();
    assert_eq!(scheduled.seller_earning, Money::zero());
}
