use haulpay::api::{self, AppState};
use haulpay::config::Config;
use haulpay::db::init_db;
use haulpay::engine::{
    AdminEngine, BatchProcessor, CodReconciler, LedgerWriter, PayoutEngine, SettlementScheduler,
    StatsEngine, TierEvaluator,
};
use haulpay::gateway::{HttpPayoutGateway, MockPayoutGateway, PayoutGateway};
use haulpay::orchestration::Ticker;
use haulpay::Repository;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("initializing database")?;

    let repo = Arc::new(Repository::new(pool));
    let ledger = Arc::new(LedgerWriter::new(repo.clone()));
    let stats = Arc::new(StatsEngine::new(repo.clone()));

    let gateway: Arc<dyn PayoutGateway> = match &config.payout_gateway_url {
        Some(url) => Arc::new(HttpPayoutGateway::new(url.clone())),
        None => Arc::new(MockPayoutGateway::new()),
    };

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

    // Background ticks: due-batch runs and the tier evaluation sweep
    Ticker::new(
        batch.clone(),
        tier.clone(),
        config.batch_tick_secs,
        config.tier_eval_tick_secs,
    )
    .spawn();

    // Create router
    let app = api::create_router(AppState {
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
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
