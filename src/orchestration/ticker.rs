//! Interval loops driving the batch processor and the tier evaluator.
//!
//! Tick failures are logged and the loops keep running; a broken run must
//! never take the service down.

use crate::engine::{BatchProcessor, TierEvaluator};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Ticker {
    batch: Arc<BatchProcessor>,
    tier: Arc<TierEvaluator>,
    batch_tick_secs: u64,
    tier_tick_secs: u64,
}

impl Ticker {
    pub fn new(
        batch: Arc<BatchProcessor>,
        tier: Arc<TierEvaluator>,
        batch_tick_secs: u64,
        tier_tick_secs: u64,
    ) -> Self {
        Self {
            batch,
            tier,
            batch_tick_secs,
            tier_tick_secs,
        }
    }

    /// Spawn both loops onto the runtime.
    pub fn spawn(self) {
        let batch = self.batch;
        let batch_tick = self.batch_tick_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(batch_tick));
            // The first tick fires immediately; skip it so startup does not
            // race the migration path.
            interval.tick().await;
            loop {
                interval.tick().await;
                match batch.process_due(Utc::now()).await {
                    Ok(outcomes) if outcomes.is_empty() => {}
                    Ok(outcomes) => {
                        info!(processed = outcomes.len(), "Settlement tick complete");
                    }
                    Err(e) => {
                        warn!(error = %e, "Settlement tick failed");
                    }
                }
            }
        });

        let tier = self.tier;
        let tier_tick = self.tier_tick_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(tier_tick));
            interval.tick().await;
            loop {
                interval.tick().await;
                match tier.evaluate_all(Utc::now(), "scheduler").await {
                    Ok(logs) => {
                        info!(evaluated = logs.len(), "Tier evaluation tick complete");
                    }
                    Err(e) => {
                        warn!(error = %e, "Tier evaluation tick failed");
                    }
                }
            }
        });
    }
}
