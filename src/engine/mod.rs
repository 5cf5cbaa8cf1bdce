//! Core settlement engines.

pub mod admin;
pub mod batch;
pub mod cod;
pub mod ledger_writer;
pub mod payout;
pub mod scheduler;
pub mod stats;
pub mod tier;

pub use admin::AdminEngine;
pub use batch::{BatchOutcome, BatchProcessor};
pub use cod::CodReconciler;
pub use ledger_writer::LedgerWriter;
pub use payout::PayoutEngine;
pub use scheduler::{ScheduledSettlement, SettlementScheduler};
pub use stats::StatsEngine;
pub use tier::TierEvaluator;
