//! Pure domain types and calculations. No I/O lives here.

pub mod admin;
pub mod cod;
pub mod ledger;
pub mod money;
pub mod order;
pub mod party;
pub mod payout;
pub mod primitives;
pub mod settlement;
pub mod stats;
pub mod tier;
pub mod withdrawal;

pub use admin::{AdminOverride, OverrideAction, TargetType};
pub use cod::{compute_cod_settlement, CodCollection, RemittanceStatus};
pub use ledger::{BucketSnapshot, EntryType, LedgerEntry};
pub use money::Money;
pub use order::{Order, OrderStatus, PaymentMode, SettlementStatus};
pub use party::{AccountStatus, Partner, Seller};
pub use payout::{partner_earning, slab_bonus};
pub use primitives::{ActorKind, ActorRef, AdminId, OrderId, PartnerId, SellerId};
pub use settlement::{settlement_date_for, ScheduleStatus, SettlementSchedule};
pub use stats::SellerStats;
pub use tier::{evaluate_tier, Tier, TierEvaluationLog, TierMetrics};
pub use withdrawal::{WithdrawalRequest, WithdrawalStatus};
