pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    ActorKind, ActorRef, EntryType, LedgerEntry, Money, OrderId, PartnerId, SellerId, Tier,
};
pub use error::AppError;
pub use gateway::{HttpPayoutGateway, MockPayoutGateway, PayoutGateway};
