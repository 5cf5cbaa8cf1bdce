//! Seller and delivery partner records.

use crate::domain::{PartnerId, SellerId, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account standing, mutated only through the admin override path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    OnHold,
    Restricted,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::OnHold => "on_hold",
            AccountStatus::Restricted => "restricted",
            AccountStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "on_hold" => Some(AccountStatus::OnHold),
            "restricted" => Some(AccountStatus::Restricted),
            "deleted" => Some(AccountStatus::Deleted),
            _ => None,
        }
    }
}

/// A seller account with its current settlement tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub seller_id: SellerId,
    pub tier: Tier,
    pub tier_updated_at: Option<DateTime<Utc>>,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

/// A delivery partner account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub partner_id: PartnerId,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
}
