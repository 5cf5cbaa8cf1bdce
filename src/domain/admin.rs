//! Admin override audit records.
//!
//! Every manual mutation path produces exactly one override row capturing
//! the before/after snapshots and a non-empty justification, written before
//! live state is touched.

use crate::domain::AdminId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of record a manual override targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Seller,
    Partner,
    SettlementSchedule,
    Withdrawal,
    LedgerEntry,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Seller => "seller",
            TargetType::Partner => "partner",
            TargetType::SettlementSchedule => "settlement_schedule",
            TargetType::Withdrawal => "withdrawal",
            TargetType::LedgerEntry => "ledger_entry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seller" => Some(TargetType::Seller),
            "partner" => Some(TargetType::Partner),
            "settlement_schedule" => Some(TargetType::SettlementSchedule),
            "withdrawal" => Some(TargetType::Withdrawal),
            "ledger_entry" => Some(TargetType::LedgerEntry),
            _ => None,
        }
    }
}

/// The manual action taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    TierOverride,
    SettlementHold,
    SettlementRelease,
    SettlementAdjust,
    PayoutHold,
    PayoutRelease,
    AccountStatus,
    AccountDeletion,
    LedgerCorrection,
}

impl OverrideAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideAction::TierOverride => "tier_override",
            OverrideAction::SettlementHold => "settlement_hold",
            OverrideAction::SettlementRelease => "settlement_release",
            OverrideAction::SettlementAdjust => "settlement_adjust",
            OverrideAction::PayoutHold => "payout_hold",
            OverrideAction::PayoutRelease => "payout_release",
            OverrideAction::AccountStatus => "account_status",
            OverrideAction::AccountDeletion => "account_deletion",
            OverrideAction::LedgerCorrection => "ledger_correction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tier_override" => Some(OverrideAction::TierOverride),
            "settlement_hold" => Some(OverrideAction::SettlementHold),
            "settlement_release" => Some(OverrideAction::SettlementRelease),
            "settlement_adjust" => Some(OverrideAction::SettlementAdjust),
            "payout_hold" => Some(OverrideAction::PayoutHold),
            "payout_release" => Some(OverrideAction::PayoutRelease),
            "account_status" => Some(OverrideAction::AccountStatus),
            "account_deletion" => Some(OverrideAction::AccountDeletion),
            "ledger_correction" => Some(OverrideAction::LedgerCorrection),
            _ => None,
        }
    }
}

/// One audited manual correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminOverride {
    pub id: String,
    pub admin_id: AdminId,
    pub target_type: TargetType,
    pub target_id: String,
    pub action: OverrideAction,
    /// JSON snapshot of the mutated fields before the change.
    pub previous_value: serde_json::Value,
    /// JSON snapshot after the change.
    pub new_value: serde_json::Value,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_type_roundtrip() {
        for t in [
            TargetType::Seller,
            TargetType::Partner,
            TargetType::SettlementSchedule,
            TargetType::Withdrawal,
            TargetType::LedgerEntry,
        ] {
            assert_eq!(TargetType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_action_roundtrip() {
        for a in [
            OverrideAction::TierOverride,
            OverrideAction::SettlementHold,
            OverrideAction::SettlementRelease,
            OverrideAction::SettlementAdjust,
            OverrideAction::PayoutHold,
            OverrideAction::PayoutRelease,
            OverrideAction::AccountStatus,
            OverrideAction::AccountDeletion,
            OverrideAction::LedgerCorrection,
        ] {
            assert_eq!(OverrideAction::parse(a.as_str()), Some(a));
        }
        assert_eq!(OverrideAction::parse("tier"), None);
    }
}
