//! Seller performance tiers and the monthly evaluation pipeline.
//!
//! The evaluation is an ordered two-stage pipeline: an upgrade candidate is
//! computed first, then the downgrade rule is applied to that candidate and
//! may override it. The two stages are never evaluated simultaneously.

use crate::domain::SellerId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Seller performance class controlling settlement speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    /// Days between delivery and settlement maturity for this tier.
    pub fn settlement_days(&self) -> i64 {
        match self {
            Tier::Bronze => 7,
            Tier::Silver => 5,
            Tier::Gold => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bronze" => Some(Tier::Bronze),
            "silver" => Some(Tier::Silver),
            "gold" => Some(Tier::Gold),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trailing-month order counts feeding tier evaluation.
///
/// These are window counts, not lifetime counts; dashboard percentages are
/// computed elsewhere over full history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierMetrics {
    pub orders: i64,
    pub delivered: i64,
    pub rto: i64,
    pub cancelled: i64,
}

impl TierMetrics {
    /// RTO percentage over the window, 0 when there were no orders.
    pub fn rto_percent(&self) -> f64 {
        if self.orders == 0 {
            0.0
        } else {
            100.0 * self.rto as f64 / self.orders as f64
        }
    }
}

/// Upgrade stage: best tier the window metrics qualify for.
///
/// Never moves an existing gold seller down; that is the downgrade
/// stage's decision.
fn upgrade_candidate(current: Tier, metrics: &TierMetrics) -> Tier {
    let rto = metrics.rto_percent();
    let candidate = if metrics.orders > 800 && rto <= 15.0 {
        Tier::Gold
    } else if metrics.orders > 300 && rto <= 15.0 {
        Tier::Silver
    } else {
        current
    };
    candidate.max(current)
}

/// Downgrade stage: applied to the upgrade candidate, may override it.
fn apply_downgrade(candidate: Tier, metrics: &TierMetrics) -> Tier {
    let rto = metrics.rto_percent();
    match candidate {
        Tier::Gold if metrics.orders < 500 || rto > 15.0 => Tier::Silver,
        Tier::Silver if metrics.orders < 150 || rto > 20.0 => Tier::Bronze,
        other => other,
    }
}

/// Full evaluation pipeline: upgrade candidate, then downgrade override.
pub fn evaluate_tier(current: Tier, metrics: &TierMetrics) -> Tier {
    apply_downgrade(upgrade_candidate(current, metrics), metrics)
}

/// Append-only record of one tier evaluation, written whether or not the
/// tier changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierEvaluationLog {
    pub id: i64,
    pub seller_id: SellerId,
    pub evaluated_at: DateTime<Utc>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub previous_tier: Tier,
    pub new_tier: Tier,
    pub monthly_orders: i64,
    pub rto_percent: f64,
    pub reason: String,
    pub auto_upgrade: bool,
    pub triggered_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(orders: i64, rto: i64) -> TierMetrics {
        TierMetrics {
            orders,
            delivered: orders - rto,
            rto,
            cancelled: 0,
        }
    }

    #[test]
    fn test_settlement_days() {
        assert_eq!(Tier::Bronze.settlement_days(), 7);
        assert_eq!(Tier::Silver.settlement_days(), 5);
        assert_eq!(Tier::Gold.settlement_days(), 3);
    }

    #[test]
    fn test_rto_percent_zero_orders() {
        assert_eq!(TierMetrics::default().rto_percent(), 0.0);
    }

    #[test]
    fn test_bronze_high_volume_low_rto_reaches_gold() {
        // 850 orders at 10% RTO
        let m = metrics(850, 85);
        assert_eq!(evaluate_tier(Tier::Bronze, &m), Tier::Gold);
    }

    #[test]
    fn test_high_volume_but_rto_over_threshold_stays_put() {
        // 820 orders at ~16% RTO: blocked from gold and silver, and bronze
        // has no downgrade rule.
        let m = metrics(820, 132);
        assert!(m.rto_percent() > 15.0);
        assert_eq!(evaluate_tier(Tier::Bronze, &m), Tier::Bronze);
    }

    #[test]
    fn test_mid_volume_reaches_silver() {
        let m = metrics(400, 20);
        assert_eq!(evaluate_tier(Tier::Bronze, &m), Tier::Silver);
    }

    #[test]
    fn test_gold_quiet_month_downgrades_to_silver() {
        let m = metrics(450, 10);
        assert_eq!(evaluate_tier(Tier::Gold, &m), Tier::Silver);
    }

    #[test]
    fn test_gold_high_rto_downgrades_even_with_volume() {
        let m = metrics(900, 160);
        assert!(m.rto_percent() > 15.0);
        assert_eq!(evaluate_tier(Tier::Gold, &m), Tier::Silver);
    }

    #[test]
    fn test_silver_collapse_downgrades_to_bronze() {
        let m = metrics(100, 5);
        assert_eq!(evaluate_tier(Tier::Silver, &m), Tier::Bronze);
    }

    #[test]
    fn test_upgrade_never_demotes_existing_gold() {
        // Window qualifies only for silver, but the upgrade stage must not
        // move gold down; the downgrade stage decides (and here volume and
        // RTO keep gold).
        let m = metrics(600, 30);
        assert_eq!(upgrade_candidate(Tier::Gold, &m), Tier::Gold);
        assert_eq!(evaluate_tier(Tier::Gold, &m), Tier::Gold);
    }

    #[test]
    fn test_downgrade_overrides_fresh_upgrade_ordering() {
        // The pipeline order is observable: a seller whose window earns a
        // silver upgrade but trips the silver downgrade rule ends bronze.
        let m = metrics(310, 64); // > 300 orders, ~20.6% RTO
        assert!(m.rto_percent() > 20.0);
        assert_eq!(upgrade_candidate(Tier::Bronze, &m), Tier::Bronze);
        assert_eq!(evaluate_tier(Tier::Silver, &m), Tier::Bronze);
    }

    #[test]
    fn test_tier_roundtrip() {
        for t in [Tier::Bronze, Tier::Silver, Tier::Gold] {
            assert_eq!(Tier::parse(t.as_str()), Some(t));
        }
        assert_eq!(Tier::parse("platinum"), None);
    }
}
