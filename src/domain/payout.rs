//! Delivery partner compensation formula.

use crate::domain::Money;

/// Flat bonus added on top of the per-km rate, by distance slab.
///
/// Longer hauls carry a fixed incentive so short-hop rates stay low
/// without starving long-distance assignments.
pub fn slab_bonus(distance_km: Money) -> Money {
    if distance_km >= Money::from_i64(20) {
        Money::from_i64(50)
    } else if distance_km >= Money::from_i64(10) {
        Money::from_i64(25)
    } else if distance_km >= Money::from_i64(5) {
        Money::from_i64(10)
    } else {
        Money::zero()
    }
}

/// Partner earning for one delivered order:
/// `round2(distance * rate_per_km + slab_bonus)`.
pub fn partner_earning(distance_km: Money, rate_per_km: Money) -> Money {
    (distance_km * rate_per_km + slab_bonus(distance_km)).round2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_boundaries() {
        assert_eq!(slab_bonus(Money::from_str_canonical("4.9").unwrap()), Money::zero());
        assert_eq!(slab_bonus(Money::from_i64(5)), Money::from_i64(10));
        assert_eq!(slab_bonus(Money::from_i64(10)), Money::from_i64(25));
        assert_eq!(slab_bonus(Money::from_i64(20)), Money::from_i64(50));
    }

    #[test]
    fn test_partner_earning_rounds() {
        // 7.5 km at 9.33/km + 10 slab = 79.975, rounded to 79.98
        let earning = partner_earning(
            Money::from_str_canonical("7.5").unwrap(),
            Money::from_str_canonical("9.33").unwrap(),
        );
        assert_eq!(earning, Money::from_str_canonical("79.98").unwrap());
    }

    #[test]
    fn test_partner_earning_short_hop() {
        let earning = partner_earning(Money::from_i64(3), Money::from_i64(9));
        assert_eq!(earning, Money::from_i64(27));
    }
}
