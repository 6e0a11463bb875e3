//! Customer cohorts: buyer types, ownership records, and the replacement
//! lifecycle that decides when a cohort re-enters the market.

use serde::{Deserialize, Serialize};
use sim_core::{ManufacturerId, MarketTier, PartKind, PhoneBlueprint, ProductId, QualityGrade};

/// Shortest time any cohort keeps a phone.
pub const MIN_REPLACEMENT_MONTHS: u32 = 6;
/// Longest time any cohort keeps a phone. The lifecycle formula is unbounded
/// for extreme high-tier/high-grade designs; this cap bounds it.
pub const MAX_REPLACEMENT_MONTHS: u32 = 30;

/// The ten fixed buyer preference profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CustomerType {
    Gamer,
    CameraEnthusiast,
    AllRounder,
    BudgetConscious,
    BusinessUser,
    MediaStreamer,
    SocialPoster,
    DesignLover,
    Minimalist,
    PowerUser,
}

impl CustomerType {
    pub const ALL: [CustomerType; 10] = [
        CustomerType::Gamer,
        CustomerType::CameraEnthusiast,
        CustomerType::AllRounder,
        CustomerType::BudgetConscious,
        CustomerType::BusinessUser,
        CustomerType::MediaStreamer,
        CustomerType::SocialPoster,
        CustomerType::DesignLover,
        CustomerType::Minimalist,
        CustomerType::PowerUser,
    ];

    /// Baseline holding duration before tier/grade adjustments. Gamers churn
    /// faster than everyone else.
    pub fn base_replacement_months(self) -> u32 {
        match self {
            CustomerType::Gamer => 16,
            _ => 20,
        }
    }

    /// Camera enthusiasts re-scan the market for a better camera every
    /// [`crate::CAMERA_CHECK_INTERVAL`] months.
    pub fn is_camera_driven(self) -> bool {
        matches!(self, CustomerType::CameraEnthusiast)
    }

    /// Budget-conscious buyers subtract a price penalty during scoring.
    pub fn is_price_sensitive(self) -> bool {
        matches!(self, CustomerType::BudgetConscious)
    }

    /// How much this buyer type values each mandatory component slot.
    pub fn preference_weight(self, part: PartKind) -> u32 {
        use PartKind::*;
        match self {
            CustomerType::Gamer => match part {
                Soc => 5,
                Battery => 4,
                Screen => 3,
                Ram => 5,
                Camera => 1,
                Storage => 2,
                Casing => 1,
                Fingerprint => 0,
            },
            CustomerType::CameraEnthusiast => match part {
                Soc => 2,
                Battery => 2,
                Screen => 4,
                Ram => 2,
                Camera => 5,
                Storage => 3,
                Casing => 1,
                Fingerprint => 0,
            },
            CustomerType::AllRounder => match part {
                Fingerprint => 0,
                _ => 3,
            },
            CustomerType::BudgetConscious => match part {
                Soc => 2,
                Battery => 3,
                Screen => 2,
                Ram => 2,
                Camera => 2,
                Storage => 2,
                Casing => 1,
                Fingerprint => 0,
            },
            CustomerType::BusinessUser => match part {
                Soc => 3,
                Battery => 5,
                Screen => 2,
                Ram => 3,
                Camera => 1,
                Storage => 3,
                Casing => 2,
                Fingerprint => 0,
            },
            CustomerType::MediaStreamer => match part {
                Soc => 2,
                Battery => 4,
                Screen => 5,
                Ram => 2,
                Camera => 1,
                Storage => 4,
                Casing => 1,
                Fingerprint => 0,
            },
            CustomerType::SocialPoster => match part {
                Soc => 2,
                Battery => 3,
                Screen => 3,
                Ram => 2,
                Camera => 4,
                Storage => 2,
                Casing => 2,
                Fingerprint => 0,
            },
            CustomerType::DesignLover => match part {
                Soc => 1,
                Battery => 2,
                Screen => 4,
                Ram => 1,
                Camera => 3,
                Storage => 1,
                Casing => 5,
                Fingerprint => 0,
            },
            CustomerType::Minimalist => match part {
                Soc => 1,
                Battery => 4,
                Screen => 1,
                Ram => 1,
                Camera => 1,
                Storage => 1,
                Casing => 3,
                Fingerprint => 0,
            },
            CustomerType::PowerUser => match part {
                Soc => 4,
                Battery => 3,
                Screen => 2,
                Ram => 5,
                Camera => 1,
                Storage => 5,
                Casing => 1,
                Fingerprint => 0,
            },
        }
    }
}

/// What a cohort currently owns and when it bought it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub manufacturer: ManufacturerId,
    pub product: ProductId,
    pub purchase_month: u32,
    /// Last month a camera-driven cohort scanned the market for an upgrade.
    pub last_upgrade_check: u32,
}

/// Consolidation key: cohorts sharing this key are merged after each pass.
/// The upgrade-check marker is deliberately not part of the key.
pub type CohortKey = (
    MarketTier,
    CustomerType,
    Option<(ManufacturerId, ProductId, u32)>,
);

/// A group of identical buyers tracked as one unit: budget tier, preference
/// profile, head count, and (if any) the shared ownership record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerCohort {
    pub tier: MarketTier,
    pub customer_type: CustomerType,
    pub count: u32,
    pub ownership: Option<Ownership>,
}

impl CustomerCohort {
    pub fn unowned(tier: MarketTier, customer_type: CustomerType, count: u32) -> Self {
        Self { tier, customer_type, count, ownership: None }
    }

    pub fn key(&self) -> CohortKey {
        (
            self.tier,
            self.customer_type,
            self.ownership
                .as_ref()
                .map(|o| (o.manufacturer, o.product, o.purchase_month)),
        )
    }
}

/// Expected holding duration for an owned design and a buyer type.
///
/// Base duration per type, +1 month per mandatory part at tier >= 4, -1 per
/// part at tier <= 2 (tier 3 neutral); +1 per Premium part, -1 per Reduced,
/// with one extra +1 for a Premium battery. Clamped into
/// [[`MIN_REPLACEMENT_MONTHS`], [`MAX_REPLACEMENT_MONTHS`]].
pub fn replacement_months(blueprint: &PhoneBlueprint, customer_type: CustomerType) -> u32 {
    let mut months = customer_type.base_replacement_months() as i32;
    for (kind, part) in blueprint.mandatory_parts() {
        if part.tier >= 4 {
            months += 1;
        } else if part.tier <= 2 {
            months -= 1;
        }
        match part.grade {
            QualityGrade::Premium => {
                months += 1;
                if kind == PartKind::Battery {
                    months += 1;
                }
            }
            QualityGrade::Reduced => months -= 1,
            QualityGrade::Standard => {}
        }
    }
    months.clamp(MIN_REPLACEMENT_MONTHS as i32, MAX_REPLACEMENT_MONTHS as i32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use sim_core::ProductId;

    fn uniform(tier: u8, grade: QualityGrade) -> PhoneBlueprint {
        PhoneBlueprint::uniform(ProductId(0), "P", tier, grade, Decimal::new(500, 0))
    }

    #[test]
    fn midrange_standard_lasts_twenty_months() {
        let bp = uniform(3, QualityGrade::Standard);
        assert_eq!(replacement_months(&bp, CustomerType::AllRounder), 20);
    }

    #[test]
    fn gamers_replace_sooner() {
        let bp = uniform(3, QualityGrade::Standard);
        assert_eq!(replacement_months(&bp, CustomerType::Gamer), 16);
    }

    #[test]
    fn high_tier_parts_extend_the_lifecycle() {
        // 20 base + 7 parts at tier 4.
        let bp = uniform(4, QualityGrade::Standard);
        assert_eq!(replacement_months(&bp, CustomerType::AllRounder), 27);
    }

    #[test]
    fn premium_grades_extend_the_lifecycle() {
        // 20 base + 7 Premium parts + 1 extra for the Premium battery.
        let bp = uniform(3, QualityGrade::Premium);
        assert_eq!(replacement_months(&bp, CustomerType::AllRounder), 28);
    }

    #[test]
    fn lifecycle_clamps_at_six_months() {
        // 16 base - 7 (tier 1) - 7 (Reduced) would be 2.
        let bp = uniform(1, QualityGrade::Reduced);
        assert_eq!(replacement_months(&bp, CustomerType::Gamer), MIN_REPLACEMENT_MONTHS);
    }

    #[test]
    fn lifecycle_caps_at_thirty_months() {
        // 20 base + 7 (tier 5) + 7 (Premium) + 1 (battery) would be 35.
        let bp = uniform(5, QualityGrade::Premium);
        assert_eq!(
            replacement_months(&bp, CustomerType::AllRounder),
            MAX_REPLACEMENT_MONTHS
        );
    }

    #[test]
    fn gamer_values_performance_over_optics() {
        let gamer = CustomerType::Gamer;
        assert!(gamer.preference_weight(PartKind::Soc) > gamer.preference_weight(PartKind::Camera));
        let fan = CustomerType::CameraEnthusiast;
        assert!(fan.preference_weight(PartKind::Camera) > fan.preference_weight(PartKind::Soc));
    }

    #[test]
    fn cohort_key_ignores_upgrade_check_marker() {
        let own = |check| Ownership {
            manufacturer: ManufacturerId(1),
            product: ProductId(2),
            purchase_month: 3,
            last_upgrade_check: check,
        };
        let a = CustomerCohort {
            tier: MarketTier::Midrange,
            customer_type: CustomerType::CameraEnthusiast,
            count: 10,
            ownership: Some(own(3)),
        };
        let b = CustomerCohort { ownership: Some(own(6)), ..a.clone() };
        assert_eq!(a.key(), b.key());
    }

    proptest! {
        #[test]
        fn lifecycle_is_bounded(tier in 1u8..=10, grade_idx in 0usize..3) {
            let grade = [QualityGrade::Reduced, QualityGrade::Standard, QualityGrade::Premium][grade_idx];
            for ty in CustomerType::ALL {
                let months = replacement_months(&uniform(tier, grade), ty);
                prop_assert!((MIN_REPLACEMENT_MONTHS..=MAX_REPLACEMENT_MONTHS).contains(&months));
            }
        }

        #[test]
        fn lifecycle_monotone_in_tier_above_three(tier in 3u8..10) {
            for ty in CustomerType::ALL {
                let lower = replacement_months(&uniform(tier, QualityGrade::Standard), ty);
                let higher = replacement_months(&uniform(tier + 1, QualityGrade::Standard), ty);
                prop_assert!(higher >= lower);
            }
        }

        #[test]
        fn lifecycle_monotone_in_grade(tier in 1u8..=10) {
            for ty in CustomerType::ALL {
                let reduced = replacement_months(&uniform(tier, QualityGrade::Reduced), ty);
                let standard = replacement_months(&uniform(tier, QualityGrade::Standard), ty);
                let premium = replacement_months(&uniform(tier, QualityGrade::Premium), ty);
                prop_assert!(reduced <= standard && standard <= premium);
            }
        }
    }
}
