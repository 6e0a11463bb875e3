//! Monthly matching and allocation: decides which cohorts are in the market,
//! scores every eligible product for each cohort, and fills demand against
//! finite inventory, splitting cohorts when stock runs short.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Manufacturer, ManufacturerId, MarketTier, PhoneBlueprint, ProductId};
use tracing::debug;

use crate::cohort::{replacement_months, CustomerCohort, CustomerType, Ownership};
use crate::{CustomerMarket, CAMERA_CHECK_INTERVAL};

/// Price every budget-conscious penalty is normalized against.
pub const REFERENCE_PRICE: f32 = 500.0;
/// Score subtracted per reference-price multiple for price-sensitive buyers.
pub const PRICE_PENALTY_WEIGHT: f32 = 10.0;

/// Holding a phone less than this long before a voluntary switch costs the
/// abandoned manufacturer reputation.
pub const EARLY_SWITCH_MONTHS: u32 = 12;
/// Holding a phone at least this long before replacing rewards loyalty.
pub const LOYALTY_MONTHS: u32 = 24;

/// Units and revenue one manufacturer moved for one product this month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub manufacturer: ManufacturerId,
    pub product: ProductId,
    pub units: u32,
    pub revenue: Decimal,
}

/// Everything sold in one monthly pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesReport {
    pub month: u32,
    pub lines: Vec<SaleLine>,
}

impl SalesReport {
    pub fn total_units(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.units)).sum()
    }

    pub fn total_revenue(&self) -> Decimal {
        self.lines.iter().map(|l| l.revenue).sum()
    }

    pub fn units_for(&self, manufacturer: ManufacturerId, product: ProductId) -> u32 {
        self.lines
            .iter()
            .filter(|l| l.manufacturer == manufacturer && l.product == product)
            .map(|l| l.units)
            .sum()
    }

    fn record(&mut self, manufacturer: ManufacturerId, product: ProductId, units: u32, revenue: Decimal) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.manufacturer == manufacturer && l.product == product)
        {
            line.units += units;
            line.revenue += revenue;
        } else {
            self.lines.push(SaleLine { manufacturer, product, units, revenue });
        }
    }
}

/// How a buyer type rates a design: preference-weighted component tiers, a
/// price penalty for the budget-conscious, then the manufacturer's
/// reputation multiplier on top.
pub fn product_score(customer_type: CustomerType, blueprint: &PhoneBlueprint, reputation_multiplier: f32) -> f32 {
    let mut score: f32 = blueprint
        .mandatory_parts()
        .iter()
        .map(|(kind, part)| f32::from(part.tier) * customer_type.preference_weight(*kind) as f32)
        .sum();
    if customer_type.is_price_sensitive() {
        let price = blueprint.price.to_f32().unwrap_or(0.0);
        score -= price / REFERENCE_PRICE * PRICE_PENALTY_WEIGHT;
    }
    score * reputation_multiplier
}

fn find_blueprint<'a>(
    manufacturers: &'a [Manufacturer],
    id: ManufacturerId,
    product: ProductId,
) -> Option<&'a PhoneBlueprint> {
    manufacturers
        .iter()
        .find(|m| m.id == id)
        .and_then(|m| m.blueprint(product))
}

/// Best in-stock product of the cohort's tier, by score. Evaluation order is
/// manufacturer slice order then ascending product id; ties keep the first
/// candidate encountered.
fn select_best(
    manufacturers: &[Manufacturer],
    cohort: &CustomerCohort,
    tech_level: u32,
) -> Option<(usize, ProductId)> {
    let mut best: Option<(usize, ProductId, f32)> = None;
    for (idx, m) in manufacturers.iter().enumerate() {
        let multiplier = m.state.reputation_multiplier();
        for (pid, bp) in &m.catalog {
            if m.state.available_inventory(*pid) == 0 {
                continue;
            }
            if bp.market_tier(tech_level) != cohort.tier {
                continue;
            }
            let score = product_score(cohort.customer_type, bp, multiplier);
            match best {
                Some((_, _, top)) if score <= top => {}
                _ => best = Some((idx, *pid, score)),
            }
        }
    }
    best.map(|(idx, pid, _)| (idx, pid))
}

fn better_camera_available(
    manufacturers: &[Manufacturer],
    tier: MarketTier,
    owned_camera: u8,
    tech_level: u32,
) -> bool {
    manufacturers.iter().any(|m| {
        m.catalog.iter().any(|(pid, bp)| {
            m.state.available_inventory(*pid) > 0
                && bp.market_tier(tech_level) == tier
                && bp.camera.tier > owned_camera
        })
    })
}

impl CustomerMarket {
    /// Advance the month counter and run the monthly sales pass.
    pub fn advance_month(&mut self, manufacturers: &mut [Manufacturer], tech_level: u32) -> SalesReport {
        self.current_month += 1;
        self.simulate_purchases(manufacturers, tech_level)
    }

    /// One monthly matching/allocation pass at the current month.
    ///
    /// Mutates cohort ownership and manufacturer cash/inventory/sold
    /// counters, applies retention reputation feedback, and appends the
    /// result to the sales ledger. Split-off cohorts are buffered and merged
    /// back after the pass so the no-duplicate-key invariant holds.
    pub fn simulate_purchases(&mut self, manufacturers: &mut [Manufacturer], tech_level: u32) -> SalesReport {
        let month = self.current_month;
        let mut report = SalesReport { month, lines: Vec::new() };
        let mut spawned: Vec<CustomerCohort> = Vec::new();

        for cohort in &mut self.cohorts {
            // Eligibility. A missing blueprint (manufacturer dropped the
            // product) counts as expired: the stale record is replaced on
            // the next purchase instead of stranding the cohort.
            let mut expired = false;
            let mut voluntary = false;
            match &mut cohort.ownership {
                None => {}
                Some(own) => {
                    let elapsed = month.saturating_sub(own.purchase_month);
                    match find_blueprint(manufacturers, own.manufacturer, own.product) {
                        None => expired = true,
                        Some(bp) => {
                            if elapsed >= replacement_months(bp, cohort.customer_type) {
                                expired = true;
                            } else if cohort.customer_type.is_camera_driven()
                                && month.saturating_sub(own.last_upgrade_check) >= CAMERA_CHECK_INTERVAL
                            {
                                let owned_camera = bp.camera.tier;
                                own.last_upgrade_check = month;
                                if better_camera_available(manufacturers, cohort.tier, owned_camera, tech_level)
                                {
                                    voluntary = true;
                                }
                            }
                        }
                    }
                }
            }
            if cohort.ownership.is_some() && !expired && !voluntary {
                continue;
            }

            let Some((winner_idx, product)) = select_best(manufacturers, cohort, tech_level) else {
                continue;
            };
            let (price, available) = {
                let winner = &manufacturers[winner_idx];
                let Some(bp) = winner.blueprint(product) else { continue };
                (bp.price, winner.state.available_inventory(product))
            };
            let allocated = cohort.count.min(available);
            if allocated == 0 {
                continue;
            }

            // Retention feedback against the previous owner: a voluntary
            // early switch is punished, long loyalty is rewarded. Lifecycle
            // expiry alone never penalizes.
            if let Some(own) = &cohort.ownership {
                let elapsed = month.saturating_sub(own.purchase_month);
                if let Some(prev) = manufacturers.iter_mut().find(|m| m.id == own.manufacturer) {
                    if voluntary && !expired && elapsed < EARLY_SWITCH_MONTHS {
                        prev.state.adjust_reputation(-(allocated as f32));
                    } else if elapsed >= LOYALTY_MONTHS {
                        prev.state.adjust_reputation(allocated as f32);
                    }
                }
            }

            let winner = &mut manufacturers[winner_idx];
            if winner.state.record_sale(product, allocated, price).is_err() {
                continue;
            }
            report.record(winner.id, product, allocated, price * Decimal::from(allocated));

            let new_ownership = Ownership {
                manufacturer: winner.id,
                product,
                purchase_month: month,
                last_upgrade_check: month,
            };
            if allocated == cohort.count {
                cohort.ownership = Some(new_ownership);
            } else {
                // Partial fill: the buyers who got a unit split off; the
                // remainder stays in market with its old record dropped.
                cohort.count -= allocated;
                cohort.ownership = None;
                spawned.push(CustomerCohort {
                    tier: cohort.tier,
                    customer_type: cohort.customer_type,
                    count: allocated,
                    ownership: Some(new_ownership),
                });
            }
        }

        self.cohorts.extend(spawned);
        self.consolidate();
        debug!(
            month,
            units = report.total_units(),
            cohorts = self.cohorts.len(),
            "sales pass complete"
        );
        self.sales_ledger.insert(month, report.clone());
        report
    }
}
