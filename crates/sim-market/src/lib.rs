#![deny(warnings)]

//! Customer market simulation for Phone Tycoon.
//!
//! A fixed-size synthetic population is tracked as cohorts of identical
//! buyers. Each month the allocation engine decides which cohorts are in the
//! market, matches them to the best available product, fills demand against
//! finite inventory, and feeds retention outcomes back into manufacturer
//! reputation. Cohorts only split and merge; the total head count never
//! changes after initialization.

mod allocation;
mod cohort;

pub use allocation::{
    product_score, SaleLine, SalesReport, EARLY_SWITCH_MONTHS, LOYALTY_MONTHS, PRICE_PENALTY_WEIGHT,
    REFERENCE_PRICE,
};
pub use cohort::{
    replacement_months, CohortKey, CustomerCohort, CustomerType, Ownership, MAX_REPLACEMENT_MONTHS,
    MIN_REPLACEMENT_MONTHS,
};

use serde::{Deserialize, Serialize};
use sim_core::MarketTier;
use std::collections::BTreeMap;
use tracing::info;

/// Default total market size.
pub const MARKET_SIZE: u32 = 20_000;
/// Months between camera-upgrade scans for camera-driven cohorts.
pub const CAMERA_CHECK_INTERVAL: u32 = 3;

/// Fixed share of the population in each budget tier, in percent.
pub fn tier_share_percent(tier: MarketTier) -> u32 {
    match tier {
        MarketTier::Entry => 15,
        MarketTier::Budget => 30,
        MarketTier::Midrange => 40,
        MarketTier::HighEnd => 10,
        MarketTier::Flagship => 5,
    }
}

/// The full buyer population, the month counter, and the sales ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerMarket {
    pub cohorts: Vec<CustomerCohort>,
    pub current_month: u32,
    pub sales_ledger: BTreeMap<u32, SalesReport>,
    initialized: bool,
}

impl CustomerMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the market: the total is split across budget tiers by
    /// [`tier_share_percent`], then within each tier as evenly as possible
    /// across the ten customer types, with remainder units going to the
    /// first types in enumeration order so totals stay exact. Everyone
    /// starts unowned. Idempotent: calling again is a no-op.
    pub fn initialize(&mut self, total: u32) {
        if self.initialized {
            return;
        }
        let mut tier_counts = [0u32; 5];
        for (i, tier) in MarketTier::ALL.iter().enumerate() {
            tier_counts[i] = (u64::from(total) * u64::from(tier_share_percent(*tier)) / 100) as u32;
        }
        let assigned: u32 = tier_counts.iter().sum();
        let mut leftover = total - assigned;
        for count in tier_counts.iter_mut() {
            if leftover == 0 {
                break;
            }
            *count += 1;
            leftover -= 1;
        }

        let types = CustomerType::ALL.len() as u32;
        for (i, tier) in MarketTier::ALL.iter().enumerate() {
            let per_type = tier_counts[i] / types;
            let remainder = (tier_counts[i] % types) as usize;
            for (j, ty) in CustomerType::ALL.iter().enumerate() {
                let count = per_type + u32::from(j < remainder);
                if count > 0 {
                    self.cohorts.push(CustomerCohort::unowned(*tier, *ty, count));
                }
            }
        }
        self.initialized = true;
        info!(total, cohorts = self.cohorts.len(), "customer market initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn total_population(&self) -> u64 {
        self.cohorts.iter().map(|c| u64::from(c.count)).sum()
    }

    pub fn owned_population(&self) -> u64 {
        self.cohorts
            .iter()
            .filter(|c| c.ownership.is_some())
            .map(|c| u64::from(c.count))
            .sum()
    }

    /// Merge cohorts sharing an identical (tier, type, manufacturer,
    /// product, purchase-month) key and drop empty ones. Upgrade-check
    /// markers merge by taking the latest.
    pub fn consolidate(&mut self) {
        use std::collections::btree_map::Entry;
        let mut merged: BTreeMap<CohortKey, CustomerCohort> = BTreeMap::new();
        for cohort in self.cohorts.drain(..) {
            if cohort.count == 0 {
                continue;
            }
            match merged.entry(cohort.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(cohort);
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    existing.count += cohort.count;
                    if let (Some(a), Some(b)) = (existing.ownership.as_mut(), cohort.ownership.as_ref()) {
                        a.last_upgrade_check = a.last_upgrade_check.max(b.last_upgrade_check);
                    }
                }
            }
        }
        self.cohorts = merged.into_values().collect();
    }
}
