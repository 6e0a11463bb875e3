#![deny(warnings)]

//! Core domain models and invariants for Phone Tycoon.
//!
//! This crate defines the serializable catalog and manufacturer types used
//! across the simulation: phone blueprints with their derived metrics
//! (production cost, quality score, market tier, return rate) and the slice
//! of manufacturer state the market core reads and mutates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Lowest component tier a blueprint may use.
pub const MIN_TIER: u8 = 1;
/// Highest component tier a blueprint may use.
pub const MAX_TIER: u8 = 10;

/// Reputation every manufacturer starts with.
pub const STARTING_REPUTATION: f32 = 50.0;
/// Number of trailing (month, price) entries kept per product.
pub const PRICE_HISTORY_LEN: usize = 3;
/// Market-tier thresholds shift up by this much per global tech level.
pub const TIER_THRESHOLD_STEP: u32 = 20;

/// Stable identifier for a manufacturer participating in the market.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ManufacturerId(pub u32);

/// Stable identifier for a blueprint within its manufacturer's catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u32);

/// Component slots of a phone. Seven are mandatory; the fingerprint sensor
/// is optional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartKind {
    Soc,
    Battery,
    Screen,
    Ram,
    Camera,
    Storage,
    Casing,
    Fingerprint,
}

impl PartKind {
    /// The seven mandatory slots, in scoring-weight order.
    pub const MANDATORY: [PartKind; 7] = [
        PartKind::Soc,
        PartKind::Battery,
        PartKind::Screen,
        PartKind::Ram,
        PartKind::Camera,
        PartKind::Storage,
        PartKind::Casing,
    ];

    /// Every slot, mandatory and optional.
    pub const ALL: [PartKind; 8] = [
        PartKind::Soc,
        PartKind::Battery,
        PartKind::Screen,
        PartKind::Ram,
        PartKind::Camera,
        PartKind::Storage,
        PartKind::Casing,
        PartKind::Fingerprint,
    ];

    /// Fixed weight of this slot in the quality score. The optional slot
    /// contributes nothing.
    pub fn score_weight(self) -> u32 {
        match self {
            PartKind::Soc => 5,
            PartKind::Battery => 4,
            PartKind::Screen => 3,
            PartKind::Ram => 3,
            PartKind::Camera => 2,
            PartKind::Storage => 2,
            PartKind::Casing => 1,
            PartKind::Fingerprint => 0,
        }
    }
}

/// Build quality grade of a component. Only affects cost, return rate, and
/// replacement time, never the quality score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityGrade {
    Reduced,
    #[default]
    Standard,
    Premium,
}

impl QualityGrade {
    /// Multiplier applied to the per-tier base part cost.
    pub fn cost_multiplier(self) -> Decimal {
        match self {
            QualityGrade::Reduced => Decimal::new(5, 1),
            QualityGrade::Standard => Decimal::ONE,
            QualityGrade::Premium => Decimal::new(15, 1),
        }
    }
}

/// One component slot of a blueprint: a tier in [1,10] plus a quality grade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSpec {
    pub tier: u8,
    pub grade: QualityGrade,
}

impl PartSpec {
    pub fn new(tier: u8, grade: QualityGrade) -> Self {
        Self { tier, grade }
    }

    /// Standard-grade part at the given tier.
    pub fn standard(tier: u8) -> Self {
        Self::new(tier, QualityGrade::Standard)
    }
}

/// Base cost of a single part at the given tier. Out-of-range tiers are
/// clamped into [1,10]; validation rejects them before they get here.
pub fn part_tier_cost(tier: u8) -> Decimal {
    const COSTS: [i64; 10] = [10, 25, 50, 100, 200, 400, 700, 1200, 2000, 3500];
    let idx = usize::from(tier.clamp(MIN_TIER, MAX_TIER)) - 1;
    Decimal::new(COSTS[idx], 0)
}

/// Bucketed quality classification of a product, relative to the current
/// technology era. Doubles as the budget-tier label of customer cohorts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MarketTier {
    Entry,
    Budget,
    Midrange,
    HighEnd,
    Flagship,
}

impl MarketTier {
    pub const ALL: [MarketTier; 5] = [
        MarketTier::Entry,
        MarketTier::Budget,
        MarketTier::Midrange,
        MarketTier::HighEnd,
        MarketTier::Flagship,
    ];

    /// The two top tiers, where customers expect premium build quality.
    pub fn is_premium(self) -> bool {
        matches!(self, MarketTier::HighEnd | MarketTier::Flagship)
    }
}

/// Classify a quality score into a market tier. Thresholds shift upward as
/// the global tech level advances, so the same absolute score falls into a
/// lower label over time.
pub fn classify_score(score: u32, tech_level: u32) -> MarketTier {
    let shift = tech_level.saturating_sub(1) * TIER_THRESHOLD_STEP;
    if score <= 20 + shift {
        MarketTier::Entry
    } else if score <= 40 + shift {
        MarketTier::Budget
    } else if score <= 60 + shift {
        MarketTier::Midrange
    } else if score <= 80 + shift {
        MarketTier::HighEnd
    } else {
        MarketTier::Flagship
    }
}

/// A phone design: seven mandatory component slots, an optional fingerprint
/// sensor, and a sell price. Immutable within a simulated month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhoneBlueprint {
    pub id: ProductId,
    pub name: String,
    pub soc: PartSpec,
    pub battery: PartSpec,
    pub screen: PartSpec,
    pub ram: PartSpec,
    pub camera: PartSpec,
    pub storage: PartSpec,
    pub casing: PartSpec,
    pub fingerprint: Option<PartSpec>,
    pub price: Decimal,
}

impl PhoneBlueprint {
    /// Convenience constructor for a design with every mandatory slot at the
    /// same tier and grade, and no fingerprint sensor.
    pub fn uniform(id: ProductId, name: &str, tier: u8, grade: QualityGrade, price: Decimal) -> Self {
        let part = PartSpec::new(tier, grade);
        Self {
            id,
            name: name.to_string(),
            soc: part,
            battery: part,
            screen: part,
            ram: part,
            camera: part,
            storage: part,
            casing: part,
            fingerprint: None,
            price,
        }
    }

    /// Look up a slot by kind; `None` only for an absent fingerprint sensor.
    pub fn part(&self, kind: PartKind) -> Option<&PartSpec> {
        match kind {
            PartKind::Soc => Some(&self.soc),
            PartKind::Battery => Some(&self.battery),
            PartKind::Screen => Some(&self.screen),
            PartKind::Ram => Some(&self.ram),
            PartKind::Camera => Some(&self.camera),
            PartKind::Storage => Some(&self.storage),
            PartKind::Casing => Some(&self.casing),
            PartKind::Fingerprint => self.fingerprint.as_ref(),
        }
    }

    /// The seven mandatory slots with their kinds, in fixed order.
    pub fn mandatory_parts(&self) -> [(PartKind, &PartSpec); 7] {
        [
            (PartKind::Soc, &self.soc),
            (PartKind::Battery, &self.battery),
            (PartKind::Screen, &self.screen),
            (PartKind::Ram, &self.ram),
            (PartKind::Camera, &self.camera),
            (PartKind::Storage, &self.storage),
            (PartKind::Casing, &self.casing),
        ]
    }

    /// Cost to manufacture one unit: per-part tier base cost times the part's
    /// quality multiplier, optional sensor included when present.
    pub fn production_cost(&self) -> Decimal {
        let mut cost = Decimal::ZERO;
        for (_, part) in self.mandatory_parts() {
            cost += part_tier_cost(part.tier) * part.grade.cost_multiplier();
        }
        if let Some(fp) = &self.fingerprint {
            cost += part_tier_cost(fp.tier) * fp.grade.cost_multiplier();
        }
        cost
    }

    /// Weighted sum of mandatory component tiers. Grades do not contribute.
    pub fn quality_score(&self) -> u32 {
        self.mandatory_parts()
            .iter()
            .map(|(kind, part)| u32::from(part.tier) * kind.score_weight())
            .sum()
    }

    /// Market tier this design lands in at the given global tech level.
    pub fn market_tier(&self, tech_level: u32) -> MarketTier {
        classify_score(self.quality_score(), tech_level)
    }

    /// Percentage of sold units expected to come back for repair each month.
    /// Durability hangs on the screen and casing: higher tiers and Premium
    /// grades on those two slots push the rate down, floored at zero.
    pub fn return_rate(&self) -> f32 {
        let mut rate = 5.0
            - 0.25 * f32::from(self.screen.tier.saturating_sub(1))
            - 0.25 * f32::from(self.casing.tier.saturating_sub(1));
        if self.screen.grade == QualityGrade::Premium {
            rate -= 0.25;
        }
        if self.casing.grade == QualityGrade::Premium {
            rate -= 0.25;
        }
        rate.max(0.0)
    }

    /// Cost to repair one unit: 30% of production cost.
    pub fn repair_cost(&self) -> Decimal {
        self.production_cost() * Decimal::new(3, 1)
    }
}

/// Validation errors for catalog and manufacturer invariants.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("tier {0} is out of range [{MIN_TIER}, {MAX_TIER}]")]
    TierOutOfRange(u8),
    #[error("blueprint name must not be empty")]
    EmptyName,
    #[error("price must be positive")]
    NonPositivePrice,
    #[error("duplicate product id {0:?}")]
    DuplicateProduct(ProductId),
    #[error("unknown product {0:?}")]
    UnknownProduct(ProductId),
    #[error("invalid quantity {0}")]
    InvalidQuantity(u32),
    #[error("insufficient inventory for {product:?}: requested {requested}, available {available}")]
    InsufficientInventory {
        product: ProductId,
        requested: u32,
        available: u32,
    },
}

/// Validate a blueprint: non-empty name, every tier in range, positive price.
pub fn validate_blueprint(bp: &PhoneBlueprint) -> Result<(), CoreError> {
    if bp.name.trim().is_empty() {
        return Err(CoreError::EmptyName);
    }
    for (_, part) in bp.mandatory_parts() {
        if !(MIN_TIER..=MAX_TIER).contains(&part.tier) {
            return Err(CoreError::TierOutOfRange(part.tier));
        }
    }
    if let Some(fp) = &bp.fingerprint {
        if !(MIN_TIER..=MAX_TIER).contains(&fp.tier) {
            return Err(CoreError::TierOutOfRange(fp.tier));
        }
    }
    if bp.price <= Decimal::ZERO {
        return Err(CoreError::NonPositivePrice);
    }
    Ok(())
}

/// One remembered price of a product.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub month: u32,
    pub price: Decimal,
}

/// The slice of a manufacturer the market core reads and mutates: cash,
/// inventory, cumulative sales, repairs, reputation, and price histories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerState {
    pub cash: Decimal,
    /// Brand reputation in [0,100]; acts as a demand multiplier.
    pub reputation: f32,
    pub inventory: BTreeMap<ProductId, u32>,
    pub units_sold: BTreeMap<ProductId, u64>,
    pub pending_repairs: BTreeMap<ProductId, u32>,
    /// Trailing (month, price) entries per product, at most the last 3.
    pub price_history: BTreeMap<ProductId, Vec<PricePoint>>,
    pub rejected_repairs_this_month: u32,
}

impl ManufacturerState {
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash,
            reputation: STARTING_REPUTATION,
            inventory: BTreeMap::new(),
            units_sold: BTreeMap::new(),
            pending_repairs: BTreeMap::new(),
            price_history: BTreeMap::new(),
            rejected_repairs_this_month: 0,
        }
    }

    pub fn available_inventory(&self, product: ProductId) -> u32 {
        self.inventory.get(&product).copied().unwrap_or(0)
    }

    pub fn add_inventory(&mut self, product: ProductId, quantity: u32) {
        let slot = self.inventory.entry(product).or_insert(0);
        *slot = slot.saturating_add(quantity);
    }

    /// Record a sale of `units` at `price` each: credits cash, debits
    /// inventory, bumps the cumulative sold counter.
    pub fn record_sale(&mut self, product: ProductId, units: u32, price: Decimal) -> Result<(), CoreError> {
        if units == 0 {
            return Err(CoreError::InvalidQuantity(0));
        }
        let available = self.available_inventory(product);
        if units > available {
            return Err(CoreError::InsufficientInventory {
                product,
                requested: units,
                available,
            });
        }
        self.inventory.insert(product, available - units);
        self.cash += price * Decimal::from(units);
        *self.units_sold.entry(product).or_insert(0) += u64::from(units);
        Ok(())
    }

    /// Append a price observation, keeping only the trailing
    /// [`PRICE_HISTORY_LEN`] entries.
    pub fn track_price(&mut self, product: ProductId, month: u32, price: Decimal) {
        let history = self.price_history.entry(product).or_default();
        history.push(PricePoint { month, price });
        if history.len() > PRICE_HISTORY_LEN {
            let excess = history.len() - PRICE_HISTORY_LEN;
            history.drain(..excess);
        }
    }

    /// Shift reputation by `delta`, silently clamping into [0,100].
    pub fn adjust_reputation(&mut self, delta: f32) {
        self.reputation = (self.reputation + delta).clamp(0.0, 100.0);
    }

    /// Demand multiplier applied to product scores during matching:
    /// 1.0 at zero reputation up to 1.2 at full reputation.
    pub fn reputation_multiplier(&self) -> f32 {
        1.0 + self.reputation / 100.0 * 0.2
    }
}

/// A market participant: identity, priced catalog, and mutable state. The
/// market core never constructs one; it only mutates what it is handed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: ManufacturerId,
    pub name: String,
    pub catalog: BTreeMap<ProductId, PhoneBlueprint>,
    pub state: ManufacturerState,
}

impl Manufacturer {
    pub fn new(id: ManufacturerId, name: &str, cash: Decimal) -> Self {
        Self {
            id,
            name: name.to_string(),
            catalog: BTreeMap::new(),
            state: ManufacturerState::new(cash),
        }
    }

    pub fn blueprint(&self, product: ProductId) -> Option<&PhoneBlueprint> {
        self.catalog.get(&product)
    }

    /// Validate and insert a blueprint. Rejects duplicate product ids.
    pub fn add_blueprint(&mut self, bp: PhoneBlueprint) -> Result<(), CoreError> {
        validate_blueprint(&bp)?;
        if self.catalog.contains_key(&bp.id) {
            return Err(CoreError::DuplicateProduct(bp.id));
        }
        self.catalog.insert(bp.id, bp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn midrange(price: i64) -> PhoneBlueprint {
        PhoneBlueprint::uniform(
            ProductId(0),
            "Mid Phone",
            3,
            QualityGrade::Standard,
            Decimal::new(price, 0),
        )
    }

    #[test]
    fn production_cost_sums_mandatory_parts() {
        let bp = PhoneBlueprint::uniform(ProductId(0), "Base", 1, QualityGrade::Standard, Decimal::new(100, 0));
        assert_eq!(bp.production_cost(), Decimal::new(70, 0));
    }

    #[test]
    fn production_cost_applies_quality_multipliers() {
        let mut bp = midrange(500);
        // 7 parts at T3 (50 each) = 350; Reduced screen halves its 50.
        bp.screen.grade = QualityGrade::Reduced;
        assert_eq!(bp.production_cost(), Decimal::new(325, 0));
        bp.screen.grade = QualityGrade::Premium;
        assert_eq!(bp.production_cost(), Decimal::new(375, 0));
    }

    #[test]
    fn production_cost_includes_optional_sensor() {
        let mut bp = midrange(500);
        bp.fingerprint = Some(PartSpec::standard(3));
        assert_eq!(bp.production_cost(), Decimal::new(400, 0));
    }

    #[test]
    fn quality_score_ignores_grades_and_sensor() {
        let mut bp = midrange(500);
        assert_eq!(bp.quality_score(), 60);
        bp.soc.grade = QualityGrade::Premium;
        bp.fingerprint = Some(PartSpec::standard(10));
        assert_eq!(bp.quality_score(), 60);
    }

    #[test]
    fn classification_buckets_at_tech_level_one() {
        let entry = PhoneBlueprint::uniform(ProductId(0), "E", 1, QualityGrade::Standard, Decimal::ONE);
        let mid = midrange(500);
        let flagship = PhoneBlueprint::uniform(ProductId(0), "F", 5, QualityGrade::Standard, Decimal::ONE);
        assert_eq!(entry.market_tier(1), MarketTier::Entry);
        assert_eq!(mid.market_tier(1), MarketTier::Midrange);
        assert_eq!(flagship.market_tier(1), MarketTier::Flagship);
    }

    #[test]
    fn classification_shifts_down_as_tech_advances() {
        let mid = midrange(500);
        assert_eq!(mid.market_tier(1), MarketTier::Midrange);
        // Thresholds shift up by 20 at level 2: score 60 is only Budget now.
        assert_eq!(mid.market_tier(2), MarketTier::Budget);
        assert_eq!(mid.market_tier(3), MarketTier::Entry);
    }

    #[test]
    fn return_rate_decreases_with_durable_parts() {
        let cheap = PhoneBlueprint::uniform(ProductId(0), "C", 1, QualityGrade::Standard, Decimal::ONE);
        assert!((cheap.return_rate() - 5.0).abs() < f32::EPSILON);

        let mut durable = PhoneBlueprint::uniform(ProductId(0), "D", 5, QualityGrade::Standard, Decimal::ONE);
        durable.screen.grade = QualityGrade::Premium;
        durable.casing.grade = QualityGrade::Premium;
        // 5.0 - 1.0 - 1.0 - 0.25 - 0.25
        assert!((durable.return_rate() - 2.5).abs() < f32::EPSILON);

        let tank = PhoneBlueprint::uniform(ProductId(0), "T", 10, QualityGrade::Premium, Decimal::ONE);
        assert_eq!(tank.return_rate(), 0.0);
    }

    #[test]
    fn repair_cost_is_fraction_of_production_cost() {
        let bp = midrange(500);
        assert_eq!(bp.repair_cost(), Decimal::new(105, 0)); // 30% of 350
    }

    #[test]
    fn validate_rejects_bad_tiers_and_prices() {
        let mut bp = midrange(500);
        bp.camera.tier = 11;
        assert_eq!(validate_blueprint(&bp), Err(CoreError::TierOutOfRange(11)));
        bp.camera.tier = 0;
        assert_eq!(validate_blueprint(&bp), Err(CoreError::TierOutOfRange(0)));
        let mut bp = midrange(0);
        assert_eq!(validate_blueprint(&bp), Err(CoreError::NonPositivePrice));
        bp.price = Decimal::new(500, 0);
        bp.name = "  ".to_string();
        assert_eq!(validate_blueprint(&bp), Err(CoreError::EmptyName));
    }

    #[test]
    fn price_history_keeps_last_three() {
        let mut state = ManufacturerState::new(Decimal::ZERO);
        let pid = ProductId(7);
        for (month, price) in [(1, 1000), (2, 1100), (3, 1200), (4, 1300)] {
            state.track_price(pid, month, Decimal::new(price, 0));
        }
        let history = &state.price_history[&pid];
        assert_eq!(history.len(), PRICE_HISTORY_LEN);
        assert_eq!(history[0].month, 2);
        assert_eq!(history[2].price, Decimal::new(1300, 0));
    }

    #[test]
    fn record_sale_moves_inventory_cash_and_counters() {
        let mut state = ManufacturerState::new(Decimal::ZERO);
        let pid = ProductId(1);
        state.add_inventory(pid, 10);
        state.record_sale(pid, 4, Decimal::new(500, 0)).unwrap();
        assert_eq!(state.available_inventory(pid), 6);
        assert_eq!(state.cash, Decimal::new(2000, 0));
        assert_eq!(state.units_sold[&pid], 4);

        let err = state.record_sale(pid, 7, Decimal::new(500, 0)).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientInventory { product: pid, requested: 7, available: 6 }
        );
    }

    #[test]
    fn reputation_clamps_and_multiplies() {
        let mut state = ManufacturerState::new(Decimal::ZERO);
        state.adjust_reputation(500.0);
        assert_eq!(state.reputation, 100.0);
        assert!((state.reputation_multiplier() - 1.2).abs() < 1e-6);
        state.adjust_reputation(-500.0);
        assert_eq!(state.reputation, 0.0);
        assert!((state.reputation_multiplier() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn manufacturer_rejects_duplicate_products() {
        let mut m = Manufacturer::new(ManufacturerId(0), "Acme", Decimal::new(100_000, 0));
        m.add_blueprint(midrange(500)).unwrap();
        assert_eq!(m.add_blueprint(midrange(500)), Err(CoreError::DuplicateProduct(ProductId(0))));
        assert!(m.blueprint(ProductId(0)).is_some());
    }

    #[test]
    fn blueprint_serde_roundtrip() {
        let mut bp = midrange(500);
        bp.fingerprint = Some(PartSpec::new(4, QualityGrade::Premium));
        let text = serde_json::to_string(&bp).unwrap();
        let back: PhoneBlueprint = serde_json::from_str(&text).unwrap();
        assert_eq!(back, bp);
    }

    proptest! {
        #[test]
        fn uniform_blueprints_validate(tier in MIN_TIER..=MAX_TIER, price in 1i64..100_000) {
            let bp = PhoneBlueprint::uniform(
                ProductId(0), "P", tier, QualityGrade::Standard, Decimal::new(price, 0),
            );
            prop_assert!(validate_blueprint(&bp).is_ok());
        }

        #[test]
        fn return_rate_never_negative(screen in MIN_TIER..=MAX_TIER, casing in MIN_TIER..=MAX_TIER) {
            let mut bp = PhoneBlueprint::uniform(ProductId(0), "P", 3, QualityGrade::Premium, Decimal::ONE);
            bp.screen.tier = screen;
            bp.casing.tier = casing;
            prop_assert!(bp.return_rate() >= 0.0);
        }

        #[test]
        fn classification_is_monotone_in_score(tier in MIN_TIER..MAX_TIER, tech in 1u32..6) {
            let lower = PhoneBlueprint::uniform(ProductId(0), "L", tier, QualityGrade::Standard, Decimal::ONE);
            let higher = PhoneBlueprint::uniform(ProductId(0), "H", tier + 1, QualityGrade::Standard, Decimal::ONE);
            prop_assert!(lower.market_tier(tech) <= higher.market_tier(tech));
        }
    }
}
