#![deny(warnings)]

//! Turn-based runtime for Phone Tycoon.
//!
//! Owns the companies, the customer market, and the global technology era,
//! and advances them one month at a time through a fixed pipeline: sales
//! against prior inventory, manufacturing completion, R&D progression,
//! repair generation, reputation recomputation, tech-level check. A month
//! advance runs to completion; there is no partial application.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    CoreError, Manufacturer, ManufacturerId, PartKind, PhoneBlueprint, PartSpec, ProductId,
    MAX_TIER,
};
use sim_market::{CustomerMarket, SalesReport};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

/// Tier every component starts unlocked at.
pub const STARTING_UNLOCKED_TIER: u8 = 5;
/// How many tiers the current tech window spans.
pub const TECH_WINDOW_SPAN: u8 = 5;

/// R&D cost and duration to unlock a component tier. `None` below tier 2.
pub fn rnd_config(tier: u8) -> Option<(Decimal, u8)> {
    let (cost, months) = match tier {
        2 => (5_000, 2),
        3 => (10_000, 3),
        4 => (20_000, 4),
        5 => (40_000, 5),
        6 => (70_000, 6),
        7 => (110_000, 7),
        8 => (160_000, 8),
        9 => (220_000, 9),
        10 => (300_000, 10),
        _ => return None,
    };
    Some((Decimal::new(cost, 0), months))
}

/// An ongoing tier unlock for one component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RndProject {
    pub part: PartKind,
    pub target_tier: u8,
    pub months_remaining: u8,
}

/// A production order waiting for the factory to finish it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactoryOrder {
    pub product: ProductId,
    pub quantity: u32,
    pub months_remaining: u8,
}

/// Per-company progression state outside the market core: unlocked tiers,
/// running R&D, and the factory queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyProgress {
    pub unlocked_tiers: BTreeMap<PartKind, u8>,
    pub ongoing_rnd: Vec<RndProject>,
    pub factory_queue: Vec<FactoryOrder>,
    pub capacity_used: u32,
    next_product_id: u32,
}

impl CompanyProgress {
    pub fn new() -> Self {
        let mut unlocked_tiers = BTreeMap::new();
        for part in PartKind::ALL {
            unlocked_tiers.insert(part, STARTING_UNLOCKED_TIER);
        }
        Self {
            unlocked_tiers,
            ongoing_rnd: Vec::new(),
            factory_queue: Vec::new(),
            capacity_used: 0,
            next_product_id: 0,
        }
    }

    pub fn unlocked_tier(&self, part: PartKind) -> u8 {
        self.unlocked_tiers.get(&part).copied().unwrap_or(0)
    }
}

impl Default for CompanyProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// A blueprint as designed by a company, before an id is assigned.
#[derive(Clone, Debug)]
pub struct BlueprintDraft {
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

impl BlueprintDraft {
    /// Uniform draft: every mandatory slot at the same tier, standard grade.
    pub fn uniform(name: &str, tier: u8, price: Decimal) -> Self {
        let part = PartSpec::standard(tier);
        Self {
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

    fn parts(&self) -> Vec<(PartKind, PartSpec)> {
        let mut parts = vec![
            (PartKind::Soc, self.soc),
            (PartKind::Battery, self.battery),
            (PartKind::Screen, self.screen),
            (PartKind::Ram, self.ram),
            (PartKind::Camera, self.camera),
            (PartKind::Storage, self.storage),
            (PartKind::Casing, self.casing),
        ];
        if let Some(fp) = self.fingerprint {
            parts.push((PartKind::Fingerprint, fp));
        }
        parts
    }
}

/// Tunable simulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub market_size: u32,
    pub starting_cash: Decimal,
    pub factory_capacity: u32,
    pub tech_advance_interval: u32,
    pub rng_seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            market_size: sim_market::MARKET_SIZE,
            starting_cash: Decimal::new(100_000, 0),
            factory_capacity: 1_000,
            tech_advance_interval: 36,
            rng_seed: 42,
        }
    }
}

/// Everything that happened during one month advance.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthReport {
    pub month: u32,
    pub sales: SalesReport,
    pub completed_orders: Vec<(ManufacturerId, ProductId, u32)>,
    pub completed_rnd: Vec<(ManufacturerId, PartKind, u8)>,
    pub repairs_generated: Vec<(ManufacturerId, ProductId, u32)>,
    pub reputation_deltas: Vec<(ManufacturerId, f32)>,
    pub tech_advanced: bool,
}

/// Failures of company operations. All are recoverable; the caller decides
/// whether to retry or skip.
#[derive(Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("unknown manufacturer {0:?}")]
    UnknownManufacturer(ManufacturerId),
    #[error("blueprint name {0:?} already exists")]
    DuplicateBlueprintName(String),
    #[error("{part:?} tier {tier} not unlocked yet (current: {unlocked})")]
    TierNotUnlocked { part: PartKind, tier: u8, unlocked: u8 },
    #[error("tier {tier} outside the current tech window [{min}, {max}]")]
    TierOutsideWindow { tier: u8, min: u8, max: u8 },
    #[error("{part:?} tiers unlock sequentially (current: {current}, requested: {target})")]
    TierNotSequential { part: PartKind, current: u8, target: u8 },
    #[error("{part:?} tier {tier} is already unlocked")]
    AlreadyUnlocked { part: PartKind, tier: u8 },
    #[error("already researching {part:?} tier {tier}")]
    AlreadyResearching { part: PartKind, tier: u8 },
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("factory capacity exceeded: requested {requested}, remaining {remaining}")]
    CapacityExceeded { requested: u32, remaining: u32 },
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// The whole simulation: companies, market, and the technology era.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub config: GameConfig,
    pub manufacturers: Vec<Manufacturer>,
    pub progress: Vec<CompanyProgress>,
    pub market: CustomerMarket,
    pub global_month: u32,
    pub tech_level: u32,
    pub months_until_tech_advance: u32,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        let months_until_tech_advance = config.tech_advance_interval;
        Self {
            config,
            manufacturers: Vec::new(),
            progress: Vec::new(),
            market: CustomerMarket::new(),
            global_month: 0,
            tech_level: 1,
            months_until_tech_advance,
        }
    }

    /// Populate the buyer market. Idempotent, safe to call once per game.
    pub fn initialize_market(&mut self) {
        self.market.initialize(self.config.market_size);
    }

    /// Register a new company with starting cash and base unlocked tiers.
    pub fn add_company(&mut self, name: &str) -> ManufacturerId {
        let id = ManufacturerId(self.manufacturers.len() as u32);
        self.manufacturers
            .push(Manufacturer::new(id, name, self.config.starting_cash));
        self.progress.push(CompanyProgress::new());
        id
    }

    /// Tier range currently available for design and research.
    pub fn tier_window(&self) -> (u8, u8) {
        let min = self.tech_level.min(u32::from(MAX_TIER)) as u8;
        let max = (self.tech_level + u32::from(TECH_WINDOW_SPAN) - 1).min(u32::from(MAX_TIER)) as u8;
        (min, max)
    }

    fn company_index(&self, id: ManufacturerId) -> Result<usize, RuntimeError> {
        let idx = id.0 as usize;
        if idx < self.manufacturers.len() && self.manufacturers[idx].id == id {
            Ok(idx)
        } else {
            Err(RuntimeError::UnknownManufacturer(id))
        }
    }

    pub fn manufacturer(&self, id: ManufacturerId) -> Result<&Manufacturer, RuntimeError> {
        self.company_index(id).map(|idx| &self.manufacturers[idx])
    }

    pub fn manufacturer_mut(&mut self, id: ManufacturerId) -> Result<&mut Manufacturer, RuntimeError> {
        let idx = self.company_index(id)?;
        Ok(&mut self.manufacturers[idx])
    }

    pub fn company_progress(&self, id: ManufacturerId) -> Result<&CompanyProgress, RuntimeError> {
        self.company_index(id).map(|idx| &self.progress[idx])
    }

    /// Start unlocking the next tier of a component. Tiers unlock one at a
    /// time, inside the current tech window, and cost cash up front.
    pub fn start_rnd(&mut self, id: ManufacturerId, part: PartKind, target_tier: u8) -> Result<(), RuntimeError> {
        let (window_min, window_max) = self.tier_window();
        let idx = self.company_index(id)?;
        let current = self.progress[idx].unlocked_tier(part);
        if target_tier <= current {
            return Err(RuntimeError::AlreadyUnlocked { part, tier: target_tier });
        }
        if target_tier != current + 1 {
            return Err(RuntimeError::TierNotSequential { part, current, target: target_tier });
        }
        if target_tier < window_min || target_tier > window_max {
            return Err(RuntimeError::TierOutsideWindow {
                tier: target_tier,
                min: window_min,
                max: window_max,
            });
        }
        if self.progress[idx]
            .ongoing_rnd
            .iter()
            .any(|p| p.part == part && p.target_tier == target_tier)
        {
            return Err(RuntimeError::AlreadyResearching { part, tier: target_tier });
        }
        let (cost, months) =
            rnd_config(target_tier).ok_or(RuntimeError::Core(CoreError::TierOutOfRange(target_tier)))?;
        let mfr = &mut self.manufacturers[idx];
        if mfr.state.cash < cost {
            return Err(RuntimeError::InsufficientFunds { needed: cost, available: mfr.state.cash });
        }
        mfr.state.cash -= cost;
        self.progress[idx].ongoing_rnd.push(RndProject {
            part,
            target_tier,
            months_remaining: months,
        });
        Ok(())
    }

    /// Validate a draft against unlocked tiers and the tech window, assign a
    /// product id, and add the blueprint to the catalog. The launch price is
    /// recorded in the price history.
    pub fn create_blueprint(&mut self, id: ManufacturerId, draft: BlueprintDraft) -> Result<ProductId, RuntimeError> {
        let (window_min, window_max) = self.tier_window();
        let month = self.global_month;
        let idx = self.company_index(id)?;
        for (kind, spec) in draft.parts() {
            if spec.tier < window_min || spec.tier > window_max {
                return Err(RuntimeError::TierOutsideWindow {
                    tier: spec.tier,
                    min: window_min,
                    max: window_max,
                });
            }
            let unlocked = self.progress[idx].unlocked_tier(kind);
            if spec.tier > unlocked {
                return Err(RuntimeError::TierNotUnlocked { part: kind, tier: spec.tier, unlocked });
            }
        }
        let mfr = &mut self.manufacturers[idx];
        if mfr.catalog.values().any(|bp| bp.name == draft.name) {
            return Err(RuntimeError::DuplicateBlueprintName(draft.name.clone()));
        }
        let product = ProductId(self.progress[idx].next_product_id);
        let blueprint = PhoneBlueprint {
            id: product,
            name: draft.name,
            soc: draft.soc,
            battery: draft.battery,
            screen: draft.screen,
            ram: draft.ram,
            camera: draft.camera,
            storage: draft.storage,
            casing: draft.casing,
            fingerprint: draft.fingerprint,
            price: draft.price,
        };
        let mfr = &mut self.manufacturers[idx];
        mfr.add_blueprint(blueprint)?;
        mfr.state.track_price(product, month, draft.price);
        self.progress[idx].next_product_id += 1;
        Ok(product)
    }

    /// Reprice a product; the change lands in the trailing price history
    /// that the reputation recomputation watches.
    pub fn set_price(&mut self, id: ManufacturerId, product: ProductId, price: Decimal) -> Result<(), RuntimeError> {
        if price <= Decimal::ZERO {
            return Err(RuntimeError::Core(CoreError::NonPositivePrice));
        }
        let month = self.global_month;
        let idx = self.company_index(id)?;
        let mfr = &mut self.manufacturers[idx];
        let blueprint = mfr
            .catalog
            .get_mut(&product)
            .ok_or(RuntimeError::Core(CoreError::UnknownProduct(product)))?;
        blueprint.price = price;
        mfr.state.track_price(product, month, price);
        Ok(())
    }

    /// Order units built. Parts are paid for up front, the monthly factory
    /// capacity is consumed, and the units arrive next month.
    pub fn queue_production(&mut self, id: ManufacturerId, product: ProductId, quantity: u32) -> Result<(), RuntimeError> {
        if quantity == 0 {
            return Err(RuntimeError::Core(CoreError::InvalidQuantity(0)));
        }
        let capacity = self.config.factory_capacity;
        let idx = self.company_index(id)?;
        let remaining = capacity.saturating_sub(self.progress[idx].capacity_used);
        if quantity > remaining {
            return Err(RuntimeError::CapacityExceeded { requested: quantity, remaining });
        }
        let mfr = &mut self.manufacturers[idx];
        let blueprint = mfr
            .catalog
            .get(&product)
            .ok_or(RuntimeError::Core(CoreError::UnknownProduct(product)))?;
        let cost = blueprint.production_cost() * Decimal::from(quantity);
        if mfr.state.cash < cost {
            return Err(RuntimeError::InsufficientFunds { needed: cost, available: mfr.state.cash });
        }
        mfr.state.cash -= cost;
        let progress = &mut self.progress[idx];
        progress.capacity_used += quantity;
        progress.factory_queue.push(FactoryOrder { product, quantity, months_remaining: 1 });
        Ok(())
    }

    /// Advance one month through the fixed pipeline. Stage order is a hard
    /// contract: sales run against the inventory that existed when the month
    /// started, and reputation sees the same month's repair rejections.
    pub fn advance_month(&mut self, rng: &mut impl Rng) -> MonthReport {
        self.global_month += 1;
        let month = self.global_month;
        let tech_level = self.tech_level;
        self.market.current_month = month;

        // 1. Sales against prior inventory.
        let sales = self.market.simulate_purchases(&mut self.manufacturers, tech_level);

        // 2. Manufacturing completion; the monthly capacity budget resets.
        let mut completed_orders = Vec::new();
        for (mfr, progress) in self.manufacturers.iter_mut().zip(self.progress.iter_mut()) {
            progress.capacity_used = 0;
            let mut still_building = Vec::with_capacity(progress.factory_queue.len());
            for mut order in progress.factory_queue.drain(..) {
                order.months_remaining = order.months_remaining.saturating_sub(1);
                if order.months_remaining == 0 {
                    mfr.state.add_inventory(order.product, order.quantity);
                    completed_orders.push((mfr.id, order.product, order.quantity));
                } else {
                    still_building.push(order);
                }
            }
            progress.factory_queue = still_building;
        }

        // 3. R&D progression.
        let mut completed_rnd = Vec::new();
        for (mfr, progress) in self.manufacturers.iter().zip(self.progress.iter_mut()) {
            let mut finished = Vec::new();
            progress.ongoing_rnd.retain_mut(|project| {
                project.months_remaining = project.months_remaining.saturating_sub(1);
                if project.months_remaining == 0 {
                    finished.push((project.part, project.target_tier));
                    false
                } else {
                    true
                }
            });
            for (part, tier) in finished {
                let unlocked = progress.unlocked_tiers.entry(part).or_insert(0);
                if *unlocked < tier {
                    *unlocked = tier;
                }
                completed_rnd.push((mfr.id, part, tier));
            }
        }

        // 4. Repair generation.
        let mut repairs_generated = Vec::new();
        for mfr in self.manufacturers.iter_mut() {
            for (product, count) in sim_brand::generate_repairs(mfr, rng) {
                repairs_generated.push((mfr.id, product, count));
            }
        }

        // 5. Reputation recomputation, after repairs so rejection penalties
        // reflect this month.
        let mut reputation_deltas = Vec::new();
        for mfr in self.manufacturers.iter_mut() {
            reputation_deltas.push((mfr.id, sim_brand::recompute_reputation(mfr, tech_level)));
        }

        // 6. Tech-level check.
        let mut tech_advanced = false;
        self.months_until_tech_advance = self.months_until_tech_advance.saturating_sub(1);
        if self.months_until_tech_advance == 0 {
            self.tech_level += 1;
            self.months_until_tech_advance = self.config.tech_advance_interval;
            let (_, window_max) = self.tier_window();
            for progress in self.progress.iter_mut() {
                for part in PartKind::ALL {
                    let unlocked = progress.unlocked_tiers.entry(part).or_insert(0);
                    if *unlocked < window_max {
                        *unlocked = window_max;
                    }
                }
            }
            tech_advanced = true;
            info!(tech_level = self.tech_level, "global technology advanced");
        }

        info!(month, units = sales.total_units(), "month advanced");
        MonthReport {
            month,
            sales,
            completed_orders,
            completed_rnd,
            repairs_generated,
            reputation_deltas,
            tech_advanced,
        }
    }
}
