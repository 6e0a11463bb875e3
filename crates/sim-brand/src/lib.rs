#![deny(warnings)]

//! Brand reputation and repair feedback for Phone Tycoon.
//!
//! Each month, sold units generate repair demand from their return rate
//! (stochastically rounded with an injected RNG), manufacturers settle or
//! reject pending repairs, and a reputation delta is recomputed from build
//! quality, component grades, price volatility, and rejected repairs.

use rand::Rng;
use rust_decimal::Decimal;
use sim_core::{Manufacturer, PricePoint, ProductId};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Most reputation a single month of rejected repairs can cost.
pub const REPAIR_REJECTION_CAP: f32 = 10.0;
/// Casing tier at or below which a premium-tier product reads as cheap.
pub const CHEAP_CASING_TIER: u8 = 2;

/// Failures while handling repairs.
#[derive(Debug, Error, PartialEq)]
pub enum BrandError {
    #[error("unknown product {0:?}")]
    UnknownProduct(ProductId),
    #[error("invalid quantity {0}")]
    InvalidQuantity(u32),
    #[error("requested {requested} repairs but only {pending} pending")]
    ExceedsPending { requested: u32, pending: u32 },
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
}

/// Generate this month's repair demand for every product with sales.
///
/// Expected repairs are `sold x return rate / 100`; the integer floor is
/// guaranteed and the fractional remainder becomes one extra repair with
/// matching probability. Newly generated counts are added to the pending
/// totals and returned per product.
pub fn generate_repairs(manufacturer: &mut Manufacturer, rng: &mut impl Rng) -> BTreeMap<ProductId, u32> {
    let mut generated = BTreeMap::new();
    for (pid, bp) in &manufacturer.catalog {
        let sold = manufacturer.state.units_sold.get(pid).copied().unwrap_or(0);
        if sold == 0 {
            continue;
        }
        let expected = sold as f64 * f64::from(bp.return_rate()) / 100.0;
        let mut repairs = expected.floor() as u32;
        let fraction = expected.fract();
        if fraction > 0.0 && rng.gen::<f64>() < fraction {
            repairs += 1;
        }
        if repairs > 0 {
            generated.insert(*pid, repairs);
        }
    }
    for (pid, repairs) in &generated {
        *manufacturer.state.pending_repairs.entry(*pid).or_insert(0) += repairs;
    }
    debug!(manufacturer = %manufacturer.name, products = generated.len(), "repairs generated");
    generated
}

/// Settle `quantity` pending repairs: pays the per-unit repair cost and
/// clears them. Returns the total cost paid.
pub fn repair_units(
    manufacturer: &mut Manufacturer,
    product: ProductId,
    quantity: u32,
) -> Result<Decimal, BrandError> {
    let pending = take_pending(manufacturer, product, quantity)?;
    let bp = manufacturer
        .catalog
        .get(&product)
        .ok_or(BrandError::UnknownProduct(product))?;
    let cost = bp.repair_cost() * Decimal::from(quantity);
    if manufacturer.state.cash < cost {
        return Err(BrandError::InsufficientFunds {
            needed: cost,
            available: manufacturer.state.cash,
        });
    }
    manufacturer.state.cash -= cost;
    set_pending(manufacturer, product, pending - quantity);
    Ok(cost)
}

/// Reject `quantity` pending repairs: clears them and accrues the
/// rejected-repair counter that the monthly recomputation will punish.
pub fn reject_units(
    manufacturer: &mut Manufacturer,
    product: ProductId,
    quantity: u32,
) -> Result<(), BrandError> {
    let pending = take_pending(manufacturer, product, quantity)?;
    set_pending(manufacturer, product, pending - quantity);
    manufacturer.state.rejected_repairs_this_month += quantity;
    Ok(())
}

fn take_pending(manufacturer: &Manufacturer, product: ProductId, quantity: u32) -> Result<u32, BrandError> {
    if quantity == 0 {
        return Err(BrandError::InvalidQuantity(0));
    }
    if !manufacturer.catalog.contains_key(&product) {
        return Err(BrandError::UnknownProduct(product));
    }
    let pending = manufacturer
        .state
        .pending_repairs
        .get(&product)
        .copied()
        .unwrap_or(0);
    if quantity > pending {
        return Err(BrandError::ExceedsPending { requested: quantity, pending });
    }
    Ok(pending)
}

fn set_pending(manufacturer: &mut Manufacturer, product: ProductId, remaining: u32) {
    if remaining == 0 {
        manufacturer.state.pending_repairs.remove(&product);
    } else {
        manufacturer.state.pending_repairs.insert(product, remaining);
    }
}

/// Recompute the monthly reputation delta from four signals, apply it
/// (clamped into [0,100]), and return the raw delta.
///
/// - -1 per premium-tier product with a cheap casing;
/// - -2 per product with any Reduced mandatory part, +2 per product with
///   any Premium mandatory part;
/// - -2 per product whose trailing price history jumped more than 20%
///   month over month;
/// - -1 per rejected repair this month, capped at
///   [`REPAIR_REJECTION_CAP`]; the counter resets afterwards.
pub fn recompute_reputation(manufacturer: &mut Manufacturer, tech_level: u32) -> f32 {
    let mut delta = 0.0f32;
    for bp in manufacturer.catalog.values() {
        if bp.market_tier(tech_level).is_premium() && bp.casing.tier <= CHEAP_CASING_TIER {
            delta -= 1.0;
        }
        let mut any_reduced = false;
        let mut any_premium = false;
        for (_, part) in bp.mandatory_parts() {
            match part.grade {
                sim_core::QualityGrade::Reduced => any_reduced = true,
                sim_core::QualityGrade::Premium => any_premium = true,
                sim_core::QualityGrade::Standard => {}
            }
        }
        if any_reduced {
            delta -= 2.0;
        }
        if any_premium {
            delta += 2.0;
        }
        if let Some(history) = manufacturer.state.price_history.get(&bp.id) {
            if history_is_volatile(history) {
                delta -= 2.0;
            }
        }
    }
    let rejected = manufacturer.state.rejected_repairs_this_month as f32;
    delta -= rejected.min(REPAIR_REJECTION_CAP);
    manufacturer.state.rejected_repairs_this_month = 0;

    manufacturer.state.adjust_reputation(delta);
    debug!(manufacturer = %manufacturer.name, delta, reputation = manufacturer.state.reputation, "reputation recomputed");
    delta
}

/// True when any consecutive pair in the trailing history moved by more
/// than 20% month over month.
fn history_is_volatile(history: &[PricePoint]) -> bool {
    history.windows(2).any(|pair| {
        let prev = pair[0].price;
        let next = pair[1].price;
        if prev <= Decimal::ZERO {
            return false;
        }
        (next - prev).abs() > prev * Decimal::new(2, 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sim_core::{Manufacturer, ManufacturerId, PhoneBlueprint, ProductId, QualityGrade};

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn maker_with(bp: PhoneBlueprint) -> Manufacturer {
        let mut m = Manufacturer::new(ManufacturerId(0), "Acme", Decimal::new(100_000, 0));
        m.add_blueprint(bp).unwrap();
        m
    }

    fn midrange() -> PhoneBlueprint {
        PhoneBlueprint::uniform(ProductId(0), "Mid", 3, QualityGrade::Standard, Decimal::new(500, 0))
    }

    #[test]
    fn repairs_floor_is_guaranteed() {
        // 1000 sold at a 4.0% return rate: exactly 40 repairs, no fraction.
        let mut m = maker_with(midrange());
        m.state.units_sold.insert(ProductId(0), 1_000);
        let generated = generate_repairs(&mut m, &mut rng());
        assert_eq!(generated.get(&ProductId(0)), Some(&40));
        assert_eq!(m.state.pending_repairs.get(&ProductId(0)), Some(&40));
    }

    #[test]
    fn fractional_repairs_round_stochastically_but_deterministically() {
        // 10 sold at 4.0%: expected 0.4 repairs, so 0 or 1 depending on the
        // seeded draw. The same seed always gives the same answer.
        let run = |seed: u64| {
            let mut m = maker_with(midrange());
            m.state.units_sold.insert(ProductId(0), 10);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            generate_repairs(&mut m, &mut rng)
                .get(&ProductId(0))
                .copied()
                .unwrap_or(0)
        };
        for seed in 0..20 {
            let first = run(seed);
            assert!(first <= 1);
            assert_eq!(first, run(seed), "same seed must reproduce");
        }
    }

    #[test]
    fn products_without_sales_generate_nothing() {
        let mut m = maker_with(midrange());
        let generated = generate_repairs(&mut m, &mut rng());
        assert!(generated.is_empty());
        assert!(m.state.pending_repairs.is_empty());
    }

    #[test]
    fn repairing_pays_and_clears() {
        let mut m = maker_with(midrange());
        m.state.pending_repairs.insert(ProductId(0), 10);
        // Repair cost is 30% of the 350 production cost = 105 per unit.
        let cost = repair_units(&mut m, ProductId(0), 4).unwrap();
        assert_eq!(cost, Decimal::new(420, 0));
        assert_eq!(m.state.cash, Decimal::new(99_580, 0));
        assert_eq!(m.state.pending_repairs.get(&ProductId(0)), Some(&6));

        let err = repair_units(&mut m, ProductId(0), 7).unwrap_err();
        assert_eq!(err, BrandError::ExceedsPending { requested: 7, pending: 6 });
    }

    #[test]
    fn repairing_needs_funds() {
        let mut m = maker_with(midrange());
        m.state.cash = Decimal::new(100, 0);
        m.state.pending_repairs.insert(ProductId(0), 10);
        assert!(matches!(
            repair_units(&mut m, ProductId(0), 10),
            Err(BrandError::InsufficientFunds { .. })
        ));
        // Nothing was cleared.
        assert_eq!(m.state.pending_repairs.get(&ProductId(0)), Some(&10));
    }

    #[test]
    fn rejecting_accrues_the_monthly_counter() {
        let mut m = maker_with(midrange());
        m.state.pending_repairs.insert(ProductId(0), 10);
        reject_units(&mut m, ProductId(0), 5).unwrap();
        assert_eq!(m.state.pending_repairs.get(&ProductId(0)), Some(&5));
        assert_eq!(m.state.rejected_repairs_this_month, 5);
        assert_eq!(
            reject_units(&mut m, ProductId(0), 0),
            Err(BrandError::InvalidQuantity(0))
        );
    }

    #[test]
    fn fifteen_rejections_cost_exactly_ten_points() {
        let mut m = maker_with(midrange());
        m.state.pending_repairs.insert(ProductId(0), 15);
        reject_units(&mut m, ProductId(0), 15).unwrap();
        let delta = recompute_reputation(&mut m, 1);
        assert_eq!(delta, -10.0);
        assert_eq!(m.state.reputation, 40.0);
        assert_eq!(m.state.rejected_repairs_this_month, 0, "counter resets");
        // The month after, with nothing rejected, the penalty is gone.
        assert_eq!(recompute_reputation(&mut m, 1), 0.0);
    }

    #[test]
    fn cheap_casing_on_a_premium_product_penalizes_immediately() {
        let mut flagship = PhoneBlueprint::uniform(
            ProductId(0),
            "Pro Max",
            5,
            QualityGrade::Standard,
            Decimal::new(2_000, 0),
        );
        flagship.casing.tier = 1;
        // Score 96: still flagship at tech level 1.
        assert!(flagship.market_tier(1).is_premium());
        let mut m = maker_with(flagship);
        let delta = recompute_reputation(&mut m, 1);
        assert_eq!(delta, -1.0);
        assert_eq!(m.state.reputation, 49.0);
    }

    #[test]
    fn tech_advancement_downgrades_the_tier_and_clears_the_penalty() {
        let mut flagship = PhoneBlueprint::uniform(
            ProductId(0),
            "Pro",
            5,
            QualityGrade::Standard,
            Decimal::new(2_000, 0),
        );
        flagship.casing.tier = 1;
        let mut m = maker_with(flagship);
        // At tech level 3 the same design is only midrange: no penalty.
        assert_eq!(recompute_reputation(&mut m, 3), 0.0);
    }

    #[test]
    fn component_grades_move_reputation_both_ways() {
        let mut mixed = midrange();
        mixed.soc.grade = QualityGrade::Premium;
        mixed.casing.grade = QualityGrade::Reduced;
        let mut m = maker_with(mixed);
        // Both signals fire on the same product.
        assert_eq!(recompute_reputation(&mut m, 1), 0.0);

        let mut premium_only = midrange();
        premium_only.battery.grade = QualityGrade::Premium;
        let mut m = maker_with(premium_only);
        assert_eq!(recompute_reputation(&mut m, 1), 2.0);

        let mut reduced_only = midrange();
        reduced_only.storage.grade = QualityGrade::Reduced;
        let mut m = maker_with(reduced_only);
        assert_eq!(recompute_reputation(&mut m, 1), -2.0);
    }

    #[test]
    fn price_swings_over_twenty_percent_penalize() {
        let mut m = maker_with(midrange());
        m.state.track_price(ProductId(0), 1, Decimal::new(500, 0));
        m.state.track_price(ProductId(0), 2, Decimal::new(650, 0)); // +30%
        assert_eq!(recompute_reputation(&mut m, 1), -2.0);

        // A steady history is fine: exactly 20% is not "exceeding".
        let mut m = maker_with(midrange());
        m.state.track_price(ProductId(0), 1, Decimal::new(500, 0));
        m.state.track_price(ProductId(0), 2, Decimal::new(600, 0)); // +20%
        m.state.track_price(ProductId(0), 3, Decimal::new(540, 0)); // -10%
        assert_eq!(recompute_reputation(&mut m, 1), 0.0);
    }

    #[test]
    fn reputation_stays_in_bounds_under_any_history() {
        let mut reduced = midrange();
        reduced.soc.grade = QualityGrade::Reduced;
        let mut m = maker_with(reduced);
        m.state.reputation = 1.0;
        for _ in 0..50 {
            m.state.pending_repairs.insert(ProductId(0), 15);
            reject_units(&mut m, ProductId(0), 15).unwrap();
            recompute_reputation(&mut m, 1);
            assert!((0.0..=100.0).contains(&m.state.reputation));
        }
        assert_eq!(m.state.reputation, 0.0);

        let mut premium = midrange();
        premium.screen.grade = QualityGrade::Premium;
        let mut m = maker_with(premium);
        m.state.reputation = 99.0;
        for _ in 0..50 {
            recompute_reputation(&mut m, 1);
            assert!((0.0..=100.0).contains(&m.state.reputation));
        }
        assert_eq!(m.state.reputation, 100.0);
    }
}
