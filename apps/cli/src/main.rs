#![deny(warnings)]

//! Headless CLI: runs a demo phone-market scenario for a number of months
//! and prints per-month KPIs.

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sim_core::{Manufacturer, ManufacturerId, PartSpec, ProductId, QualityGrade};
use sim_runtime::{BlueprintDraft, GameConfig, GameState};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    months: u32,
    seed: u64,
    market_size: u32,
    save: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        months: 24,
        seed: 42,
        market_size: sim_market::MARKET_SIZE,
        save: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--months" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.months = v;
                }
            }
            "--seed" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.seed = v;
                }
            }
            "--market-size" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.market_size = v;
                }
            }
            "--save" => args.save = it.next(),
            _ => {}
        }
    }
    args
}

/// Queue as many units as capacity and cash allow, up to `target`.
fn restock(game: &mut GameState, company: ManufacturerId, product: ProductId, target: u32) -> Result<u32> {
    let unit_cost = match game.manufacturer(company)?.blueprint(product) {
        Some(bp) => bp.production_cost(),
        None => return Ok(0),
    };
    let cash = game.manufacturer(company)?.state.cash;
    let affordable = (cash / unit_cost).floor().to_u32().unwrap_or(0);
    let quantity = target.min(affordable);
    if quantity == 0 {
        return Ok(0);
    }
    game.queue_production(company, product, quantity)?;
    Ok(quantity)
}

/// Settle what the balance covers, reject the rest.
fn handle_repairs(manufacturer: &mut Manufacturer) -> Result<()> {
    let pending: Vec<(ProductId, u32)> = manufacturer
        .state
        .pending_repairs
        .iter()
        .map(|(pid, count)| (*pid, *count))
        .collect();
    for (product, count) in pending {
        let per_unit = match manufacturer.blueprint(product) {
            Some(bp) => bp.repair_cost(),
            None => continue,
        };
        if manufacturer.state.cash >= per_unit * Decimal::from(count) {
            sim_brand::repair_units(manufacturer, product, count)?;
        } else {
            sim_brand::reject_units(manufacturer, product, count)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(months = args.months, seed = args.seed, market_size = args.market_size, "starting scenario");

    let mut game = GameState::new(GameConfig {
        market_size: args.market_size,
        rng_seed: args.seed,
        ..GameConfig::default()
    });
    game.initialize_market();

    let acme = game.add_company("Acme Mobile");
    let mid = game.create_blueprint(acme, BlueprintDraft::uniform("Acme One", 3, Decimal::new(500, 0)))?;

    let bolt = game.add_company("Bolt Devices");
    let budget = game.create_blueprint(bolt, BlueprintDraft::uniform("Bolt Lite", 2, Decimal::new(250, 0)))?;
    let mut flagship_draft = BlueprintDraft::uniform("Bolt Ultra", 5, Decimal::new(2_500, 0));
    flagship_draft.battery = PartSpec::new(5, QualityGrade::Premium);
    flagship_draft.casing = PartSpec::new(5, QualityGrade::Premium);
    let flagship = game.create_blueprint(bolt, flagship_draft)?;

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    for _ in 0..args.months {
        let _ = restock(&mut game, acme, mid, 600)?;
        let _ = restock(&mut game, bolt, budget, 500)?;
        let _ = restock(&mut game, bolt, flagship, 100)?;

        let report = game.advance_month(&mut rng);

        for company in [acme, bolt] {
            handle_repairs(game.manufacturer_mut(company)?)?;
        }

        let owned = game.market.owned_population();
        println!(
            "Month {:>3} | sold: {:>5} | revenue: ${:>9} | owners: {:>6}/{} | tech: T{}",
            report.month,
            report.sales.total_units(),
            report.sales.total_revenue(),
            owned,
            game.config.market_size,
            game.tech_level,
        );
        for m in &game.manufacturers {
            info!(
                company = %m.name,
                cash = %m.state.cash,
                reputation = m.state.reputation,
                "company status"
            );
        }
    }

    if let Some(path) = &args.save {
        persistence::save_to_path(&game, path)?;
        println!("Saved game to {path}");
    }

    Ok(())
}
