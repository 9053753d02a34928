//! Parapool Scenario Binary
//!
//! Usage: `parapool-sim [SCENARIO] [--metrics]`

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parapool_sim::{Scenario, Simulation};

const DEFAULT_SCENARIO: &str = "scenarios/roulette.toml";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut path = DEFAULT_SCENARIO.to_string();
    let mut show_metrics = false;
    for arg in std::env::args().skip(1) {
        if arg == "--metrics" {
            show_metrics = true;
        } else {
            path = arg;
        }
    }

    let scenario = Scenario::load(&path)?;
    info!(
        %path,
        steps = scenario.steps.len(),
        tranches = scenario.pool.tranches.len(),
        "Loaded scenario"
    );

    let mut sim = Simulation::new(&scenario)?;
    let outcomes = sim.run(&scenario.steps)?;
    info!(steps = outcomes.len(), "Scenario complete");

    let snapshot = serde_json::to_string_pretty(&sim.snapshot()).context("encoding snapshot")?;
    println!("{snapshot}");
    if show_metrics {
        println!("{}", sim.render_metrics()?);
    }
    Ok(())
}
