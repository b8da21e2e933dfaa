use anyhow::Context;
use tracing::info;

use latticeforge::{run_simulation, SimulationConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .context("usage: latticeforge <simulation.toml>")?;
    let config = SimulationConfig::from_file(&config_path)
        .with_context(|| format!("loading {config_path}"))?;

    info!("starting simulation {}", config.name);
    let outcome = run_simulation(&config)?;
    info!(
        frames = outcome.frames,
        chunks = outcome.chunks,
        run_id = %outcome.run_id,
        "run {} recorded to {}",
        outcome.status.as_str(),
        outcome.run_dir.display()
    );
    Ok(())
}
