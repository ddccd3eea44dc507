use ambient::config::{load_config, AmbientConfig};
use ambient::sim::{run_update_logger, Simulation};
use anyhow::Result;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ambient=info".into()),
        )
        .init();

    info!("Ambient starting...");

    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Loading configuration");
            load_config(&path)?
        }
        None => AmbientConfig::default(),
    };
    config.simulation.apply_env();

    let mut sim = Simulation::from_config(&config)?;
    let logger = tokio::spawn(run_update_logger(sim.board().subscribe()));

    let ticks = config.simulation.ticks;
    if config.simulation.realtime {
        let mut ticker = interval(Duration::from_millis(config.simulation.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        for _ in 0..ticks {
            ticker.tick().await;
            sim.step();
        }
    } else {
        sim.run(ticks);
    }

    for report in sim.reports() {
        info!(
            light = %report.name,
            state = %report.state,
            lamp = report.lamp_enabled,
            switches = report.switches,
            "Final state"
        );
    }
    info!(
        ticks = sim.ticks(),
        seconds = sim.now(),
        dead = sim.dead_count(),
        transitions = sim.strip().transitions_induced(),
        "Simulation finished"
    );

    println!("{}", serde_json::to_string_pretty(&sim.board().snapshot())?);

    // Dropping the board closes the update channel
    drop(sim);
    logger.await?;

    Ok(())
}
