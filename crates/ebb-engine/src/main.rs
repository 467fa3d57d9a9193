//! Engine binary for the Ebb Bloom law engine.
//!
//! Loads configuration, seeds a demo world, runs it for a bounded number
//! of ticks and logs the final statistics as JSON.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$EBB_CONFIG` or `ebb-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the World and seed the demo scenario
//! 4. Load the physics backend
//! 5. Install the Ctrl-C handler
//! 6. Run until a bound is hit or Ctrl-C
//! 7. Tear down and log the result

mod error;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use ebb_core::runner::{self, NoOpCallback};
use ebb_core::{LawConfig, LogFormat, RunControl, World};
use ebb_events::TracingSink;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, seeding or the run loop fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration comes first so it can pick the log level.
    let (config, config_path) = load_config()?;

    // 2. Logging.
    init_logging(&config).context("installing the tracing subscriber")?;
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        policy = ?config.world.violation_policy,
        config = ?config_path,
        "ebb-engine starting"
    );

    // 3. World.
    let mut world = World::new(&config, Arc::new(TracingSink));
    let seeded = seed::seed_world(&mut world, config.world.seed).map_err(EngineError::from)?;
    info!(entities = seeded.total(), "World assembled");

    // 4. Physics.
    let physics = world.initialize().await;
    info!(physics = ?physics, "Law orchestrator initialized");

    // 5. Run control and Ctrl-C.
    let control = Arc::new(RunControl::new(&config.run));
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping after the current tick");
                    control.request_stop();
                    control.resume();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });
    }

    // 6. Run.
    let summary = runner::run_simulation(&mut world, &control, config.run.tick_delta, &mut NoOpCallback)
        .await
        .map_err(EngineError::from)?;
    runner::log_run_end(&summary, &world);

    // 7. Report and tear down.
    let statistics = serde_json::to_string_pretty(&world.statistics()).context("serializing world statistics")?;
    info!(statistics = %statistics, "Final statistics");
    world.destroy();

    info!(
        end_reason = ?summary.end_reason,
        total_ticks = summary.total_ticks,
        "ebb-engine shutdown complete"
    );
    Ok(())
}

/// Load configuration from `$EBB_CONFIG`, then `ebb-config.yaml` in the
/// working directory, falling back to defaults.
fn load_config() -> Result<(LawConfig, Option<PathBuf>), EngineError> {
    let path = std::env::var_os("EBB_CONFIG").map_or_else(|| PathBuf::from("ebb-config.yaml"), PathBuf::from);
    if path.exists() {
        let config = LawConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = LawConfig::default();
        config.apply_env_overrides();
        Ok((config, None))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(config: &LawConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match config.logging.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}
