//! Bounded, paced run loop.
//!
//! [`run_simulation`] ticks a [`World`] until a bound is hit or a stop is
//! requested, honouring pause and the tick interval between ticks. Ticks
//! themselves are synchronous; the loop is async only so it can sleep and
//! wait for resume without blocking a runtime thread.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::{ClockError, SimulationClock};
use crate::control::{RunControl, RunEndReason};
use crate::orchestrator::{OrchestratorState, TickReport};
use crate::world::World;

/// Errors that stop a run before its first tick.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The World was not initialised.
    #[error("world is not initialized")]
    NotInitialized,

    /// The configured step is unusable.
    #[error("invalid tick delta: {source}")]
    InvalidDelta {
        /// The clock's objection.
        #[from]
        source: ClockError,
    },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Why the loop stopped.
    pub end_reason: RunEndReason,
    /// Report of the last tick, if any ran.
    pub final_report: Option<TickReport>,
    /// Ticks run by this call.
    pub total_ticks: u64,
    /// System failures across those ticks.
    pub total_failures: u64,
}

/// Hook called after every tick.
pub trait TickCallback: Send {
    /// Called with the tick's report and the World after re-indexing.
    fn on_tick(&mut self, report: &TickReport, world: &World);
}

/// A callback that does nothing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _report: &TickReport, _world: &World) {}
}

/// Tick `world` by `delta` until `control` says to stop.
///
/// The stop request and wall-clock limit are checked before each tick,
/// the tick limit after it. The tick limit counts the World's completed
/// ticks, so a resumed World stops at the same total.
///
/// # Errors
///
/// [`RunnerError::NotInitialized`] when the World has not been
/// initialised, [`RunnerError::InvalidDelta`] for a negative or
/// non-finite `delta`.
pub async fn run_simulation(
    world: &mut World,
    control: &Arc<RunControl>,
    delta: f64,
    callback: &mut dyn TickCallback,
) -> Result<RunSummary, RunnerError> {
    SimulationClock::check_delta(delta)?;
    if world.orchestrator().state() != OrchestratorState::Running {
        return Err(RunnerError::NotInitialized);
    }

    let mut final_report: Option<TickReport> = None;
    let mut total_ticks: u64 = 0;
    let mut total_failures: u64 = 0;

    info!(
        delta,
        max_ticks = control.max_ticks(),
        max_real_time_seconds = control.max_real_time_seconds(),
        tick_interval_ms = control.tick_interval_ms(),
        "Run starting"
    );

    let end_reason = loop {
        if control.is_paused() {
            info!("Run paused, waiting for resume...");
            control.wait_if_paused().await;
            info!("Run resumed");
        }

        if control.is_stop_requested() {
            info!("Stop requested");
            break RunEndReason::Stopped;
        }

        if control.time_limit_reached() {
            info!(
                max_seconds = control.max_real_time_seconds(),
                elapsed = control.elapsed_seconds(),
                "Real-time limit reached"
            );
            break RunEndReason::MaxRealTimeReached;
        }

        if control.tick_limit_reached(world.orchestrator().clock().tick()) {
            break RunEndReason::MaxTicksReached;
        }

        let Some(report) = world.tick(delta) else {
            // Only reachable if the World was destroyed underneath us.
            warn!("Tick did not run, stopping");
            break RunEndReason::Stopped;
        };
        total_ticks = total_ticks.saturating_add(1);
        total_failures = total_failures.saturating_add(u64::try_from(report.failures).unwrap_or(u64::MAX));
        callback.on_tick(&report, world);

        let reached = control.tick_limit_reached(report.tick);
        final_report = Some(report);
        if reached {
            info!(tick = world.orchestrator().clock().tick(), max_ticks = control.max_ticks(), "Tick limit reached");
            break RunEndReason::MaxTicksReached;
        }

        let interval_ms = control.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        }
    };

    control.set_end_reason(end_reason).await;
    Ok(RunSummary {
        end_reason,
        final_report,
        total_ticks,
        total_failures,
    })
}

/// Log how a run ended.
pub fn log_run_end(summary: &RunSummary, world: &World) {
    info!(
        reason = ?summary.end_reason,
        total_ticks = summary.total_ticks,
        total_failures = summary.total_failures,
        final_tick = summary.final_report.as_ref().map(|r| r.tick),
        "Run ended"
    );
    if summary.final_report.is_none() {
        warn!("Run ended with no ticks executed");
        return;
    }
    let totals = world.ledger_totals();
    info!(
        entities = world.len(),
        mass = totals.mass,
        energy = totals.energy,
        charge = totals.charge,
        violations = world.violations().len(),
        "Final world state"
    );
}
