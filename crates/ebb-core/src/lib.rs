//! Law orchestrator, World façade and run loop for the Ebb Bloom law engine.
//!
//! This crate ties the law systems of `ebb-laws` to an entity store and a
//! conservation ledger and drives them tick by tick.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `ebb-config.yaml` into
//!   strongly-typed structs.
//! - [`clock`] -- Tick counter and simulated time.
//! - [`orchestrator`] -- [`LawOrchestrator`]: the fixed law roster with
//!   per-system fault isolation.
//! - [`world`] -- [`World`]: store, spatial index and orchestrator behind
//!   one mutation surface.
//! - [`control`] -- [`RunControl`]: pause, stop, pacing and bounds.
//! - [`runner`] -- [`run_simulation`](runner::run_simulation): the bounded
//!   async run loop.

pub mod clock;
pub mod config;
pub mod control;
pub mod orchestrator;
pub mod runner;
pub mod world;

pub use clock::{ClockError, SimulationClock};
pub use config::{ConfigError, LawConfig, LogFormat};
pub use control::{RunControl, RunEndReason};
pub use orchestrator::{
    LawOrchestrator, OrchestratorState, OrchestratorStatistics, SystemOutcome, SystemReport,
    SystemStats, TickReport,
};
pub use runner::{NoOpCallback, RunSummary, RunnerError, TickCallback};
pub use world::{World, WorldError, WorldStatistics};
