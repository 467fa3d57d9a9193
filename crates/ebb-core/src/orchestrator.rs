//! Law orchestrator: runs the law systems once per tick, in order.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize().await──▶ Running ──destroy()──▶ Uninitialized
//! ```
//!
//! `initialize` loads the physics backend through the rigid-body bridge
//! (which disables itself on failure) and is the only async step. `tick`
//! before `initialize` logs a warning, emits `TickSkipped` and returns
//! `None`.
//!
//! # Fault isolation
//!
//! Every system returns `Result<(), LawError>`. An `Err` is logged with the
//! system's name, counted in its [`SystemStats`], emitted as
//! `SystemFailed`, and recorded in the [`TickReport`]. The remaining
//! systems still run and the failing one is called again next tick.
//!
//! # Ownership
//!
//! The orchestrator owns the ledger, the environment, the seeded RNG and
//! the clock. The store and the spatial index belong to the caller and are
//! lent for the duration of a tick.

use std::sync::Arc;

use ebb_events::{EventSink, LawEvent};
use ebb_laws::{
    AggregationSystem, BackendLoader, ConservationValidation, CosmicForcing,
    CulturalTransmission, Diffusion, Environment, EvolutionarySelection, LawSystem, Metabolism,
    PhysicsStatus, PopulationDynamics, ReactionKinetics, RigidBodyBridge, SystemContext,
    Thermodynamics, ViolationPolicy,
};
use ebb_ledger::{ConservationLedger, LedgerStatistics};
use ebb_store::{EntityStore, SpatialIndex};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::SimulationClock;
use crate::config::LawConfig;

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Built but not yet initialised, or destroyed.
    Uninitialized,
    /// Ticking.
    Running,
}

/// How one system fared in one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SystemOutcome {
    /// The system returned `Ok`.
    Completed,
    /// The system returned `Err`.
    Failed {
        /// Rendered error.
        error: String,
    },
}

/// One system's line in a [`TickReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemReport {
    /// System name.
    pub system: &'static str,
    /// What happened.
    pub outcome: SystemOutcome,
}

/// Result of one completed tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// The tick that ran (starting at 1).
    pub tick: u64,
    /// Simulated seconds advanced.
    pub delta: f64,
    /// Per-system outcomes in run order.
    pub systems: Vec<SystemReport>,
    /// Number of failed systems.
    pub failures: usize,
}

impl TickReport {
    /// Outcome of the named system, if it ran.
    pub fn outcome(&self, system: &str) -> Option<&SystemOutcome> {
        self.systems
            .iter()
            .find(|r| r.system == system)
            .map(|r| &r.outcome)
    }
}

/// Running counters for one system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    /// System name.
    pub name: &'static str,
    /// Successful updates.
    pub runs: u64,
    /// Failed updates.
    pub failures: u64,
    /// Most recent error, if any.
    pub last_error: Option<String>,
}

/// Snapshot of the orchestrator for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStatistics {
    /// Lifecycle state.
    pub state: OrchestratorState,
    /// Completed ticks.
    pub ticks: u64,
    /// Simulated seconds.
    pub elapsed: f64,
    /// Registered systems.
    pub system_count: usize,
    /// Per-system counters in run order.
    pub systems: Vec<SystemStats>,
    /// Rigid-body bridge state.
    pub physics: PhysicsStatus,
    /// Shared environment.
    pub environment: Environment,
    /// Ledger diagnostics.
    pub ledger: LedgerStatistics,
}

enum Stage {
    Law(Box<dyn LawSystem>),
    RigidBody,
}

/// Owns the law roster and runs it tick by tick.
pub struct LawOrchestrator {
    stages: Vec<Stage>,
    stats: Vec<SystemStats>,
    physics: RigidBodyBridge,
    ledger: ConservationLedger,
    environment: Environment,
    rng: SmallRng,
    sink: Arc<dyn EventSink>,
    policy: ViolationPolicy,
    state: OrchestratorState,
    clock: SimulationClock,
}

impl LawOrchestrator {
    fn empty(config: &LawConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            stages: Vec::new(),
            stats: Vec::new(),
            physics: RigidBodyBridge::new(config.physics.clone()),
            ledger: ConservationLedger::with_config(&config.ledger, Arc::clone(&sink)),
            environment: Environment::default(),
            rng: SmallRng::seed_from_u64(config.world.seed),
            sink,
            policy: config.world.violation_policy,
            state: OrchestratorState::Uninitialized,
            clock: SimulationClock::new(),
        }
    }

    /// The fixed roster: cosmic forcing, thermodynamics, reaction kinetics,
    /// diffusion, aggregation, conservation validation, rigid-body physics,
    /// metabolism, evolutionary selection, population dynamics, cultural
    /// transmission.
    pub fn standard(config: &LawConfig, sink: Arc<dyn EventSink>) -> Self {
        let mut orchestrator = Self::empty(config, sink);
        orchestrator.register(Box::new(CosmicForcing::new(config.cosmic.clone(), config.world.seed)));
        orchestrator.register(Box::new(Thermodynamics::new(config.thermodynamics.clone())));
        orchestrator.register(Box::new(ReactionKinetics::new(config.kinetics.clone())));
        orchestrator.register(Box::new(Diffusion::new(config.diffusion.clone())));
        orchestrator.register(Box::new(AggregationSystem::new(config.aggregation.clone())));
        orchestrator.register(Box::new(ConservationValidation::new(&config.validation)));
        orchestrator.register_rigid_body();
        orchestrator.register(Box::new(Metabolism::new(config.metabolism.clone())));
        orchestrator.register(Box::new(EvolutionarySelection::new(config.evolution.clone())));
        orchestrator.register(Box::new(PopulationDynamics::new(config.population.clone())));
        orchestrator.register(Box::new(CulturalTransmission::new(config.cultural.clone())));
        orchestrator
    }

    /// A roster of exactly `systems`, in the given order. The rigid-body
    /// bridge is not part of it.
    pub fn custom(config: &LawConfig, sink: Arc<dyn EventSink>, systems: Vec<Box<dyn LawSystem>>) -> Self {
        let mut orchestrator = Self::empty(config, sink);
        for system in systems {
            orchestrator.register(system);
        }
        orchestrator
    }

    fn register(&mut self, system: Box<dyn LawSystem>) {
        self.stats.push(SystemStats {
            name: system.name(),
            ..SystemStats::default()
        });
        self.stages.push(Stage::Law(system));
    }

    /// Append the rigid-body bridge to the roster.
    pub fn register_rigid_body(&mut self) {
        self.stats.push(SystemStats {
            name: self.physics.name(),
            ..SystemStats::default()
        });
        self.stages.push(Stage::RigidBody);
    }

    fn has_rigid_body(&self) -> bool {
        self.stages.iter().any(|s| matches!(s, Stage::RigidBody))
    }

    /// Load the physics backend (when the roster has the bridge) and start
    /// running. Idempotent while running.
    pub async fn initialize(&mut self, loader: &dyn BackendLoader) -> PhysicsStatus {
        if self.state == OrchestratorState::Running {
            return self.physics.status();
        }
        let physics = if self.has_rigid_body() {
            self.physics.initialize(loader, self.sink.as_ref()).await
        } else {
            self.physics.status()
        };
        self.state = OrchestratorState::Running;
        info!(
            systems = self.stages.len(),
            physics = ?physics,
            "Law orchestrator running"
        );
        physics
    }

    /// Run every system once over `store`.
    ///
    /// Returns `None` without running anything when the orchestrator is not
    /// running or `delta` is negative or non-finite.
    pub fn tick(&mut self, store: &mut EntityStore, spatial: &SpatialIndex, delta: f64) -> Option<TickReport> {
        if self.state != OrchestratorState::Running {
            let reason = "tick called before initialize".to_owned();
            warn!(%reason, "Tick skipped");
            self.sink.emit(LawEvent::TickSkipped { reason });
            return None;
        }
        if let Err(e) = SimulationClock::check_delta(delta) {
            warn!(error = %e, "Tick skipped");
            self.sink.emit(LawEvent::TickSkipped { reason: e.to_string() });
            return None;
        }

        let tick = self.clock.next_tick();
        let elapsed = self.clock.elapsed();
        let mut systems = Vec::with_capacity(self.stages.len());
        let mut failures = 0_usize;

        for (stage, stats) in self.stages.iter_mut().zip(&mut self.stats) {
            let system: &mut dyn LawSystem = match stage {
                Stage::Law(system) => system.as_mut(),
                Stage::RigidBody => &mut self.physics,
            };
            let mut ctx = SystemContext {
                store: &mut *store,
                ledger: &mut self.ledger,
                spatial,
                environment: &mut self.environment,
                rng: &mut self.rng,
                sink: self.sink.as_ref(),
                tick,
                elapsed,
                policy: self.policy,
            };
            let outcome = match system.update(&mut ctx, delta) {
                Ok(()) => {
                    stats.runs = stats.runs.saturating_add(1);
                    SystemOutcome::Completed
                }
                Err(e) => {
                    let error = e.to_string();
                    error!(tick, system = stats.name, error = %error, "Law system failed");
                    stats.failures = stats.failures.saturating_add(1);
                    stats.last_error = Some(error.clone());
                    failures = failures.saturating_add(1);
                    self.sink.emit(LawEvent::SystemFailed {
                        tick,
                        system: stats.name.to_owned(),
                        error: error.clone(),
                    });
                    SystemOutcome::Failed { error }
                }
            };
            systems.push(SystemReport {
                system: stats.name,
                outcome,
            });
        }

        if let Err(e) = self.clock.advance(delta) {
            warn!(error = %e, "Clock did not advance");
        }
        debug!(tick, failures, entities = store.len(), "Tick completed");
        self.sink.emit(LawEvent::TickCompleted { tick, failures });
        Some(TickReport {
            tick,
            delta,
            systems,
            failures,
        })
    }

    /// Tear down the physics bridge, drop cached system state, clear body
    /// handles in `store` and return to `Uninitialized`.
    pub fn destroy(&mut self, store: &mut EntityStore) {
        self.physics.shutdown(store);
        for stage in &mut self.stages {
            if let Stage::Law(system) = stage {
                system.reset();
            }
        }
        self.state = OrchestratorState::Uninitialized;
        info!(ticks = self.clock.tick(), "Law orchestrator destroyed");
    }

    /// Lifecycle state.
    pub const fn state(&self) -> OrchestratorState {
        self.state
    }

    /// The ledger.
    pub const fn ledger(&self) -> &ConservationLedger {
        &self.ledger
    }

    /// Mutable access to the ledger, for registering entities added or
    /// removed outside a tick.
    pub const fn ledger_mut(&mut self) -> &mut ConservationLedger {
        &mut self.ledger
    }

    /// The shared environment.
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The clock.
    pub const fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Rigid-body bridge state.
    pub fn physics_status(&self) -> PhysicsStatus {
        self.physics.status()
    }

    /// Where events go.
    pub const fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Diagnostics snapshot.
    pub fn statistics(&self) -> OrchestratorStatistics {
        OrchestratorStatistics {
            state: self.state,
            ticks: self.clock.tick(),
            elapsed: self.clock.elapsed(),
            system_count: self.stages.len(),
            systems: self.stats.clone(),
            physics: self.physics.status(),
            environment: self.environment,
            ledger: self.ledger.statistics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ebb_events::MemorySink;
    use ebb_laws::{IntegratorLoader, LawError, UnavailableLoader};

    use super::*;

    struct Counter(u32);

    impl LawSystem for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn update(&mut self, _ctx: &mut SystemContext<'_>, _delta: f64) -> Result<(), LawError> {
            self.0 = self.0.saturating_add(1);
            Ok(())
        }

        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    struct Broken;

    impl LawSystem for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn update(&mut self, _ctx: &mut SystemContext<'_>, _delta: f64) -> Result<(), LawError> {
            Err(LawError::InvalidState {
                system: "broken",
                reason: "always".to_owned(),
            })
        }
    }

    fn sink() -> Arc<MemorySink> {
        Arc::new(MemorySink::new())
    }

    #[test]
    fn standard_roster_order() {
        let orchestrator = LawOrchestrator::standard(&LawConfig::default(), sink());
        let names: Vec<&str> = orchestrator.statistics().systems.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "cosmic_forcing",
                "thermodynamics",
                "reaction_kinetics",
                "diffusion",
                "aggregation",
                "conservation_validation",
                "rigid_body_physics",
                "metabolism",
                "evolutionary_selection",
                "population_dynamics",
                "cultural_transmission",
            ]
        );
    }

    #[test]
    fn tick_before_initialize_is_skipped() {
        let events = sink();
        let mut orchestrator = LawOrchestrator::custom(&LawConfig::default(), events.clone(), vec![Box::new(Counter(0))]);
        let mut store = EntityStore::new();
        let report = orchestrator.tick(&mut store, &SpatialIndex::default(), 1.0);
        assert!(report.is_none());
        assert_eq!(events.count_kind("tick_skipped"), 1);
        assert_eq!(orchestrator.clock().tick(), 0);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let events = sink();
        let mut orchestrator = LawOrchestrator::custom(
            &LawConfig::default(),
            events.clone(),
            vec![Box::new(Counter(0)), Box::new(Broken), Box::new(Counter(0))],
        );
        orchestrator.initialize(&IntegratorLoader).await;
        let mut store = EntityStore::new();
        let spatial = SpatialIndex::default();

        for _ in 0..3 {
            let report = orchestrator.tick(&mut store, &spatial, 0.1);
            assert!(report.as_ref().is_some_and(|r| r.failures == 1));
            assert!(report.is_some_and(|r| matches!(r.outcome("broken"), Some(SystemOutcome::Failed { .. }))));
        }

        let stats = orchestrator.statistics();
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.systems.iter().map(|s| s.runs).collect::<Vec<_>>(), [3, 0, 3]);
        assert_eq!(stats.systems.iter().map(|s| s.failures).collect::<Vec<_>>(), [0, 3, 0]);
        assert_eq!(events.count_kind("system_failed"), 3);
        assert_eq!(events.count_kind("tick_completed"), 3);
    }

    #[tokio::test]
    async fn custom_roster_does_not_load_physics() {
        let mut orchestrator = LawOrchestrator::custom(&LawConfig::default(), sink(), vec![Box::new(Counter(0))]);
        let status = orchestrator.initialize(&UnavailableLoader::new("unused")).await;
        assert_eq!(status, PhysicsStatus::Unloaded);
        assert_eq!(orchestrator.state(), OrchestratorState::Running);
    }

    #[tokio::test]
    async fn destroy_returns_to_uninitialized() {
        let events = sink();
        let mut orchestrator = LawOrchestrator::standard(&LawConfig::default(), events.clone());
        let status = orchestrator.initialize(&IntegratorLoader).await;
        assert!(matches!(status, PhysicsStatus::Ready { .. }));

        let mut store = EntityStore::new();
        orchestrator.destroy(&mut store);
        assert_eq!(orchestrator.state(), OrchestratorState::Uninitialized);
        assert_eq!(orchestrator.physics_status(), PhysicsStatus::Unloaded);
        assert!(orchestrator.tick(&mut store, &SpatialIndex::default(), 0.1).is_none());

        orchestrator.initialize(&IntegratorLoader).await;
        assert!(orchestrator.tick(&mut store, &SpatialIndex::default(), 0.1).is_some());
        assert_eq!(events.count_kind("physics_ready"), 2);
    }

    #[tokio::test]
    async fn invalid_delta_is_refused() {
        let mut orchestrator = LawOrchestrator::custom(&LawConfig::default(), sink(), vec![Box::new(Counter(0))]);
        orchestrator.initialize(&IntegratorLoader).await;
        let mut store = EntityStore::new();
        assert!(orchestrator.tick(&mut store, &SpatialIndex::default(), f64::NAN).is_none());
        assert!(orchestrator.tick(&mut store, &SpatialIndex::default(), -0.1).is_none());
        assert_eq!(orchestrator.clock().tick(), 0);
    }
}
