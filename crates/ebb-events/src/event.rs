//! The event vocabulary of the law engine.

use serde::Serialize;

use ebb_types::{AuditOperation, EntityId, Quantity, StateOfMatter};

/// How loudly an event should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine bookkeeping.
    Debug,
    /// Noteworthy state change.
    Info,
    /// Something degraded but the simulation continues.
    Warn,
    /// A law system or backend failed.
    Error,
}

/// Something that happened inside the law engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LawEvent {
    /// `tick` was called before `initialize`.
    TickSkipped {
        /// Why the tick did not run.
        reason: String,
    },

    /// A tick finished running every system.
    TickCompleted {
        /// Tick number that just ran.
        tick: u64,
        /// Number of systems that returned an error.
        failures: usize,
    },

    /// A law system returned an error. The tick continued.
    SystemFailed {
        /// Tick number.
        tick: u64,
        /// Name of the failing system.
        system: String,
        /// Rendered error.
        error: String,
    },

    /// The ledger detected drift beyond tolerance.
    ConservationViolation {
        /// Which quantity drifted.
        quantity: Quantity,
        /// Expected value (input side).
        expected: f64,
        /// Actual value (output side).
        actual: f64,
        /// Absolute drift for mass/charge/momentum, relative for energy.
        drift: f64,
        /// Caller-provided context.
        context: String,
    },

    /// A proposed transformation was refused under the `reject` policy.
    TransformationRejected {
        /// The transformation kind.
        operation: AuditOperation,
        /// Caller-provided context.
        context: String,
    },

    /// The physics backend finished loading.
    PhysicsReady {
        /// Backend name.
        backend: String,
    },

    /// The physics backend failed to load; the bridge is disabled.
    PhysicsDisabled {
        /// Rendered load error.
        reason: String,
    },

    /// A population count reached zero.
    Extinction {
        /// The population entity.
        entity: EntityId,
        /// Tick of the transition.
        tick: u64,
    },

    /// The ODE solver failed; counts were left unchanged.
    SolverFailed {
        /// Rendered solver error.
        error: String,
    },

    /// An organism's energy stores ran out.
    Starvation {
        /// The starving organism.
        entity: EntityId,
    },

    /// An organism was removed by selection.
    OrganismDied {
        /// The removed organism.
        entity: EntityId,
    },

    /// An organism split into parent and offspring.
    OrganismReproduced {
        /// The parent.
        parent: EntityId,
        /// The new offspring.
        offspring: EntityId,
    },

    /// A reaction replaced its reactants with a product.
    ReactionCommitted {
        /// Consumed reactants.
        reactants: Vec<EntityId>,
        /// The product.
        product: EntityId,
        /// Whether the ledger accepted the totals.
        balanced: bool,
    },

    /// Children were merged into an aggregate.
    AggregateFormed {
        /// The new aggregate.
        aggregate: EntityId,
        /// Merged children.
        children: Vec<EntityId>,
        /// Whether the ledger accepted the totals.
        balanced: bool,
    },

    /// An aggregate was split into fragments.
    AggregateDissolved {
        /// The dissolved aggregate.
        aggregate: EntityId,
        /// The new fragments.
        fragments: Vec<EntityId>,
        /// Whether the ledger accepted the totals.
        balanced: bool,
    },

    /// An entity changed phase.
    PhaseTransition {
        /// The entity.
        entity: EntityId,
        /// Previous phase, if one was set.
        from: Option<StateOfMatter>,
        /// New phase.
        to: StateOfMatter,
    },
}

impl LawEvent {
    /// The severity this event is reported at.
    pub const fn severity(&self) -> Severity {
        match self {
            Self::SystemFailed { .. } | Self::SolverFailed { .. } => Severity::Error,
            Self::TickSkipped { .. }
            | Self::ConservationViolation { .. }
            | Self::TransformationRejected { .. }
            | Self::PhysicsDisabled { .. } => Severity::Warn,
            Self::PhysicsReady { .. }
            | Self::Extinction { .. }
            | Self::Starvation { .. }
            | Self::AggregateFormed { .. }
            | Self::AggregateDissolved { .. } => Severity::Info,
            Self::TickCompleted { .. }
            | Self::OrganismDied { .. }
            | Self::OrganismReproduced { .. }
            | Self::ReactionCommitted { .. }
            | Self::PhaseTransition { .. } => Severity::Debug,
        }
    }

    /// Short machine-readable name, matching the serialized `kind` tag.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TickSkipped { .. } => "tick_skipped",
            Self::TickCompleted { .. } => "tick_completed",
            Self::SystemFailed { .. } => "system_failed",
            Self::ConservationViolation { .. } => "conservation_violation",
            Self::TransformationRejected { .. } => "transformation_rejected",
            Self::PhysicsReady { .. } => "physics_ready",
            Self::PhysicsDisabled { .. } => "physics_disabled",
            Self::Extinction { .. } => "extinction",
            Self::SolverFailed { .. } => "solver_failed",
            Self::Starvation { .. } => "starvation",
            Self::OrganismDied { .. } => "organism_died",
            Self::OrganismReproduced { .. } => "organism_reproduced",
            Self::ReactionCommitted { .. } => "reaction_committed",
            Self::AggregateFormed { .. } => "aggregate_formed",
            Self::AggregateDissolved { .. } => "aggregate_dissolved",
            Self::PhaseTransition { .. } => "phase_transition",
        }
    }
}
