//! Law systems for the Ebb Bloom law engine.
//!
//! Every physical, chemical, biological and social rule of the simulation is
//! a [`LawSystem`]: a named object advanced once per tick through a
//! [`SystemContext`] that gives it the store, the ledger, the spatial index,
//! the shared [`Environment`], the world's seeded RNG and the event sink.
//!
//! # Modules
//!
//! - [`system`] -- The [`LawSystem`] trait and the [`Interval`] trigger
//! - [`context`] -- [`SystemContext`] and [`Environment`]
//! - [`config`] -- Per-system configuration sections and [`ViolationPolicy`]
//! - [`error`] -- [`LawError`], [`BackendError`], [`SolverError`]
//! - [`kernels`] -- Stateless physical and biological formulas
//! - [`elements`] -- Element table, compound phases, bond energies
//! - [`accounting`] -- Per-entity conserved quantities
//! - [`ode`] -- Runge-Kutta integrators used by population dynamics
//! - [`cosmic`] -- Stellar forcing of the ambient temperature
//! - [`thermodynamics`] -- Conduction, radiation, phase transitions
//! - [`kinetics`] -- Stochastic pairwise reactions
//! - [`diffusion`] -- Brownian motion of fluids
//! - [`aggregation`] -- Merging molecules into aggregates and splitting them
//! - [`validation`] -- Periodic ledger cross-check
//! - [`physics`] -- Rigid-body bridge and the built-in backend
//! - [`metabolism`] -- Organism energy budgets
//! - [`evolution`] -- Starvation deaths and fission with mutation
//! - [`population`] -- Trophic population ODEs
//! - [`cultural`] -- Meme transmission
//!
//! # Standard order
//!
//! | # | System | Touches the ledger |
//! |---|--------|--------------------|
//! | 1 | [`CosmicForcing`] | environment heat |
//! | 2 | [`Thermodynamics`] | environment heat |
//! | 3 | [`ReactionKinetics`] | `validate_reaction` |
//! | 4 | [`Diffusion`] | no |
//! | 5 | [`AggregationSystem`] | `validate_aggregation`, `validate_disaggregation` |
//! | 6 | [`ConservationValidation`] | `cross_check` |
//! | 7 | [`RigidBodyBridge`] | impulses |
//! | 8 | [`Metabolism`] | no |
//! | 9 | [`EvolutionarySelection`] | re-weigh and spawn |
//! | 10 | [`PopulationDynamics`] | no |
//! | 11 | [`CulturalTransmission`] | no |

pub mod accounting;
pub mod aggregation;
pub mod config;
pub mod context;
pub mod cosmic;
pub mod cultural;
pub mod diffusion;
pub mod elements;
pub mod error;
pub mod evolution;
pub mod kernels;
pub mod kinetics;
pub mod metabolism;
pub mod ode;
pub mod physics;
pub mod population;
pub mod system;
pub mod thermodynamics;
pub mod validation;

pub use aggregation::AggregationSystem;
pub use config::{
    AggregationConfig, CosmicConfig, CulturalConfig, DiffusionConfig, EvolutionConfig,
    KineticsConfig, MetabolismConfig, PhysicsConfig, PopulationConfig, SolverKind,
    ThermodynamicsConfig, ValidationConfig, ViolationPolicy,
};
pub use context::{Environment, SystemContext};
pub use cosmic::CosmicForcing;
pub use cultural::CulturalTransmission;
pub use diffusion::Diffusion;
pub use error::{BackendError, LawError, SolverError};
pub use evolution::EvolutionarySelection;
pub use kinetics::ReactionKinetics;
pub use metabolism::Metabolism;
pub use physics::{
    BackendLoader, IntegratorLoader, PhysicsBackend, PhysicsStatus, RigidBodyBridge,
    UnavailableLoader,
};
pub use population::PopulationDynamics;
pub use system::{Interval, LawSystem};
pub use thermodynamics::Thermodynamics;
pub use validation::ConservationValidation;
