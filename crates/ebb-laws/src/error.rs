//! Error types for the `ebb-laws` crate.
//!
//! A law system reports failure by returning [`LawError`] from
//! [`LawSystem::update`](crate::LawSystem::update). The orchestrator catches
//! it, records it against the system, and keeps ticking.

use ebb_store::StoreError;
use ebb_types::{EntityId, SchemaError};

/// Errors a law system can return from a tick.
#[derive(Debug, thiserror::Error)]
pub enum LawError {
    /// A system produced an entity that fails schema validation.
    #[error("invalid entity produced: {0}")]
    Schema(#[from] SchemaError),

    /// The store refused an insertion.
    #[error("store rejected entity: {0}")]
    Store(#[from] StoreError),

    /// The physics backend failed while stepping.
    #[error("physics backend failed: {0}")]
    Backend(#[from] BackendError),

    /// An entity the system expected is gone.
    #[error("entity {0} vanished during update")]
    MissingEntity(EntityId),

    /// The system hit a state it cannot make progress from.
    #[error("{system} cannot proceed: {reason}")]
    InvalidState {
        /// Name of the failing system.
        system: &'static str,
        /// What went wrong.
        reason: String,
    },
}

/// Errors from loading or stepping a physics backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be loaded.
    #[error("backend {backend} unavailable: {reason}")]
    Unavailable {
        /// Backend name.
        backend: String,
        /// Why loading failed.
        reason: String,
    },

    /// A body's state became NaN or infinite.
    #[error("body state diverged after step of {dt}s")]
    Diverged {
        /// Step that produced the divergence.
        dt: f64,
    },

    /// The step size is unusable.
    #[error("invalid step size: {0}")]
    InvalidStep(f64),
}

/// Errors from the adaptive ODE solver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    /// The derivative or state produced NaN or infinity.
    #[error("non-finite state at t = {t}")]
    NonFinite {
        /// Time at which the state went non-finite.
        t: f64,
    },

    /// The adaptive step shrank below the minimum.
    #[error("step size underflow at t = {t} (h = {step})")]
    StepUnderflow {
        /// Time at which the step collapsed.
        t: f64,
        /// The rejected step size.
        step: f64,
    },

    /// The step budget ran out before reaching the end time.
    #[error("step budget of {max_steps} exhausted at t = {t}")]
    StepBudgetExceeded {
        /// Configured budget.
        max_steps: u32,
        /// Time reached.
        t: f64,
    },

    /// The integration interval is malformed.
    #[error("invalid interval [{t0}, {t1}]")]
    InvalidInterval {
        /// Start time.
        t0: f64,
        /// End time.
        t1: f64,
    },
}
