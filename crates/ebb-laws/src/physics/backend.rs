//! The seam between the bridge and a rigid-body engine.
//!
//! A [`BackendLoader`] produces a boxed [`PhysicsBackend`] asynchronously.
//! The bridge only ever talks to the trait, so an external engine can be
//! slotted in without touching any law system.

use ebb_types::BodyHandle;
use futures::FutureExt;
use futures::future::BoxFuture;
use glam::DVec3;

use crate::config::PhysicsConfig;
use crate::error::BackendError;
use crate::physics::integrator::IntegratorBackend;

/// Everything needed to create a sphere body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    /// Initial position.
    pub position: DVec3,
    /// Initial velocity.
    pub velocity: DVec3,
    /// Mass (kg), strictly positive.
    pub mass: f64,
    /// Collision radius.
    pub radius: f64,
}

/// Kinematic state read from or written to a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// Position.
    pub position: DVec3,
    /// Velocity.
    pub velocity: DVec3,
}

/// A rigid-body engine.
pub trait PhysicsBackend: Send {
    /// Backend name for logs and status.
    fn name(&self) -> &str;

    /// Create a body and return its handle.
    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle;

    /// Remove a body. False if the handle is unknown.
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    /// Teleport a body. False if the handle is unknown.
    fn set_body_state(&mut self, handle: BodyHandle, state: BodyState) -> bool;

    /// Current state of a body.
    fn body_state(&self, handle: BodyHandle) -> Option<BodyState>;

    /// Number of live bodies.
    fn body_count(&self) -> usize;

    /// Advance every body by `dt` seconds.
    ///
    /// # Errors
    ///
    /// [`BackendError::InvalidStep`] for a negative or non-finite `dt`,
    /// [`BackendError::Diverged`] if any body state stops being finite.
    fn step(&mut self, dt: f64) -> Result<(), BackendError>;
}

/// Asynchronously produces a backend.
pub trait BackendLoader: Send + Sync {
    /// Load a backend configured by `config`.
    fn load(&self, config: &PhysicsConfig) -> BoxFuture<'static, Result<Box<dyn PhysicsBackend>, BackendError>>;
}

/// Loads the built-in [`IntegratorBackend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegratorLoader;

impl BackendLoader for IntegratorLoader {
    fn load(&self, config: &PhysicsConfig) -> BoxFuture<'static, Result<Box<dyn PhysicsBackend>, BackendError>> {
        let backend = IntegratorBackend::new(config);
        async move { Ok(Box::new(backend) as Box<dyn PhysicsBackend>) }.boxed()
    }
}

/// A loader that always fails. Useful for running worlds without physics
/// and for exercising the disabled path.
#[derive(Debug, Clone)]
pub struct UnavailableLoader {
    reason: String,
}

impl UnavailableLoader {
    /// A loader failing with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl BackendLoader for UnavailableLoader {
    fn load(&self, _config: &PhysicsConfig) -> BoxFuture<'static, Result<Box<dyn PhysicsBackend>, BackendError>> {
        let error = BackendError::Unavailable {
            backend: "unavailable".to_owned(),
            reason: self.reason.clone(),
        };
        async move { Err(error) }.boxed()
    }
}
