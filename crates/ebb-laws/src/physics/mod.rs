//! Rigid-body physics bridge.
//!
//! Connects structural and organismal entities to a [`PhysicsBackend`].
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded ──initialize──▶ Loading ──ok──▶ Ready ──shutdown──▶ Unloaded
//!                              └────err──▶ Disabled (permanent)
//! ```
//!
//! `Loading` only exists inside [`RigidBodyBridge::initialize`], which takes
//! `&mut self`, so no tick can observe it. Updates are no-ops unless the
//! bridge is `Ready`.
//!
//! # Per-tick order
//!
//! 1. Drop bodies whose entity left the store or lost eligibility.
//! 2. Push collaborator edits (moved, re-massed) into the backend.
//! 3. Create bodies for newly eligible entities.
//! 4. Step the backend by `delta`.
//! 5. Copy positions and velocities back into the store.
//! 6. Book momentum changes above `momentum_threshold`, with the matching
//!    kinetic-energy change, under the entity's `Impulse` ledger subject.

pub mod backend;
pub mod integrator;

use std::collections::BTreeMap;

use ebb_events::{EventSink, LawEvent};
use ebb_ledger::{ConservationLedger, LedgerSubject};
use ebb_store::EntityStore;
use ebb_types::{BodyHandle, ConservedQuantities, Entity, EntityId};
use glam::DVec3;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use self::backend::{BackendLoader, BodyDesc, BodyState, IntegratorLoader, PhysicsBackend, UnavailableLoader};
pub use self::integrator::IntegratorBackend;

use crate::config::PhysicsConfig;
use crate::context::SystemContext;
use crate::error::LawError;
use crate::kernels;
use crate::system::LawSystem;

/// Externally visible bridge state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhysicsStatus {
    /// No backend loaded yet.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// Stepping bodies.
    Ready {
        /// Backend name.
        backend: String,
        /// Live bodies.
        bodies: usize,
    },
    /// Loading failed or physics was switched off.
    Disabled {
        /// Why.
        reason: String,
    },
}

enum Lifecycle {
    Unloaded,
    Loading,
    Ready(Box<dyn PhysicsBackend>),
    Disabled(String),
}

#[derive(Debug, Clone, Copy)]
struct TrackedBody {
    handle: BodyHandle,
    mass: f64,
    state: BodyState,
    momentum: DVec3,
    kinetic_energy: f64,
}

impl TrackedBody {
    /// Motion the backend produced since the last booking.
    fn unbooked(&self) -> ConservedQuantities {
        let momentum = kernels::momentum(self.mass, self.state.velocity);
        let kinetic_energy = kernels::kinetic_energy(self.mass, self.state.velocity);
        ConservedQuantities::new(0.0, kinetic_energy - self.kinetic_energy)
            .with_momentum(momentum - self.momentum)
    }

    fn mark_booked(&mut self) {
        self.momentum = kernels::momentum(self.mass, self.state.velocity);
        self.kinetic_energy = kernels::kinetic_energy(self.mass, self.state.velocity);
    }

    /// Take the entity's current motion as the new booking baseline.
    /// Backend motion below the threshold is booked first so it is not lost.
    fn rebase(&mut self, id: EntityId, entity: &Entity, ledger: &mut ConservationLedger) {
        let residual = self.unbooked();
        if residual.momentum.length_squared() > 0.0 {
            ledger.add_entity(LedgerSubject::Impulse(id), residual);
        }
        self.momentum = entity.momentum();
        self.kinetic_energy = entity.kinetic_energy();
    }
}

fn eligible(entity: &Entity) -> bool {
    entity.scale.has_rigid_body() && entity.is_tracked()
}

fn moved(a: DVec3, b: DVec3) -> bool {
    a.distance_squared(b) > f64::EPSILON * f64::EPSILON
}

fn set_body_handle(store: &mut EntityStore, id: EntityId, handle: Option<BodyHandle>) {
    if let Some(physical) = store.get_mut(id).and_then(|e| e.physical.as_mut()) {
        physical.body = handle;
    }
}

/// Keeps rigid bodies and store entities in step.
pub struct RigidBodyBridge {
    config: PhysicsConfig,
    lifecycle: Lifecycle,
    bodies: BTreeMap<EntityId, TrackedBody>,
}

impl RigidBodyBridge {
    /// An unloaded bridge.
    pub const fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::Unloaded,
            bodies: BTreeMap::new(),
        }
    }

    /// Load the backend. Idempotent once `Ready` or `Disabled`; a disabled
    /// bridge is never retried.
    pub async fn initialize(&mut self, loader: &dyn BackendLoader, sink: &dyn EventSink) -> PhysicsStatus {
        if matches!(self.lifecycle, Lifecycle::Ready(_) | Lifecycle::Disabled(_)) {
            return self.status();
        }
        if !self.config.enabled {
            let reason = "disabled by configuration".to_owned();
            info!(%reason, "Rigid-body physics off");
            sink.emit(LawEvent::PhysicsDisabled { reason: reason.clone() });
            self.lifecycle = Lifecycle::Disabled(reason);
            return self.status();
        }

        self.lifecycle = Lifecycle::Loading;
        match loader.load(&self.config).await {
            Ok(backend) => {
                info!(backend = backend.name(), "Physics backend ready");
                sink.emit(LawEvent::PhysicsReady {
                    backend: backend.name().to_owned(),
                });
                self.lifecycle = Lifecycle::Ready(backend);
            }
            Err(e) => {
                warn!(error = %e, "Physics backend failed to load; rigid-body physics disabled");
                let reason = e.to_string();
                sink.emit(LawEvent::PhysicsDisabled { reason: reason.clone() });
                self.lifecycle = Lifecycle::Disabled(reason);
            }
        }
        self.status()
    }

    /// Release every body and return to `Unloaded`. Clears body handles in
    /// `store`. A disabled bridge stays disabled.
    pub fn shutdown(&mut self, store: &mut EntityStore) {
        for (id, tracked) in std::mem::take(&mut self.bodies) {
            if let Lifecycle::Ready(backend) = &mut self.lifecycle {
                backend.remove_body(tracked.handle);
            }
            set_body_handle(store, id, None);
        }
        if !matches!(self.lifecycle, Lifecycle::Disabled(_)) {
            self.lifecycle = Lifecycle::Unloaded;
        }
        debug!("Physics bridge shut down");
    }

    /// Current lifecycle state.
    pub fn status(&self) -> PhysicsStatus {
        match &self.lifecycle {
            Lifecycle::Unloaded => PhysicsStatus::Unloaded,
            Lifecycle::Loading => PhysicsStatus::Loading,
            Lifecycle::Ready(backend) => PhysicsStatus::Ready {
                backend: backend.name().to_owned(),
                bodies: backend.body_count(),
            },
            Lifecycle::Disabled(reason) => PhysicsStatus::Disabled {
                reason: reason.clone(),
            },
        }
    }

    /// The body bound to `id`, if any.
    pub fn body_of(&self, id: EntityId) -> Option<BodyHandle> {
        self.bodies.get(&id).map(|t| t.handle)
    }
}

impl LawSystem for RigidBodyBridge {
    fn name(&self) -> &'static str {
        "rigid_body_physics"
    }

    #[allow(clippy::too_many_lines)]
    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        let density = self.config.density;
        let threshold = self.config.momentum_threshold;
        let Lifecycle::Ready(backend) = &mut self.lifecycle else {
            return Ok(());
        };

        // 1. Prune.
        let stale: Vec<EntityId> = self
            .bodies
            .keys()
            .filter(|id| !ctx.store.get(**id).is_some_and(eligible))
            .copied()
            .collect();
        for id in stale {
            if let Some(tracked) = self.bodies.remove(&id) {
                backend.remove_body(tracked.handle);
                set_body_handle(ctx.store, id, None);
                debug!(entity = %id, "Rigid body released");
            }
        }

        // 2-3. Sync and create.
        for id in ctx.store.ids_where(eligible) {
            let Some(entity) = ctx.store.get(id) else {
                continue;
            };
            let (Some(mass), Some(position)) = (entity.mass(), entity.position()) else {
                continue;
            };
            let state = BodyState {
                position,
                velocity: entity.velocity(),
            };
            let desc = BodyDesc {
                position,
                velocity: state.velocity,
                mass,
                radius: kernels::sphere_radius(mass, density),
            };

            match self.bodies.get_mut(&id) {
                Some(tracked) if (tracked.mass - mass).abs() > f64::EPSILON * tracked.mass.max(1.0) => {
                    backend.remove_body(tracked.handle);
                    tracked.rebase(id, entity, ctx.ledger);
                    tracked.handle = backend.create_body(desc);
                    tracked.mass = mass;
                    tracked.state = state;
                    let handle = tracked.handle;
                    set_body_handle(ctx.store, id, Some(handle));
                }
                Some(tracked) => {
                    if moved(tracked.state.position, state.position) || moved(tracked.state.velocity, state.velocity) {
                        backend.set_body_state(tracked.handle, state);
                        tracked.rebase(id, entity, ctx.ledger);
                        tracked.state = state;
                    }
                }
                None => {
                    let handle = backend.create_body(desc);
                    let mut tracked = TrackedBody {
                        handle,
                        mass,
                        state,
                        momentum: DVec3::ZERO,
                        kinetic_energy: 0.0,
                    };
                    tracked.mark_booked();
                    self.bodies.insert(id, tracked);
                    set_body_handle(ctx.store, id, Some(handle));
                    debug!(entity = %id, body = %handle, mass, "Rigid body created");
                }
            }
        }

        // 4. Step.
        backend.step(delta)?;

        // 5-6. Copy back and book impulses.
        for (id, tracked) in &mut self.bodies {
            let Some(state) = backend.body_state(tracked.handle) else {
                continue;
            };
            let Some(physical) = ctx.store.get_mut(*id).and_then(|e| e.physical.as_mut()) else {
                continue;
            };
            physical.position = Some(state.position);
            physical.velocity = Some(state.velocity);
            tracked.state = state;

            let impulse = tracked.unbooked();
            if impulse.momentum.length() > threshold {
                ctx.ledger.add_entity(LedgerSubject::Impulse(*id), impulse);
                tracked.mark_booked();
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        if let Lifecycle::Ready(backend) = &mut self.lifecycle {
            for tracked in self.bodies.values() {
                backend.remove_body(tracked.handle);
            }
        }
        self.bodies.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ebb_events::MemorySink;
    use ebb_types::{Physical, Scale};

    use super::*;
    use crate::accounting::{conserved_quantities, tracked_totals};
    use crate::context::testing::Harness;

    fn boulder(mass: f64, height: f64) -> Entity {
        Entity::new(Scale::Structural).with_physical(
            Physical::massive(mass, DVec3::new(0.0, height, 0.0)).with_temperature(300.0),
        )
    }

    async fn ready_bridge(sink: &dyn EventSink) -> RigidBodyBridge {
        let mut bridge = RigidBodyBridge::new(PhysicsConfig::default());
        let status = bridge.initialize(&IntegratorLoader, sink).await;
        assert!(matches!(status, PhysicsStatus::Ready { .. }));
        bridge
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let sink = MemorySink::new();
        let mut bridge = ready_bridge(&sink).await;
        let again = bridge.initialize(&IntegratorLoader, &sink).await;
        assert!(matches!(again, PhysicsStatus::Ready { bodies: 0, .. }));
        assert_eq!(sink.count_kind("physics_ready"), 1);
    }

    #[tokio::test]
    async fn load_failure_disables_for_good() {
        let sink = MemorySink::new();
        let mut bridge = RigidBodyBridge::new(PhysicsConfig::default());
        let status = bridge.initialize(&UnavailableLoader::new("no engine"), &sink).await;
        assert!(matches!(status, PhysicsStatus::Disabled { ref reason } if reason.contains("no engine")));

        let retry = bridge.initialize(&IntegratorLoader, &sink).await;
        assert!(matches!(retry, PhysicsStatus::Disabled { .. }));
        assert_eq!(sink.count_kind("physics_disabled"), 1);

        let mut h = Harness::new();
        let id = h.add(boulder(2.0, 10.0));
        assert!(h.run(&mut bridge, 0.5).is_ok());
        assert_eq!(h.store.get(id).and_then(Entity::position), Some(DVec3::new(0.0, 10.0, 0.0)));
    }

    #[tokio::test]
    async fn configuration_can_switch_physics_off() {
        let sink = MemorySink::new();
        let mut bridge = RigidBodyBridge::new(PhysicsConfig {
            enabled: false,
            ..PhysicsConfig::default()
        });
        let status = bridge.initialize(&IntegratorLoader, &sink).await;
        assert!(matches!(status, PhysicsStatus::Disabled { .. }));
    }

    #[tokio::test]
    async fn falling_bodies_are_booked_as_impulses() {
        let mut h = Harness::new();
        let mut bridge = ready_bridge(h.sink.as_ref()).await;
        let id = h.add(boulder(2.0, 10.0));

        for _ in 0..10 {
            assert!(h.run(&mut bridge, 1.0 / 30.0).is_ok());
        }
        let entity = h.store.get(id);
        assert!(entity.and_then(Entity::position).is_some_and(|p| p.y < 10.0));
        assert!(entity.and_then(|e| e.physical.as_ref()).and_then(|p| p.body).is_some());
        assert_eq!(bridge.body_of(id), entity.and_then(|e| e.physical.as_ref()).and_then(|p| p.body));

        let impulses = h
            .ledger
            .audit_trail()
            .iter()
            .filter(|e| e.subjects.contains(&LedgerSubject::Impulse(id)))
            .count();
        assert_eq!(impulses, 10);

        let derived = tracked_totals(h.store.iter());
        assert!(h.ledger.cross_check(derived, "after falling"));
        assert!((h.ledger.totals().momentum - derived.momentum).length() < 1e-9);
    }

    #[tokio::test]
    async fn edit_books_motion_below_the_threshold() {
        let mut h = Harness::new();
        let mut bridge = RigidBodyBridge::new(PhysicsConfig {
            momentum_threshold: 1.0e9,
            ..PhysicsConfig::default()
        });
        bridge.initialize(&IntegratorLoader, h.sink.as_ref()).await;
        let id = h.add(boulder(2.0, 10.0));
        for _ in 0..5 {
            assert!(h.run(&mut bridge, 0.1).is_ok());
        }
        let falling = h.store.get(id).unwrap().momentum();
        assert!(falling.y < 0.0);

        // A collaborator stops the body and re-books it, as World::modify does.
        let before = conserved_quantities(h.store.get(id).unwrap());
        h.store.get_mut(id).unwrap().physical.as_mut().unwrap().velocity = Some(DVec3::ZERO);
        let after = conserved_quantities(h.store.get(id).unwrap());
        h.ledger.remove_entity(id, before);
        h.ledger.add_entity(id, after);

        assert!(h.run(&mut bridge, 0.0).is_ok());
        let derived = tracked_totals(h.store.iter());
        assert!((h.ledger.totals().momentum - derived.momentum).length() < 1e-9);
        assert!((h.ledger.totals().energy - derived.energy).abs() < 1e-9);
        assert!(h.ledger.audit_trail().iter().any(|e| e.subjects == [LedgerSubject::Impulse(id)]));
    }

    #[tokio::test]
    async fn bodies_follow_store_membership() {
        let mut h = Harness::new();
        let mut bridge = ready_bridge(h.sink.as_ref()).await;
        let rock = h.add(boulder(2.0, 10.0));
        let dust = h.add(
            Entity::new(Scale::Molecular).with_physical(Physical::massive(1.0, DVec3::ZERO)),
        );
        assert!(h.run(&mut bridge, 0.1).is_ok());
        assert!(matches!(bridge.status(), PhysicsStatus::Ready { bodies: 1, .. }));
        assert!(bridge.body_of(dust).is_none());

        assert!(h.store.remove(rock).is_some());
        assert!(h.run(&mut bridge, 0.1).is_ok());
        assert!(matches!(bridge.status(), PhysicsStatus::Ready { bodies: 0, .. }));
    }

    #[tokio::test]
    async fn shutdown_clears_handles() {
        let mut h = Harness::new();
        let mut bridge = ready_bridge(h.sink.as_ref()).await;
        let id = h.add(boulder(2.0, 10.0));
        assert!(h.run(&mut bridge, 0.1).is_ok());
        bridge.shutdown(&mut h.store);
        assert_eq!(bridge.status(), PhysicsStatus::Unloaded);
        assert!(h.store.get(id).and_then(|e| e.physical.as_ref()).is_some_and(|p| p.body.is_none()));
    }
}
