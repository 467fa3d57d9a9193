//! Built-in rigid-body backend: semi-implicit Euler over spheres.
//!
//! Each step is split into substeps no longer than `max_substep`. A substep
//! applies gravity, moves every body, pushes bodies out of the ground plane
//! (reflecting the normal velocity scaled by restitution) and resolves
//! overlapping pairs with an equal and opposite impulse, so contacts never
//! create or destroy momentum.

use std::collections::BTreeMap;

use ebb_types::BodyHandle;
use glam::DVec3;
use tracing::warn;

use crate::config::PhysicsConfig;
use crate::error::BackendError;
use crate::physics::backend::{BodyDesc, BodyState, PhysicsBackend};

#[derive(Debug, Clone, Copy)]
struct Sphere {
    position: DVec3,
    velocity: DVec3,
    inverse_mass: f64,
    radius: f64,
}

/// Semi-implicit Euler integrator with ground and sphere contacts.
#[derive(Debug, Clone)]
pub struct IntegratorBackend {
    gravity: DVec3,
    ground_height: Option<f64>,
    restitution: f64,
    max_substep: f64,
    bodies: BTreeMap<BodyHandle, Sphere>,
    next_handle: u64,
}

impl IntegratorBackend {
    /// An empty world with the configured gravity and ground.
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            gravity: config.gravity,
            ground_height: config.ground_height,
            restitution: config.restitution.clamp(0.0, 1.0),
            max_substep: config.max_substep,
            bodies: BTreeMap::new(),
            next_handle: 1,
        }
    }

    fn substep(&mut self, h: f64) {
        for body in self.bodies.values_mut() {
            body.velocity += self.gravity * h;
            body.position += body.velocity * h;
            if let Some(ground) = self.ground_height {
                let floor = ground + body.radius;
                if body.position.y < floor {
                    body.position.y = floor;
                    if body.velocity.y < 0.0 {
                        body.velocity.y = -body.velocity.y * self.restitution;
                    }
                }
            }
        }

        let handles: Vec<BodyHandle> = self.bodies.keys().copied().collect();
        let mut rest = handles.as_slice();
        while let Some((a, tail)) = rest.split_first() {
            for b in tail {
                self.resolve_contact(*a, *b);
            }
            rest = tail;
        }
    }

    fn resolve_contact(&mut self, a: BodyHandle, b: BodyHandle) {
        let (Some(mut first), Some(mut second)) = (self.bodies.get(&a).copied(), self.bodies.get(&b).copied()) else {
            return;
        };
        let offset = second.position - first.position;
        let distance = offset.length();
        let overlap = first.radius + second.radius - distance;
        let total_inverse = first.inverse_mass + second.inverse_mass;
        if overlap <= 0.0 || distance <= f64::EPSILON || total_inverse <= 0.0 {
            return;
        }
        let normal = offset / distance;

        first.position -= normal * (overlap * first.inverse_mass / total_inverse);
        second.position += normal * (overlap * second.inverse_mass / total_inverse);

        let closing = (second.velocity - first.velocity).dot(normal);
        if closing < 0.0 {
            let impulse = -(1.0 + self.restitution) * closing / total_inverse;
            first.velocity -= normal * (impulse * first.inverse_mass);
            second.velocity += normal * (impulse * second.inverse_mass);
        }

        self.bodies.insert(a, first);
        self.bodies.insert(b, second);
    }
}

impl PhysicsBackend for IntegratorBackend {
    fn name(&self) -> &str {
        "semi_implicit_euler"
    }

    fn create_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        let inverse_mass = if desc.mass > 0.0 { 1.0 / desc.mass } else { 0.0 };
        self.bodies.insert(
            handle,
            Sphere {
                position: desc.position,
                velocity: desc.velocity,
                inverse_mass,
                radius: desc.radius.max(0.0),
            },
        );
        handle
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies.remove(&handle).is_some()
    }

    fn set_body_state(&mut self, handle: BodyHandle, state: BodyState) -> bool {
        self.bodies.get_mut(&handle).is_some_and(|body| {
            body.position = state.position;
            body.velocity = state.velocity;
            true
        })
    }

    fn body_state(&self, handle: BodyHandle) -> Option<BodyState> {
        self.bodies.get(&handle).map(|body| BodyState {
            position: body.position,
            velocity: body.velocity,
        })
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn step(&mut self, dt: f64) -> Result<(), BackendError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(BackendError::InvalidStep(dt));
        }
        let max_substep = if self.max_substep > 0.0 { self.max_substep } else { dt };
        let mut remaining = dt;
        while remaining > 0.0 {
            let h = remaining.min(max_substep);
            self.substep(h);
            remaining -= h;
        }

        if self
            .bodies
            .values()
            .any(|b| !b.position.is_finite() || !b.velocity.is_finite())
        {
            warn!(dt, "Rigid-body state diverged");
            return Err(BackendError::Diverged { dt });
        }
        Ok(())
    }
}
