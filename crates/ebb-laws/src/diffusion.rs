//! Brownian motion of fluid entities.
//!
//! Liquids, gases and plasmas without a rigid body take a random step each
//! tick. The per-axis displacement is uniform with variance `2·D·Δt`, where
//! `D` is the (scaled) Stokes-Einstein coefficient for a sphere of the
//! entity's mass. Velocities are untouched, so diffusion moves no energy.

use ebb_types::Entity;
use glam::DVec3;
use rand::Rng;

use crate::config::DiffusionConfig;
use crate::context::SystemContext;
use crate::error::LawError;
use crate::kernels;
use crate::system::LawSystem;

/// Random-walk diffusion.
#[derive(Debug, Clone)]
pub struct Diffusion {
    config: DiffusionConfig,
}

impl Diffusion {
    /// A system with the given medium.
    pub const fn new(config: DiffusionConfig) -> Self {
        Self { config }
    }

    /// Diffusion coefficient for `entity`, zero if it does not diffuse.
    pub fn coefficient(&self, entity: &Entity) -> f64 {
        let Some(physical) = entity.physical.as_ref() else {
            return 0.0;
        };
        let fluid = physical.state.is_some_and(ebb_types::StateOfMatter::is_fluid);
        let (Some(mass), Some(t)) = (physical.mass, physical.temperature) else {
            return 0.0;
        };
        if !fluid || physical.body.is_some() || physical.position.is_none() {
            return 0.0;
        }
        let radius = kernels::sphere_radius(mass, self.config.density);
        kernels::stokes_einstein(t, self.config.viscosity, radius) * self.config.coefficient_scale
    }
}

impl LawSystem for Diffusion {
    fn name(&self) -> &'static str {
        "diffusion"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        if delta <= 0.0 {
            return Ok(());
        }
        for entity in ctx.store.iter_mut() {
            let d = self.coefficient(entity);
            if d <= 0.0 {
                continue;
            }
            // Uniform on [-a, a] has variance a²/3.
            let half_width = (6.0 * d * delta).sqrt();
            let step = DVec3::new(
                ctx.rng.random_range(-half_width..=half_width),
                ctx.rng.random_range(-half_width..=half_width),
                ctx.rng.random_range(-half_width..=half_width),
            );
            if let Some(p) = entity.physical.as_mut().and_then(|p| p.position.as_mut()) {
                *p += step;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use ebb_types::{BodyHandle, Physical, Scale, StateOfMatter};

    use super::*;
    use crate::context::testing::Harness;

    fn droplet(state: StateOfMatter) -> Entity {
        Entity::new(Scale::Molecular).with_physical(
            Physical::massive(1.0, DVec3::ZERO)
                .with_temperature(300.0)
                .with_state(state),
        )
    }

    #[test]
    fn only_free_fluids_diffuse() {
        let system = Diffusion::new(DiffusionConfig::default());
        assert!(system.coefficient(&droplet(StateOfMatter::Gas)) > 0.0);
        assert!(system.coefficient(&droplet(StateOfMatter::Liquid)) > 0.0);
        assert!(system.coefficient(&droplet(StateOfMatter::Solid)).abs() < f64::EPSILON);

        let mut bound = droplet(StateOfMatter::Gas);
        if let Some(p) = bound.physical.as_mut() {
            p.body = Some(BodyHandle(1));
        }
        assert!(system.coefficient(&bound).abs() < f64::EPSILON);
    }

    #[test]
    fn hotter_fluids_diffuse_faster() {
        let system = Diffusion::new(DiffusionConfig::default());
        let cold = system.coefficient(&droplet(StateOfMatter::Gas));
        let mut hot = droplet(StateOfMatter::Gas);
        if let Some(p) = hot.physical.as_mut() {
            p.temperature = Some(600.0);
        }
        assert!((system.coefficient(&hot) / cold - 2.0).abs() < 1e-9);
    }

    #[test]
    fn gas_moves_solid_stays_and_mass_is_untouched() {
        let mut h = Harness::new();
        let gas = h.add(droplet(StateOfMatter::Gas));
        let solid = h.add(droplet(StateOfMatter::Solid));
        let mut system = Diffusion::new(DiffusionConfig::default());
        for _ in 0..5 {
            assert!(h.run(&mut system, 1.0).is_ok());
        }
        let moved = h.store.get(gas).and_then(Entity::position).unwrap();
        let still = h.store.get(solid).and_then(Entity::position).unwrap_or(DVec3::ONE);
        assert!(moved.length() > 0.0);
        assert_eq!(still, DVec3::ZERO);
        assert!((h.ledger.totals().mass - 2.0).abs() < 1e-10);
    }
}
