//! Cosmic forcing: the star, the day cycle and the ambient temperature.
//!
//! # Ambient Temperature
//!
//! ```text
//! T_eq   = (L·(1−α) / (16·π·σ·d²))^(1/4)
//! T_amb  = max(T_cmb, T_eq·(1 + a·sin(2π·t/day)) + jitter)
//! ```
//!
//! The jitter is drawn from a stateless `xorshift64` hash of
//! `(seed, tick)`, so the same world seed replays the same weather without
//! consuming the shared RNG.
//!
//! # Relaxation
//!
//! Every entity with a temperature relaxes toward ambient by the fraction
//! `1 − exp(−k·Δt)`. The net heat moved is booked against the ledger's
//! environment subject.

use std::f64::consts::TAU;

use tracing::trace;

use crate::accounting::thermal_energy;
use crate::config::CosmicConfig;
use crate::context::SystemContext;
use crate::error::LawError;
use crate::kernels::{self, CMB_TEMPERATURE};
use crate::system::LawSystem;

/// Drives [`Environment`](crate::Environment) from the configured star.
#[derive(Debug, Clone)]
pub struct CosmicForcing {
    config: CosmicConfig,
    seed: u64,
}

impl CosmicForcing {
    /// Forcing for a world seeded with `seed`.
    pub const fn new(config: CosmicConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    /// Ambient temperature at simulated `time` during `tick`.
    pub fn ambient_at(&self, time: f64, tick: u64) -> f64 {
        let base = kernels::equilibrium_temperature(
            self.config.stellar_luminosity,
            self.config.albedo,
            self.config.orbital_radius,
        );
        let diurnal = 1.0 + self.config.diurnal_amplitude * self.day_phase(time).sin();
        let jitter = unit_interval(deterministic_random(self.seed, tick)).mul_add(2.0, -1.0)
            * self.config.jitter;
        base.mul_add(diurnal, jitter).max(CMB_TEMPERATURE)
    }

    /// Absorbed stellar flux at simulated `time`; zero at night.
    pub fn insolation_at(&self, time: f64) -> f64 {
        let flux = kernels::stellar_flux(self.config.stellar_luminosity, self.config.orbital_radius);
        flux * (1.0 - self.config.albedo) * self.day_phase(time).sin().max(0.0)
    }

    fn day_phase(&self, time: f64) -> f64 {
        if self.config.day_length > 0.0 {
            TAU * time / self.config.day_length
        } else {
            0.0
        }
    }
}

impl LawSystem for CosmicForcing {
    fn name(&self) -> &'static str {
        "cosmic_forcing"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        let time = ctx.elapsed + delta;
        let ambient = self.ambient_at(time, ctx.tick);
        ctx.environment.cosmic_time = time;
        ctx.environment.ambient_temperature = ambient;
        ctx.environment.insolation = self.insolation_at(time);

        let fraction = 1.0 - (-self.config.coupling_rate * delta).exp();
        let mut exchanged = 0.0;
        for entity in ctx.store.iter_mut() {
            let Some(t) = entity.temperature() else {
                continue;
            };
            let tracked = entity.is_tracked();
            let before = thermal_energy(entity);
            if let Some(p) = entity.physical.as_mut() {
                p.temperature = Some((ambient - t).mul_add(fraction, t).max(CMB_TEMPERATURE));
            }
            if tracked {
                exchanged += thermal_energy(entity) - before;
            }
        }
        ctx.book_environment_exchange(exchanged);

        trace!(tick = ctx.tick, ambient, exchanged, "Cosmic forcing applied");
        Ok(())
    }
}

/// Stateless `xorshift64` hash of `(seed, tick)`.
const fn deterministic_random(seed: u64, tick: u64) -> u64 {
    let mut state = seed.wrapping_add(tick.wrapping_mul(0x517c_c1b7_2722_0a95));
    if state == 0 {
        state = 0xdead_beef_cafe_babe;
    }
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    state
}

/// Map a random word onto `[0, 1]`.
fn unit_interval(random: u64) -> f64 {
    let high = u32::try_from(random >> 32).unwrap_or(u32::MAX);
    f64::from(high) / f64::from(u32::MAX)
}
