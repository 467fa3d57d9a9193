//! Ecological population dynamics.
//!
//! Population-scale entities carry a count that evolves under a
//! generalised Lotka-Volterra system:
//!
//! ```text
//! dNᵢ/dt = gᵢ(Nᵢ) + Nᵢ · Σⱼ Mᵢⱼ · Nⱼ
//! ```
//!
//! where `gᵢ` is logistic growth for producers (trophic level ≤ 1) and
//! linear mortality for consumers. The interaction matrix `M` is derived
//! from trophic levels and rebuilt whenever membership changes:
//!
//! | Relationship | `Mᵢⱼ` |
//! |--------------|-------|
//! | `j` one level above `i` (predator) | `−predation_rate` |
//! | `j` one level below `i` (prey) | `+predation_rate · conversion_efficiency` |
//! | same level, `i ≠ j` (competitor) | `−competition_rate` |
//! | two or more levels apart | `+cooperation_rate` |
//!
//! # Write-back
//!
//! Integrated values below 1 become exactly 0; everything else is rounded
//! to a whole individual. An [`Extinction`](ebb_events::LawEvent::Extinction)
//! event fires once on the transition to zero and re-arms if the count
//! recovers.
//!
//! # Failure
//!
//! A solver failure is logged and emitted as `SolverFailed`. Counts and the
//! integration clock stay where the last successful integration left them,
//! so the next tick retries the same interval plus the new delta.

use std::collections::BTreeSet;

use ebb_events::LawEvent;
use ebb_store::EntityStore;
use ebb_types::{EntityId, Scale};
use tracing::{debug, error, info};

use crate::config::{PopulationConfig, SolverKind};
use crate::context::SystemContext;
use crate::error::{LawError, SolverError};
use crate::kernels;
use crate::ode::{self, OdeOptions};
use crate::system::LawSystem;

/// Round an integrated value to a whole population.
pub fn settle_count(raw: f64) -> f64 {
    if raw >= 1.0 && raw.is_finite() {
        raw.round()
    } else {
        0.0
    }
}

/// Trophic population model integrated each tick.
#[derive(Debug, Clone)]
pub struct PopulationDynamics {
    config: PopulationConfig,
    members: Vec<EntityId>,
    growth: Vec<f64>,
    interactions: Vec<Vec<f64>>,
    last_time: f64,
    extinct: BTreeSet<EntityId>,
}

impl PopulationDynamics {
    /// A model with the given coefficients and no members yet.
    pub const fn new(config: PopulationConfig) -> Self {
        Self {
            config,
            members: Vec::new(),
            growth: Vec::new(),
            interactions: Vec::new(),
            last_time: 0.0,
            extinct: BTreeSet::new(),
        }
    }

    /// Simulated time up to which counts have been integrated.
    pub const fn last_time(&self) -> f64 {
        self.last_time
    }

    /// The current interaction coefficient of `j` on `i`.
    pub fn interaction(&self, i: EntityId, j: EntityId) -> Option<f64> {
        let row = self.members.iter().position(|m| *m == i)?;
        let col = self.members.iter().position(|m| *m == j)?;
        self.interactions.get(row)?.get(col).copied()
    }

    fn coefficient(&self, level_i: u8, level_j: u8) -> f64 {
        match i16::from(level_j) - i16::from(level_i) {
            1 => -self.config.predation_rate,
            -1 => self.config.predation_rate * self.config.conversion_efficiency,
            0 => -self.config.competition_rate,
            _ => self.config.cooperation_rate,
        }
    }

    fn rebuild(&mut self, store: &EntityStore, members: Vec<EntityId>) {
        let levels: Vec<u8> = members
            .iter()
            .map(|id| {
                store
                    .get(*id)
                    .and_then(|e| e.ecological.as_ref())
                    .map_or(1, |e| e.trophic_level)
            })
            .collect();

        self.growth = levels
            .iter()
            .map(|level| {
                if *level <= 1 {
                    self.config.producer_growth_rate
                } else {
                    -self.config.consumer_mortality
                }
            })
            .collect();
        self.interactions = levels
            .iter()
            .enumerate()
            .map(|(i, li)| {
                levels
                    .iter()
                    .enumerate()
                    .map(|(j, lj)| if i == j { 0.0 } else { self.coefficient(*li, *lj) })
                    .collect()
            })
            .collect();
        debug!(members = members.len(), "Population interaction matrix rebuilt");
        self.members = members;
    }

    fn derivative(&self, counts: &[f64]) -> Vec<f64> {
        counts
            .iter()
            .zip(&self.growth)
            .zip(&self.interactions)
            .map(|((n, r), row)| {
                let n = n.max(0.0);
                let own = if *r >= 0.0 {
                    kernels::logistic_growth(*r, n, self.config.carrying_capacity)
                } else {
                    r * n
                };
                let coupled: f64 = row.iter().zip(counts).map(|(m, nj)| m * nj.max(0.0)).sum();
                own + n * coupled
            })
            .collect()
    }

    fn integrate(&self, counts: &[f64], t0: f64, t1: f64) -> Result<Vec<f64>, SolverError> {
        let f = |_t: f64, y: &[f64]| -> Vec<f64> { self.derivative(y) };
        match self.config.solver {
            SolverKind::Rk45 => {
                let options = OdeOptions {
                    rtol: self.config.rtol,
                    atol: self.config.atol,
                    max_steps: self.config.max_steps,
                    ..OdeOptions::default()
                };
                ode::integrate_rk45(f, t0, t1, counts, &options)
            }
            SolverKind::Rk4 => ode::integrate_rk4(f, t0, t1, counts, self.config.rk4_steps),
        }
    }
}

impl LawSystem for PopulationDynamics {
    fn name(&self) -> &'static str {
        "population_dynamics"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        let members = ctx
            .store
            .ids_where(|e| e.scale == Scale::Population && e.is_population());
        let t0 = self.last_time;
        let t1 = t0 + delta;
        if members.is_empty() {
            self.last_time = t1;
            return Ok(());
        }
        if members != self.members {
            self.rebuild(ctx.store, members);
        }

        let counts: Vec<f64> = self
            .members
            .iter()
            .map(|id| {
                ctx.store
                    .get(*id)
                    .and_then(|e| e.ecological.as_ref())
                    .and_then(|e| e.population)
                    .map_or(0.0, |p| p.count)
            })
            .collect();

        let integrated = match self.integrate(&counts, t0, t1) {
            Ok(values) => values,
            Err(e) => {
                error!(tick = ctx.tick, error = %e, "Population solver failed; counts unchanged");
                ctx.emit(LawEvent::SolverFailed { error: e.to_string() });
                return Ok(());
            }
        };
        self.last_time = t1;

        for ((id, old), raw) in self.members.iter().zip(&counts).zip(integrated) {
            let count = settle_count(raw);
            let Some(stats) = ctx
                .store
                .get_mut(*id)
                .and_then(|e| e.ecological.as_mut())
                .and_then(|e| e.population.as_mut())
            else {
                continue;
            };
            if *old > 0.0 {
                stats.growth_rate = (count - old) / old;
                stats.density *= count / old;
            } else {
                stats.growth_rate = 0.0;
            }
            stats.count = count;

            if count <= 0.0 {
                if self.extinct.insert(*id) {
                    info!(entity = %id, tick = ctx.tick, "Population extinct");
                    ctx.sink.emit(LawEvent::Extinction {
                        entity: *id,
                        tick: ctx.tick,
                    });
                }
            } else {
                self.extinct.remove(id);
            }
        }
        self.extinct.retain(|id| self.members.contains(id));
        Ok(())
    }

    fn reset(&mut self) {
        self.members.clear();
        self.growth.clear();
        self.interactions.clear();
        self.extinct.clear();
        self.last_time = 0.0;
    }
}
