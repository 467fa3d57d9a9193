//! Evolutionary selection: starvation deaths and reproduction by fission.
//!
//! Runs every `interval` seconds:
//!
//! 1. Organisms whose energy stores are at or below `starvation_threshold`
//!    are removed.
//! 2. Tracked organisms with stores at or above `reproduction_threshold`
//!    split in two, oldest id first, until the organism cap is reached.
//!
//! Fission halves mass and stores. The parent is re-weighed through the
//! ledger and the offspring spawned into it, so total mass and energy are
//! unchanged. The offspring inherits a point-mutated genome and a phenotype
//! recomputed from it.

use ebb_events::LawEvent;
use ebb_types::{Entity, EntityId, Identity, LineageId};
use glam::DVec3;
use rand::Rng;
use rand::rngs::SmallRng;
use tracing::{debug, info};

use crate::config::EvolutionConfig;
use crate::context::SystemContext;
use crate::error::LawError;
use crate::system::{Interval, LawSystem};

const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Copy `genome`, replacing each base with a different one with
/// probability `rate`.
pub fn mutate_genome(genome: &str, rate: f64, rng: &mut SmallRng) -> String {
    let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    genome
        .chars()
        .map(|base| {
            if !rng.random_bool(rate) {
                return base;
            }
            let others: Vec<char> = BASES.iter().copied().filter(|b| *b != base).collect();
            others.get(rng.random_range(0..others.len())).copied().unwrap_or(base)
        })
        .collect()
}

/// `(gc_content, genome_length)` expressed by a genome.
pub fn express(genome: &str) -> (f64, f64) {
    let (gc, length) = genome.chars().fold((0_u32, 0_u32), |(gc, n), base| {
        let gc = if matches!(base, 'G' | 'C') { gc.saturating_add(1) } else { gc };
        (gc, n.saturating_add(1))
    });
    if length == 0 {
        (0.0, 0.0)
    } else {
        (f64::from(gc) / f64::from(length), f64::from(length))
    }
}

fn energy_stores(entity: &Entity) -> Option<f64> {
    entity.biological.as_ref().and_then(|b| b.energy_stores)
}

/// Natural selection over organisms.
#[derive(Debug, Clone)]
pub struct EvolutionarySelection {
    config: EvolutionConfig,
    interval: Interval,
}

impl EvolutionarySelection {
    /// A selector running every `config.interval` seconds.
    pub const fn new(config: EvolutionConfig) -> Self {
        let interval = Interval::new(config.interval);
        Self { config, interval }
    }

    fn offspring_of(&self, parent: &Entity, lineage: LineageId, mass: f64, stores: f64, rng: &mut SmallRng) -> Entity {
        let mut child = parent.clone();
        child.id = EntityId::new();
        child.identity = Identity {
            parent_id: Some(parent.id),
            lineage_id: Some(lineage),
            generation: parent.identity.generation.saturating_add(1),
        };
        if let Some(physical) = child.physical.as_mut() {
            physical.mass = Some(mass);
            physical.body = None;
            physical.position = physical
                .position
                .map(|p| p + DVec3::X * self.config.offspring_spacing);
        }
        if let Some(biological) = child.biological.as_mut() {
            biological.genome = mutate_genome(&biological.genome, self.config.mutation_rate, rng);
            let (gc_content, length) = express(&biological.genome);
            biological.phenotype.insert("gc_content".to_owned(), gc_content);
            biological.phenotype.insert("genome_length".to_owned(), length);
            biological.energy_stores = Some(stores);
            biological.waste_stores = Some(0.0);
        }
        child
    }

    fn reproduce(&self, ctx: &mut SystemContext<'_>, parent_id: EntityId) -> Result<EntityId, LawError> {
        let parent = ctx
            .store
            .get(parent_id)
            .cloned()
            .ok_or(LawError::MissingEntity(parent_id))?;
        let (Some(mass), Some(stores)) = (parent.mass(), energy_stores(&parent)) else {
            return Err(LawError::InvalidState {
                system: "evolutionary_selection",
                reason: format!("organism {parent_id} cannot divide without mass and energy stores"),
            });
        };
        let half_mass = mass / 2.0;
        let half_stores = stores / 2.0;
        let lineage = parent.identity.lineage_id.unwrap_or_default();

        let child = self.offspring_of(&parent, lineage, half_mass, half_stores, ctx.rng);
        ctx.reweigh(parent_id, |e| {
            e.identity.lineage_id = Some(lineage);
            if let Some(physical) = e.physical.as_mut() {
                physical.mass = Some(half_mass);
            }
            if let Some(biological) = e.biological.as_mut() {
                biological.energy_stores = Some(half_stores);
            }
        })?;
        ctx.spawn(child)
    }
}

impl LawSystem for EvolutionarySelection {
    fn name(&self) -> &'static str {
        "evolutionary_selection"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        if !self.interval.advance(delta) {
            return Ok(());
        }

        let threshold = self.config.starvation_threshold;
        let starved = ctx
            .store
            .ids_where(|e| energy_stores(e).is_some_and(|s| s <= threshold));
        for entity in starved {
            if ctx.despawn(entity).is_some() {
                debug!(entity = %entity, tick = ctx.tick, "Organism died of starvation");
                ctx.emit(LawEvent::OrganismDied { entity });
            }
        }

        let mut organisms = ctx.store.ids_where(|e| e.is_biological()).len();
        let ready = self.config.reproduction_threshold;
        let parents = ctx
            .store
            .ids_where(|e| e.is_tracked() && energy_stores(e).is_some_and(|s| s >= ready));
        for parent in parents {
            if organisms >= self.config.max_organisms {
                debug!(cap = self.config.max_organisms, "Organism cap reached");
                break;
            }
            let offspring = self.reproduce(ctx, parent)?;
            organisms = organisms.saturating_add(1);
            info!(parent = %parent, offspring = %offspring, tick = ctx.tick, "Organism divided");
            ctx.emit(LawEvent::OrganismReproduced { parent, offspring });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.interval.reset();
    }
}
