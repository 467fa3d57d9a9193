//! Demo world seeding.
//!
//! Populates a fresh [`World`] with one of everything the law roster acts
//! on: a pool of water and a cloud of reactive atoms for kinetics,
//! diffusion and aggregation; rocks for the rigid-body bridge; organisms
//! with genomes, metabolism and memes; and a three-level food web.
//! Placement is drawn from a `SmallRng` seeded with the world seed.

use std::collections::BTreeMap;

use ebb_core::{World, WorldError};
use ebb_types::{
    Biological, Chemical, Cultural, DVec3, Ecological, Entity, Identity, LineageId, Metabolism,
    Physical, PopulationStats, Scale, StateOfMatter,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;

const WATER_MOLECULES: usize = 24;
const REACTIVE_ATOMS: usize = 16;
const ROCKS: usize = 6;
const ORGANISMS: usize = 8;
const GENOME_LENGTH: usize = 32;
const MEMES: [&str; 3] = ["fire", "tools", "song"];

/// How many entities of each kind were seeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Molecules and atoms.
    pub chemical: usize,
    /// Rigid bodies.
    pub structural: usize,
    /// Living organisms.
    pub organisms: usize,
    /// Population-scale entities.
    pub populations: usize,
}

impl SeedSummary {
    /// Total entities seeded.
    pub const fn total(&self) -> usize {
        self.chemical
            .saturating_add(self.structural)
            .saturating_add(self.organisms)
            .saturating_add(self.populations)
    }
}

/// Populate `world` with the demo scenario.
///
/// # Errors
///
/// Returns the first [`WorldError`] from [`World::add`].
pub fn seed_world(world: &mut World, seed: u64) -> Result<SeedSummary, WorldError> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut summary = SeedSummary::default();

    for _ in 0..WATER_MOLECULES {
        let position = scatter(&mut rng, DVec3::new(-20.0, 0.5, 0.0), 3.0);
        world.add(water(position))?;
        summary.chemical = summary.chemical.saturating_add(1);
    }

    for i in 0..REACTIVE_ATOMS {
        let symbol = if i % 3 == 0 { "O" } else { "H" };
        let position = scatter(&mut rng, DVec3::new(20.0, 2.0, 0.0), 2.0);
        world.add(atom(symbol, position))?;
        summary.chemical = summary.chemical.saturating_add(1);
    }

    for _ in 0..ROCKS {
        let mass = rng.random_range(50.0..500.0);
        let position = DVec3::new(rng.random_range(-40.0..40.0), rng.random_range(5.0..30.0), rng.random_range(-40.0..40.0));
        world.add(rock(mass, position))?;
        summary.structural = summary.structural.saturating_add(1);
    }

    for meme in MEMES.iter().cycle().take(ORGANISMS) {
        let position = scatter(&mut rng, DVec3::new(0.0, 0.5, 30.0), 4.0);
        let genome = random_genome(&mut rng);
        world.add(organism(position, genome, meme, rng.random_range(0.3..1.0)))?;
        summary.organisms = summary.organisms.saturating_add(1);
    }

    for (level, count) in [(1_u8, 500.0), (2, 80.0), (3, 12.0)] {
        world.add(population(level, count))?;
        summary.populations = summary.populations.saturating_add(1);
    }

    info!(
        chemical = summary.chemical,
        structural = summary.structural,
        organisms = summary.organisms,
        populations = summary.populations,
        "Demo world seeded"
    );
    Ok(summary)
}

fn scatter(rng: &mut SmallRng, center: DVec3, spread: f64) -> DVec3 {
    center
        + DVec3::new(
            rng.random_range(-spread..spread),
            rng.random_range(0.0..spread),
            rng.random_range(-spread..spread),
        )
}

fn random_genome(rng: &mut SmallRng) -> String {
    (0..GENOME_LENGTH)
        .map(|_| match rng.random_range(0..4_u8) {
            0 => 'A',
            1 => 'C',
            2 => 'G',
            _ => 'T',
        })
        .collect()
}

fn water(position: DVec3) -> Entity {
    let mut chemical = Chemical::from_elements([("H", 2), ("O", 1)]);
    chemical.bonds = vec!["H-O".to_owned(), "H-O".to_owned()];
    Entity::new(Scale::Molecular)
        .with_physical(
            Physical::massive(18.015, position)
                .with_temperature(300.0)
                .with_state(StateOfMatter::Liquid),
        )
        .with_chemical(chemical)
}

fn atom(symbol: &str, position: DVec3) -> Entity {
    let mass = if symbol == "O" { 15.999 } else { 1.008 };
    Entity::new(Scale::Atomic)
        .with_physical(
            Physical::massive(mass, position)
                .with_temperature(600.0)
                .with_state(StateOfMatter::Gas),
        )
        .with_chemical(Chemical::from_elements([(symbol, 1)]))
}

fn rock(mass: f64, position: DVec3) -> Entity {
    Entity::new(Scale::Structural).with_physical(
        Physical::massive(mass, position)
            .with_temperature(290.0)
            .with_state(StateOfMatter::Solid),
    )
}

fn organism(position: DVec3, genome: String, meme: &str, strength: f64) -> Entity {
    let memes = BTreeMap::from([(meme.to_owned(), strength)]);
    Entity::new(Scale::Organismal)
        .with_identity(Identity {
            parent_id: None,
            lineage_id: Some(LineageId::new()),
            generation: 0,
        })
        .with_physical(
            Physical::massive(10.0, position)
                .with_temperature(310.0)
                .with_state(StateOfMatter::Solid),
        )
        .with_biological(Biological {
            genome,
            phenotype: BTreeMap::new(),
            metabolism: Some(Metabolism {
                energy_production: 4.0,
                maintenance_cost: 1.0,
                pathways: vec!["photosynthesis".to_owned()],
            }),
            energy_stores: Some(100.0),
            waste_stores: Some(0.0),
        })
        .with_cultural(Cultural { memes })
}

fn population(trophic_level: u8, count: f64) -> Entity {
    Entity::new(Scale::Population).with_ecological(Ecological {
        niche: None,
        trophic_level,
        population: Some(PopulationStats {
            count,
            density: count / 100.0,
            growth_rate: 0.0,
        }),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ebb_core::LawConfig;
    use ebb_events::NullSink;
    use ebb_laws::accounting::tracked_totals;
    use ebb_ledger::conservation::check_balance;

    use super::*;

    #[test]
    fn seeds_every_kind_of_entity() {
        let mut world = World::new(&LawConfig::default(), Arc::new(NullSink));
        let summary = seed_world(&mut world, 7);
        assert!(summary.is_ok_and(|s| s.total() == world.len()));
        assert_eq!(world.entities().filter(|e| e.is_population()).count(), 3);
        assert_eq!(world.entities().filter(|e| e.is_biological()).count(), ORGANISMS);
        assert!(world.violations().is_empty());
    }

    #[test]
    fn genomes_use_the_dna_alphabet() {
        let mut rng = SmallRng::seed_from_u64(1);
        let genome = random_genome(&mut rng);
        assert_eq!(genome.len(), GENOME_LENGTH);
        assert!(genome.chars().all(|c| "ACGT".contains(c)));
    }

    #[tokio::test]
    async fn seeded_world_runs_without_drift() {
        let mut world = World::new(&LawConfig::default(), Arc::new(NullSink));
        assert!(seed_world(&mut world, 42).is_ok());
        world.initialize().await;
        for _ in 0..300 {
            let report = world.tick(0.1);
            assert!(report.is_some_and(|r| r.failures == 0));
        }
        assert_eq!(world.statistics().ticks, 300);
        assert!(world.violations().is_empty());

        let ledger = world.orchestrator().ledger();
        let derived = tracked_totals(world.entities());
        let drifts = check_balance(&ledger.totals(), &derived, &ledger.tolerance());
        assert!(drifts.is_empty(), "ledger drifted from store: {drifts:?}");
    }
}
