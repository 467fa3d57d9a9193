//! End-to-end behaviour of the World and its orchestrator.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use ebb_core::{LawConfig, LawOrchestrator, SystemOutcome, World};
use ebb_events::MemorySink;
use ebb_laws::{IntegratorLoader, LawError, LawSystem, PhysicsStatus, SystemContext, UnavailableLoader};
use ebb_ledger::LedgerSubject;
use ebb_types::{
    AuditOperation, Cultural, DVec3, Ecological, Entity, EntityId, Physical, PopulationStats, Scale,
};

fn heated(mass: f64, temperature: f64) -> Entity {
    Entity::new(Scale::Material)
        .with_physical(Physical::massive(mass, DVec3::ZERO).with_temperature(temperature))
}

fn carrier() -> Entity {
    Entity::new(Scale::Organismal)
        .with_physical(Physical::at(DVec3::ZERO))
        .with_cultural(Cultural::default())
}

fn population(count: f64, trophic_level: u8) -> Entity {
    Entity::new(Scale::Population).with_ecological(Ecological {
        niche: None,
        trophic_level,
        population: Some(PopulationStats {
            count,
            density: count,
            growth_rate: 0.0,
        }),
    })
}

/// Stamps a marker meme on every cultural carrier.
struct Marker(&'static str);

impl LawSystem for Marker {
    fn name(&self) -> &'static str {
        self.0
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, _delta: f64) -> Result<(), LawError> {
        for entity in ctx.store.iter_mut() {
            if let Some(culture) = entity.cultural.as_mut() {
                let seen = culture.memes.entry(self.0.to_owned()).or_insert(0.0);
                *seen += 1.0;
            }
        }
        Ok(())
    }
}

struct AlwaysFails;

impl LawSystem for AlwaysFails {
    fn name(&self) -> &'static str {
        "always_fails"
    }

    fn update(&mut self, _ctx: &mut SystemContext<'_>, _delta: f64) -> Result<(), LawError> {
        Err(LawError::InvalidState {
            system: "always_fails",
            reason: "scripted failure".to_owned(),
        })
    }
}

#[test]
fn ledger_follows_adds_and_removes() {
    let mut world = World::new(&LawConfig::default(), Arc::new(MemorySink::new()));
    let a = world.add(heated(50.0, 10.0)).unwrap().id;
    let b = world.add(heated(30.0, 10.0)).unwrap().id;

    let totals = world.ledger_totals();
    assert!((totals.mass - 80.0).abs() < 1e-10);
    assert!((totals.energy - 800.0).abs() < 1e-10);

    let removed = world.remove(a).unwrap();
    assert_eq!(removed.id, a);
    let totals = world.ledger_totals();
    assert!((totals.mass - 30.0).abs() < 1e-10);
    assert!((totals.energy - 300.0).abs() < 1e-10);

    let trail = world.audit_trail();
    let ops: Vec<AuditOperation> = trail.iter().map(|e| e.operation).collect();
    assert_eq!(ops, [AuditOperation::Add, AuditOperation::Add, AuditOperation::Remove]);
    assert_eq!(trail[1].subjects, [LedgerSubject::Entity(b)]);
    assert_eq!(trail[2].subjects, [LedgerSubject::Entity(a)]);
    assert!(world.violations().is_empty());
}

#[tokio::test]
async fn failing_system_does_not_stop_the_others() {
    let config = LawConfig::default();
    let sink = Arc::new(MemorySink::new());
    let orchestrator = LawOrchestrator::custom(
        &config,
        sink.clone(),
        vec![Box::new(Marker("before")), Box::new(AlwaysFails), Box::new(Marker("after"))],
    );
    let mut world = World::from_orchestrator(&config, orchestrator, Arc::new(IntegratorLoader));
    let id = world.add(carrier()).unwrap().id;
    world.initialize().await;

    let ticks = 4;
    for _ in 0..ticks {
        let report = world.tick(0.1).unwrap();
        assert_eq!(report.failures, 1);
        assert_eq!(report.outcome("before"), Some(&SystemOutcome::Completed));
        assert!(matches!(report.outcome("always_fails"), Some(SystemOutcome::Failed { .. })));
        assert_eq!(report.outcome("after"), Some(&SystemOutcome::Completed));
    }

    let memes = &world.get(id).unwrap().cultural.as_ref().unwrap().memes;
    assert!((memes["before"] - 4.0).abs() < f64::EPSILON);
    assert!((memes["after"] - 4.0).abs() < f64::EPSILON);

    let stats = world.statistics().orchestrator;
    let failing = stats.systems.iter().find(|s| s.name == "always_fails").unwrap();
    assert_eq!(failing.failures, ticks);
    assert_eq!(failing.runs, 0);
    assert!(failing.last_error.as_deref().is_some_and(|e| e.contains("scripted failure")));
    assert_eq!(sink.count_kind("system_failed"), 4);
}

#[tokio::test]
async fn tick_before_initialize_is_skipped_and_reported() {
    let sink = Arc::new(MemorySink::new());
    let mut world = World::new(&LawConfig::default(), sink.clone());
    world.add(heated(1.0, 300.0)).unwrap();

    assert!(world.tick(0.1).is_none());
    assert_eq!(sink.count_kind("tick_skipped"), 1);
    assert_eq!(world.statistics().ticks, 0);

    world.initialize().await;
    assert!(world.tick(0.1).is_some());
    assert_eq!(world.statistics().ticks, 1);
}

#[tokio::test]
async fn unavailable_backend_disables_physics_but_not_the_world() {
    let sink = Arc::new(MemorySink::new());
    let mut world = World::with_loader(
        &LawConfig::default(),
        sink.clone(),
        Arc::new(UnavailableLoader::new("no backend in this build")),
    );
    let rock = Entity::new(Scale::Structural).with_physical(Physical::massive(10.0, DVec3::new(0.0, 5.0, 0.0)));
    let id = world.add(rock).unwrap().id;

    let status = world.initialize().await;
    assert!(matches!(status, PhysicsStatus::Disabled { .. }));
    assert_eq!(sink.count_kind("physics_disabled"), 1);

    for _ in 0..3 {
        let report = world.tick(0.1).unwrap();
        assert_eq!(report.outcome("rigid_body_physics"), Some(&SystemOutcome::Completed));
    }
    let rock = world.get(id).unwrap();
    assert!(rock.physical.as_ref().unwrap().body.is_none());
    assert_eq!(rock.position(), Some(DVec3::new(0.0, 5.0, 0.0)));
    assert!(matches!(world.orchestrator().physics_status(), PhysicsStatus::Disabled { .. }));
}

#[tokio::test]
async fn fractional_population_goes_extinct_once() {
    let sink = Arc::new(MemorySink::new());
    let mut world = World::new(&LawConfig::default(), sink.clone());
    let id: EntityId = world.add(population(0.5, 1)).unwrap().id;
    world.initialize().await;

    for _ in 0..5 {
        assert!(world.tick(0.1).is_some());
    }

    let count = world.get(id).unwrap().ecological.as_ref().unwrap().population.as_ref().unwrap().count;
    assert!(count.abs() < f64::EPSILON);
    assert_eq!(sink.count_kind("extinction"), 1);
}

#[tokio::test]
async fn falling_body_moves_and_books_impulses() {
    let mut world = World::new(&LawConfig::default(), Arc::new(MemorySink::new()));
    let rock = Entity::new(Scale::Structural).with_physical(Physical::massive(2.0, DVec3::new(0.0, 50.0, 0.0)));
    let id = world.add(rock).unwrap().id;
    world.initialize().await;

    for _ in 0..5 {
        world.tick(0.1).unwrap();
    }

    let rock = world.get(id).unwrap();
    assert!(rock.position().unwrap().y < 50.0);
    assert!(rock.velocity().y < 0.0);
    assert!(
        world
            .audit_trail()
            .iter()
            .any(|e| e.subjects == [LedgerSubject::Impulse(id)])
    );
    assert_eq!(world.query_nearest(rock.position().unwrap(), 1).len(), 1);
}
