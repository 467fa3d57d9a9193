//! Behavioural properties of the conservation ledger.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use ebb_events::{MemorySink, NullSink};
use ebb_ledger::{ConservationLedger, LedgerConfig};
use ebb_types::{AuditOperation, ConservedQuantities, DVec3, EntityId, Quantity};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn ledger() -> ConservationLedger {
    ConservationLedger::new(Arc::new(NullSink))
}

#[test]
fn mass_and_charge_are_exact_over_add_remove_sequences() {
    let mut ledger = ledger();
    let mut rng = SmallRng::seed_from_u64(42);
    let mut live: Vec<(EntityId, ConservedQuantities)> = Vec::new();
    let mut expected_mass = 0.0;
    let mut expected_charge = 0.0;

    for step in 0..500 {
        if step % 3 == 2 && !live.is_empty() {
            let (id, q) = live.remove(step % live.len());
            ledger.remove_entity(id, q);
            expected_mass -= q.mass;
            expected_charge -= q.charge;
        } else {
            let q = ConservedQuantities::new(rng.random::<f64>() * 100.0 + 0.001, rng.random::<f64>() * 1e4)
                .with_charge((rng.random::<f64>() - 0.5) * 4.0);
            let id = EntityId::new();
            ledger.add_entity(id, q);
            live.push((id, q));
            expected_mass += q.mass;
            expected_charge += q.charge;
        }
    }

    let totals = ledger.totals();
    assert!((totals.mass - expected_mass).abs() < 1e-10);
    assert!((totals.charge - expected_charge).abs() < 1e-10);

    for (id, q) in live {
        ledger.remove_entity(id, q);
    }
    assert!(ledger.totals().mass.abs() < 1e-9);
}

#[test]
fn aggregation_mass_mismatch_records_exactly_one_violation() {
    let mut ledger = ledger();
    let children = [EntityId::new(), EntityId::new()];
    let valid = ledger.validate_aggregation(
        &children,
        EntityId::new(),
        ConservedQuantities::new(100.0, 1000.0),
        ConservedQuantities::new(95.0, 1000.0),
        "test aggregation",
    );
    assert!(!valid);
    let violations = ledger.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].quantity, Quantity::Mass);
    assert!((violations[0].drift - 5.0).abs() < 1e-12);
    assert!((violations[0].expected - 100.0).abs() < f64::EPSILON);
    assert!((violations[0].actual - 95.0).abs() < f64::EPSILON);
}

#[test]
fn aggregation_with_exact_mass_and_small_energy_drift_passes() {
    let mut ledger = ledger();
    let valid = ledger.validate_aggregation(
        &[EntityId::new(), EntityId::new(), EntityId::new()],
        EntityId::new(),
        ConservedQuantities::new(100.0, 1000.0).with_charge(1.0),
        ConservedQuantities::new(100.0, 1020.0).with_charge(1.0),
        "ok",
    );
    assert!(valid);
    assert!(ledger.violations().is_empty());
}

#[test]
fn energy_drift_of_exactly_five_percent_passes() {
    let mut ledger = ledger();
    let valid = ledger.validate_reaction(
        &[EntityId::new()],
        &[EntityId::new()],
        ConservedQuantities::new(1.0, 1000.0),
        ConservedQuantities::new(1.0, 1050.0),
        "boundary",
    );
    assert!(valid);
    assert!(ledger.violations().is_empty());

    let valid = ledger.validate_reaction(
        &[EntityId::new()],
        &[EntityId::new()],
        ConservedQuantities::new(1.0, 1000.0),
        ConservedQuantities::new(1.0, 1050.5),
        "just over",
    );
    assert!(!valid);
    assert_eq!(ledger.violations()[0].quantity, Quantity::Energy);

    let valid = ledger.validate_reaction(
        &[EntityId::new()],
        &[EntityId::new()],
        ConservedQuantities::new(1.0, 1000.0),
        ConservedQuantities::new(1.0, 1100.0),
        "ten percent",
    );
    assert!(!valid);
}

#[test]
fn charge_change_in_reaction_is_a_violation() {
    let sink = Arc::new(MemorySink::new());
    let mut ledger = ConservationLedger::new(sink.clone());
    let valid = ledger.validate_reaction(
        &[EntityId::new(), EntityId::new()],
        &[EntityId::new()],
        ConservedQuantities::new(10.0, 100.0).with_charge(2.0),
        ConservedQuantities::new(10.0, 100.0).with_charge(3.0),
        "ionisation",
    );
    assert!(!valid);
    assert_eq!(ledger.violations()[0].quantity, Quantity::Charge);
    assert_eq!(sink.count_kind("conservation_violation"), 1);
}

#[test]
fn audit_trail_keeps_call_order_and_fifo_cap() {
    let config = LedgerConfig {
        max_audit_entries: 10,
        ..LedgerConfig::default()
    };
    let mut ledger = ConservationLedger::with_config(&config, Arc::new(NullSink));

    let ids: Vec<EntityId> = (0..7).map(|_| EntityId::new()).collect();
    for id in &ids {
        ledger.add_entity(*id, ConservedQuantities::new(1.0, 0.0));
    }
    let trail = ledger.audit_trail();
    assert_eq!(trail.len(), 7);
    for (entry, id) in trail.iter().zip(&ids) {
        assert_eq!(entry.subjects[0].entity(), Some(*id));
        assert_eq!(entry.operation, AuditOperation::Add);
    }

    for id in &ids {
        ledger.remove_entity(*id, ConservedQuantities::new(1.0, 0.0));
    }
    let trail = ledger.audit_trail();
    assert_eq!(trail.len(), 10);
    // 14 operations, cap 10: sequences 4..=13 remain.
    let sequences: Vec<u64> = trail.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (4..14).collect::<Vec<u64>>());
    assert_eq!(ledger.statistics().audit_entries_dropped, 4);
}

#[test]
fn violation_ring_is_bounded() {
    let config = LedgerConfig {
        max_violations: 3,
        ..LedgerConfig::default()
    };
    let mut ledger = ConservationLedger::with_config(&config, Arc::new(NullSink));
    for i in 0..5 {
        ledger.cross_check(ConservedQuantities::new(f64::from(i) + 1.0, 0.0), &format!("run {i}"));
    }
    let violations = ledger.violations();
    assert_eq!(violations.len(), 3);
    assert_eq!(violations[0].context, "run 2 - mass drifted from ledger");
    assert_eq!(ledger.statistics().lifetime_violations, 5);
}

#[test]
fn reset_is_idempotent() {
    let mut ledger = ledger();
    ledger.add_entity(
        EntityId::new(),
        ConservedQuantities::new(3.0, 4.0)
            .with_charge(1.0)
            .with_momentum(DVec3::ONE),
    );
    ledger.cross_check(ConservedQuantities::ZERO, "drift");

    for _ in 0..2 {
        ledger.reset();
        assert_eq!(ledger.totals(), ConservedQuantities::ZERO);
        assert!(ledger.violations().is_empty());
        assert!(ledger.audit_trail().is_empty());
        assert_eq!(ledger.statistics().total_violations, 0);
    }

    ledger.add_entity(EntityId::new(), ConservedQuantities::new(1.0, 1.0));
    assert_eq!(ledger.audit_trail()[0].sequence, 0);
}

#[test]
fn end_to_end_add_add_remove() {
    let mut ledger = ledger();
    let a = EntityId::new();
    let b = EntityId::new();

    ledger.add_entity(a, ConservedQuantities::new(50.0, 500.0));
    ledger.add_entity(b, ConservedQuantities::new(30.0, 300.0));
    let totals = ledger.totals();
    assert!((totals.mass - 80.0).abs() < 1e-10);
    assert!((totals.energy - 800.0).abs() < 1e-10);

    ledger.remove_entity(a, ConservedQuantities::new(50.0, 500.0));
    let totals = ledger.totals();
    assert!((totals.mass - 30.0).abs() < 1e-10);
    assert!((totals.energy - 300.0).abs() < 1e-10);

    let operations: Vec<AuditOperation> =
        ledger.audit_trail().iter().map(|e| e.operation).collect();
    assert_eq!(
        operations,
        vec![AuditOperation::Add, AuditOperation::Add, AuditOperation::Remove]
    );
}

#[test]
fn statistics_serialize_with_per_quantity_counts() {
    let mut ledger = ledger();
    let id = EntityId::new();
    ledger.add_entity(id, ConservedQuantities::new(2.0, 20.0));
    ledger.validate_reaction(
        &[id],
        &[EntityId::new()],
        ConservedQuantities::new(2.0, 20.0).with_charge(1.0),
        ConservedQuantities::new(2.0, 20.0),
        "ionisation",
    );

    let json = serde_json::to_value(ledger.statistics()).unwrap();
    assert_eq!(json["total_violations"], 1);
    assert_eq!(json["violations_by_quantity"]["charge"], 1);
    assert_eq!(json["violations_by_quantity"]["mass"], 0);
    assert_eq!(json["audit_trail_size"], 2);

    let entry = serde_json::to_value(&ledger.audit_trail()[0]).unwrap();
    assert_eq!(entry["subjects"][0]["type"], "entity");
}
