//! The conservation ledger: running totals plus diagnostic trails.
//!
//! The [`ConservationLedger`] is the single source of truth for how much
//! mass, energy, charge, and momentum *should* exist, independent of what
//! the entity store currently holds.
//!
//! # Design
//!
//! - **Totals move only here**: `add_entity` / `remove_entity` are the only
//!   operations that change them.
//! - **Validation never mutates totals**: aggregation, disaggregation, and
//!   reaction checks audit the *proposed* delta and record violations, and
//!   the caller decides whether to commit.
//! - **Never fails**: every operation succeeds; problems are recorded and
//!   emitted to the injected [`EventSink`].
//! - **Snapshots only**: getters return owned copies.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ebb_events::{EventSink, LawEvent, TracingSink};
use ebb_types::{AuditOperation, ConservedQuantities, EntityId, Quantity};

use crate::audit::{AuditEntry, BoundedLog, LedgerSubject};
use crate::conservation::{Drift, Tolerance, ViolationRecord, check_balance};
use crate::LedgerConfig;

/// Aggregate view of the ledger for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    /// Violations currently retained.
    pub total_violations: usize,
    /// Retained violations per quantity. Every quantity is present.
    pub violations_by_quantity: BTreeMap<Quantity, usize>,
    /// Audit entries currently retained.
    pub audit_trail_size: usize,
    /// Audit entries evicted from the ring.
    pub audit_entries_dropped: u64,
    /// Violations recorded since the last reset, including evicted ones.
    pub lifetime_violations: u64,
    /// Current totals.
    pub current_totals: ConservedQuantities,
}

/// Tracks conserved totals and validates proposed transformations.
pub struct ConservationLedger {
    /// Running totals.
    totals: ConservedQuantities,
    /// Bounded operation history.
    audit: BoundedLog<AuditEntry>,
    /// Bounded violation history.
    violations: BoundedLog<ViolationRecord>,
    /// Tolerances for balance checks.
    tolerance: Tolerance,
    /// Next audit sequence number.
    sequence: u64,
    /// Violations recorded since the last reset.
    lifetime_violations: u64,
    /// Where violations are reported.
    sink: Arc<dyn EventSink>,
}

impl core::fmt::Debug for ConservationLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConservationLedger")
            .field("totals", &self.totals)
            .field("audit_len", &self.audit.len())
            .field("violations_len", &self.violations.len())
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl Default for ConservationLedger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl ConservationLedger {
    /// Create a ledger with default caps and tolerances.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(&LedgerConfig::default(), sink)
    }

    /// Create a ledger from configuration.
    pub fn with_config(config: &LedgerConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            totals: ConservedQuantities::ZERO,
            audit: BoundedLog::new(config.max_audit_entries),
            violations: BoundedLog::new(config.max_violations),
            tolerance: config.tolerance(),
            sequence: 0,
            lifetime_violations: 0,
            sink,
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Add `quantities` to the running totals.
    pub fn add_entity(&mut self, subject: impl Into<LedgerSubject>, quantities: ConservedQuantities) {
        let before = self.totals;
        self.totals = before + quantities;
        self.audit(AuditOperation::Add, vec![subject.into()], before, quantities);
    }

    /// Subtract `quantities` from the running totals.
    pub fn remove_entity(
        &mut self,
        subject: impl Into<LedgerSubject>,
        quantities: ConservedQuantities,
    ) {
        let before = self.totals;
        self.totals = before - quantities;
        self.audit(AuditOperation::Remove, vec![subject.into()], before, -quantities);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check that an aggregate carries its children's conserved totals.
    ///
    /// Records one violation per failing quantity and an `aggregate` audit
    /// entry with the proposed delta. Totals are untouched.
    pub fn validate_aggregation(
        &mut self,
        child_ids: &[EntityId],
        aggregate_id: EntityId,
        children_totals: ConservedQuantities,
        aggregate_totals: ConservedQuantities,
        context: &str,
    ) -> bool {
        let subjects = child_ids
            .iter()
            .copied()
            .chain(core::iter::once(aggregate_id))
            .map(LedgerSubject::Entity)
            .collect();
        self.validate(
            AuditOperation::Aggregate,
            subjects,
            children_totals,
            aggregate_totals,
            context,
            "aggregation",
        )
    }

    /// Check that an aggregate's fragments carry the aggregate's totals.
    pub fn validate_disaggregation(
        &mut self,
        aggregate_id: EntityId,
        fragment_ids: &[EntityId],
        aggregate_totals: ConservedQuantities,
        fragment_totals: ConservedQuantities,
        context: &str,
    ) -> bool {
        let subjects = core::iter::once(aggregate_id)
            .chain(fragment_ids.iter().copied())
            .map(LedgerSubject::Entity)
            .collect();
        self.validate(
            AuditOperation::Disaggregate,
            subjects,
            aggregate_totals,
            fragment_totals,
            context,
            "disaggregation",
        )
    }

    /// Check that a reaction's products carry its reactants' totals.
    pub fn validate_reaction(
        &mut self,
        reactant_ids: &[EntityId],
        product_ids: &[EntityId],
        reactant_totals: ConservedQuantities,
        product_totals: ConservedQuantities,
        context: &str,
    ) -> bool {
        let subjects = reactant_ids
            .iter()
            .chain(product_ids)
            .copied()
            .map(LedgerSubject::Entity)
            .collect();
        self.validate(
            AuditOperation::Reaction,
            subjects,
            reactant_totals,
            product_totals,
            context,
            "reaction",
        )
    }

    /// Compare totals re-derived from the store against the bookkeeping.
    ///
    /// Records violations for drift but writes no audit entry.
    pub fn cross_check(&mut self, derived: ConservedQuantities, context: &str) -> bool {
        let drifts = check_balance(&self.totals, &derived, &self.tolerance);
        let valid = drifts.is_empty();
        for drift in drifts {
            self.record_violation(drift, format!("{context} - {} drifted from ledger", drift.quantity));
        }
        valid
    }

    fn validate(
        &mut self,
        operation: AuditOperation,
        subjects: Vec<LedgerSubject>,
        input: ConservedQuantities,
        output: ConservedQuantities,
        context: &str,
        label: &str,
    ) -> bool {
        let drifts = check_balance(&input, &output, &self.tolerance);
        let valid = drifts.is_empty();
        for drift in drifts {
            self.record_violation(
                drift,
                format!("{context} - {} not conserved in {label}", drift.quantity),
            );
        }
        let before = self.totals;
        self.audit(operation, subjects, before, output - input);
        valid
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Zero the totals and clear both trails.
    pub fn reset(&mut self) {
        debug!(
            audit_entries = self.audit.len(),
            violations = self.violations.len(),
            "Ledger reset"
        );
        self.totals = ConservedQuantities::ZERO;
        self.audit.clear();
        self.violations.clear();
        self.sequence = 0;
        self.lifetime_violations = 0;
    }

    /// Clear retained violations, keeping totals and the audit trail.
    pub fn clear_violations(&mut self) {
        self.violations.clear();
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Current totals.
    pub const fn totals(&self) -> ConservedQuantities {
        self.totals
    }

    /// Retained violations, oldest first.
    pub fn violations(&self) -> Vec<ViolationRecord> {
        self.violations.to_vec()
    }

    /// Retained audit entries, oldest first.
    pub fn audit_trail(&self) -> Vec<AuditEntry> {
        self.audit.to_vec()
    }

    /// The tolerances in force.
    pub const fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Diagnostics summary.
    pub fn statistics(&self) -> LedgerStatistics {
        let mut violations_by_quantity: BTreeMap<Quantity, usize> =
            Quantity::ALL.iter().map(|q| (*q, 0)).collect();
        for record in self.violations.iter() {
            if let Some(count) = violations_by_quantity.get_mut(&record.quantity) {
                *count = count.saturating_add(1);
            }
        }
        LedgerStatistics {
            total_violations: self.violations.len(),
            violations_by_quantity,
            audit_trail_size: self.audit.len(),
            audit_entries_dropped: self.audit.dropped(),
            lifetime_violations: self.lifetime_violations,
            current_totals: self.totals,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn audit(
        &mut self,
        operation: AuditOperation,
        subjects: Vec<LedgerSubject>,
        before: ConservedQuantities,
        delta: ConservedQuantities,
    ) {
        let entry = AuditEntry {
            sequence: self.sequence,
            timestamp: Utc::now(),
            operation,
            subjects,
            before,
            after: self.totals,
            delta,
        };
        self.sequence = self.sequence.saturating_add(1);
        self.audit.push(entry);
    }

    fn record_violation(&mut self, drift: Drift, context: String) {
        self.lifetime_violations = self.lifetime_violations.saturating_add(1);
        self.sink.emit(LawEvent::ConservationViolation {
            quantity: drift.quantity,
            expected: drift.expected,
            actual: drift.actual,
            drift: drift.drift,
            context: context.clone(),
        });
        self.violations.push(ViolationRecord {
            timestamp: Utc::now(),
            quantity: drift.quantity,
            expected: drift.expected,
            actual: drift.actual,
            drift: drift.drift,
            context,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_events::MemorySink;
    use ebb_types::DVec3;

    fn ledger() -> (ConservationLedger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (ConservationLedger::new(sink.clone()), sink)
    }

    #[test]
    fn add_and_remove_move_totals() {
        let (mut ledger, _) = ledger();
        let id = EntityId::new();
        ledger.add_entity(id, ConservedQuantities::new(10.0, 5.0).with_charge(1.0));
        ledger.remove_entity(id, ConservedQuantities::new(4.0, 2.0));
        let totals = ledger.totals();
        assert!((totals.mass - 6.0).abs() < 1e-10);
        assert!((totals.energy - 3.0).abs() < 1e-10);
        assert!((totals.charge - 1.0).abs() < 1e-10);
    }

    #[test]
    fn audit_records_before_after_and_delta() {
        let (mut ledger, _) = ledger();
        let id = EntityId::new();
        ledger.add_entity(id, ConservedQuantities::new(50.0, 500.0));
        ledger.remove_entity(id, ConservedQuantities::new(50.0, 500.0));
        let trail = ledger.audit_trail();
        let remove = trail.get(1).cloned();
        assert!(remove.as_ref().is_some_and(|e| (e.before.mass - 50.0).abs() < 1e-12));
        assert!(remove.as_ref().is_some_and(|e| e.after.mass.abs() < 1e-12));
        assert!(remove.as_ref().is_some_and(|e| (e.delta.mass + 50.0).abs() < 1e-12));
        assert_eq!(remove.map(|e| e.sequence), Some(1));
    }

    #[test]
    fn validation_leaves_totals_alone() {
        let (mut ledger, _) = ledger();
        ledger.add_entity(EntityId::new(), ConservedQuantities::new(80.0, 800.0));
        let before = ledger.totals();
        let valid = ledger.validate_aggregation(
            &[EntityId::new(), EntityId::new()],
            EntityId::new(),
            ConservedQuantities::new(80.0, 800.0),
            ConservedQuantities::new(80.0, 780.0),
            "test",
        );
        assert!(valid);
        assert_eq!(ledger.totals(), before);
        let last = ledger.audit_trail().last().cloned();
        assert_eq!(last.as_ref().map(|e| e.operation), Some(AuditOperation::Aggregate));
        assert_eq!(last.as_ref().map(|e| e.subjects.len()), Some(3));
        assert!(last.is_some_and(|e| (e.delta.energy + 20.0).abs() < 1e-12));
    }

    #[test]
    fn violations_are_emitted_and_contextualised() {
        let (mut ledger, sink) = ledger();
        let valid = ledger.validate_reaction(
            &[EntityId::new()],
            &[EntityId::new()],
            ConservedQuantities::new(10.0, 100.0).with_charge(2.0),
            ConservedQuantities::new(10.0, 100.0).with_charge(3.0),
            "H + O",
        );
        assert!(!valid);
        let violations = ledger.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.first().map(|v| v.quantity), Some(Quantity::Charge));
        assert_eq!(
            violations.first().map(|v| v.context.as_str()),
            Some("H + O - charge not conserved in reaction")
        );
        assert_eq!(sink.count_kind("conservation_violation"), 1);
    }

    #[test]
    fn disaggregation_audits_aggregate_then_fragments() {
        let (mut ledger, _) = ledger();
        let aggregate = EntityId::new();
        let fragments = [EntityId::new(), EntityId::new()];
        assert!(ledger.validate_disaggregation(
            aggregate,
            &fragments,
            ConservedQuantities::new(4.0, 40.0),
            ConservedQuantities::new(4.0, 40.0),
            "melt",
        ));
        let entry = ledger.audit_trail().pop();
        assert_eq!(
            entry.as_ref().map(|e| e.operation),
            Some(AuditOperation::Disaggregate)
        );
        assert_eq!(
            entry.and_then(|e| e.subjects.first().copied()),
            Some(LedgerSubject::Entity(aggregate))
        );
    }

    #[test]
    fn cross_check_flags_silent_loss_without_auditing() {
        let (mut ledger, _) = ledger();
        ledger.add_entity(EntityId::new(), ConservedQuantities::new(10.0, 0.0));
        let trail_len = ledger.audit_trail().len();
        assert!(ledger.cross_check(ConservedQuantities::new(10.0, 0.0), "periodic"));
        assert!(!ledger.cross_check(ConservedQuantities::new(9.0, 0.0), "periodic"));
        assert_eq!(ledger.audit_trail().len(), trail_len);
        assert_eq!(ledger.violations().len(), 1);
    }

    #[test]
    fn impulse_subject_adds_energy_and_momentum_without_mass() {
        let (mut ledger, _) = ledger();
        let id = EntityId::new();
        ledger.add_entity(
            LedgerSubject::Impulse(id),
            ConservedQuantities::new(0.0, 12.5).with_momentum(DVec3::new(0.0, -5.0, 0.0)),
        );
        let totals = ledger.totals();
        assert!(totals.mass.abs() < f64::EPSILON);
        assert!((totals.momentum.y + 5.0).abs() < 1e-12);
        let subject = ledger.audit_trail().first().and_then(|e| e.subjects.first().copied());
        assert_eq!(subject, Some(LedgerSubject::Impulse(id)));
    }

    #[test]
    fn statistics_count_by_quantity() {
        let (mut ledger, _) = ledger();
        ledger.validate_aggregation(
            &[EntityId::new()],
            EntityId::new(),
            ConservedQuantities::new(10.0, 100.0),
            ConservedQuantities::new(11.0, 200.0),
            "bad",
        );
        let stats = ledger.statistics();
        assert_eq!(stats.total_violations, 2);
        assert_eq!(stats.violations_by_quantity.get(&Quantity::Mass), Some(&1));
        assert_eq!(stats.violations_by_quantity.get(&Quantity::Energy), Some(&1));
        assert_eq!(stats.violations_by_quantity.get(&Quantity::Momentum), Some(&0));
        assert_eq!(stats.audit_trail_size, 1);
        assert_eq!(stats.lifetime_violations, 2);
    }

    #[test]
    fn clear_violations_keeps_totals_and_trail() {
        let (mut ledger, _) = ledger();
        ledger.add_entity(EntityId::new(), ConservedQuantities::new(1.0, 1.0));
        ledger.cross_check(ConservedQuantities::ZERO, "x");
        ledger.clear_violations();
        assert!(ledger.violations().is_empty());
        assert_eq!(ledger.audit_trail().len(), 1);
        assert!((ledger.totals().mass - 1.0).abs() < f64::EPSILON);
    }
}
