//! Aggregation of molecules into materials, and disaggregation back.
//!
//! Every `interval` seconds the system makes two passes.
//!
//! # Aggregation
//!
//! Free molecular entities (tracked, cooler than the disaggregation
//! temperature, not already grouped) are visited in id order. Each
//! ungrouped seed collects its ungrouped neighbours within `radius`,
//! nearest first, up to `max_group_size`. Groups of at least
//! `min_group_size` become one material-scale aggregate:
//!
//! | Quantity | Rule |
//! |----------|------|
//! | mass, charge, momentum | summed |
//! | position | centre of mass |
//! | velocity | momentum / mass (mass-weighted) |
//! | temperature | the children's total energy minus the aggregate's KE, as heat |
//!
//! # Disaggregation
//!
//! Aggregates hotter than `disaggregation_temperature` split into as many
//! molecular fragments as they had children. Fragments share the
//! aggregate's velocity and temperature and sit on a ring of radius
//! `fragment_spacing` around its centre. Mass, charge and atoms are divided
//! evenly with the remainder going to the last fragment.
//!
//! Both directions are validated with the ledger and committed according to
//! the [`ViolationPolicy`](crate::ViolationPolicy).

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::TAU;

use ebb_events::LawEvent;
use ebb_types::{
    Aggregation, AuditOperation, Chemical, ConservedQuantities, DVec3, Entity, EntityId, Identity,
    Physical, Scale, SimulationDetail,
};
use tracing::{debug, info};

use crate::accounting::{self, conserved_quantities, total_energy};
use crate::config::AggregationConfig;
use crate::context::SystemContext;
use crate::elements;
use crate::error::LawError;
use crate::kernels::CMB_TEMPERATURE;
use crate::system::{Interval, LawSystem};

/// Material formation and break-up.
#[derive(Debug, Clone)]
pub struct AggregationSystem {
    config: AggregationConfig,
    interval: Interval,
}

impl AggregationSystem {
    /// A system with the given grouping rules.
    pub const fn new(config: AggregationConfig) -> Self {
        let interval = Interval::new(config.interval);
        Self { config, interval }
    }

    fn is_candidate(&self, entity: &Entity) -> bool {
        entity.scale == Scale::Molecular
            && entity.is_tracked()
            && entity.aggregation.is_none()
            && entity.physical.as_ref().is_some_and(|p| p.body.is_none())
            && entity
                .temperature()
                .is_none_or(|t| t < self.config.disaggregation_temperature)
    }

    /// Partition candidates into groups, seeds in id order.
    fn groups(&self, ctx: &SystemContext<'_>) -> Vec<Vec<EntityId>> {
        let candidates: BTreeSet<EntityId> = ctx
            .store
            .ids_where(|e| self.is_candidate(e))
            .into_iter()
            .collect();
        let mut grouped = BTreeSet::new();
        let mut groups = Vec::new();

        for &seed in &candidates {
            if grouped.contains(&seed) {
                continue;
            }
            let Some(origin) = ctx.store.get(seed).and_then(Entity::position) else {
                continue;
            };
            let mut members: Vec<(f64, EntityId)> = ctx
                .spatial
                .query_radius(origin, self.config.radius)
                .into_iter()
                .filter(|id| candidates.contains(id) && !grouped.contains(id))
                .filter_map(|id| {
                    ctx.store
                        .get(id)
                        .and_then(Entity::position)
                        .map(|p| (p.distance_squared(origin), id))
                })
                .collect();
            if !members.iter().any(|(_, id)| *id == seed) {
                members.push((0.0, seed));
            }
            members.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            members.truncate(self.config.max_group_size);

            if members.len() >= self.config.min_group_size.max(2) {
                let ids: Vec<EntityId> = members.into_iter().map(|(_, id)| id).collect();
                grouped.extend(ids.iter().copied());
                groups.push(ids);
            }
        }
        groups
    }

    fn aggregate(&self, ctx: &mut SystemContext<'_>, children: &[EntityId]) -> Result<(), LawError> {
        let entities: Vec<&Entity> = children.iter().filter_map(|id| ctx.store.get(*id)).collect();
        if entities.len() != children.len() {
            return Ok(());
        }
        let children_totals: ConservedQuantities = entities.iter().map(|e| conserved_quantities(e)).sum();
        let energy: f64 = entities.iter().map(|e| total_energy(e)).sum();
        let mass = children_totals.mass;

        let position = entities
            .iter()
            .map(|e| e.position().unwrap_or_default() * e.mass().unwrap_or(0.0))
            .sum::<DVec3>()
            / mass;
        let mut elements_merged = BTreeMap::new();
        let mut bonds = Vec::new();
        for chemical in entities.iter().filter_map(|e| e.chemical.as_ref()) {
            for (symbol, count) in &chemical.elements {
                let slot: &mut u32 = elements_merged.entry(symbol.clone()).or_insert(0);
                *slot = slot.saturating_add(*count);
            }
            bonds.extend(chemical.bonds.iter().cloned());
        }
        let generation = entities
            .iter()
            .map(|e| e.identity.generation)
            .max()
            .unwrap_or(0)
            .saturating_add(1);

        let mut aggregate = Entity::new(Scale::Material)
            .with_detail(SimulationDetail::Aggregate)
            .with_identity(Identity {
                generation,
                ..Identity::default()
            })
            .with_physical(
                Physical::massive(mass, position)
                    .with_velocity(children_totals.momentum / mass)
                    .with_charge(children_totals.charge)
                    .with_temperature(CMB_TEMPERATURE),
            )
            .with_chemical(Chemical {
                elements: elements_merged,
                bonds,
                orbital_shells: None,
            })
            .with_aggregation(Aggregation {
                children: children.to_vec(),
                conserved_mass: mass,
                conserved_charge: children_totals.charge,
                conserved_energy: energy,
                scale: Scale::Material,
            });
        settle_temperature(&mut aggregate, energy);

        let aggregate_id = aggregate.id;
        let aggregate_totals = conserved_quantities(&aggregate);
        let context = format!("aggregate of {} children at tick {}", children.len(), ctx.tick);
        let balanced = ctx
            .ledger
            .validate_aggregation(children, aggregate_id, children_totals, aggregate_totals, &context);
        if !ctx.policy.permits(balanced) {
            ctx.emit(LawEvent::TransformationRejected {
                operation: AuditOperation::Aggregate,
                context,
            });
            return Ok(());
        }

        for id in children {
            ctx.despawn(*id);
        }
        ctx.spawn(aggregate)?;
        info!(aggregate = %aggregate_id, children = children.len(), balanced, "Aggregate formed");
        ctx.emit(LawEvent::AggregateFormed {
            aggregate: aggregate_id,
            children: children.to_vec(),
            balanced,
        });
        Ok(())
    }

    fn disaggregate(&self, ctx: &mut SystemContext<'_>, id: EntityId) -> Result<(), LawError> {
        let Some(aggregate) = ctx.store.get(id) else {
            return Ok(());
        };
        let fragments = self.fragments(aggregate);
        if fragments.is_empty() {
            return Ok(());
        }
        let aggregate_totals = conserved_quantities(aggregate);
        let fragment_totals: ConservedQuantities = fragments.iter().map(conserved_quantities).sum();
        let fragment_ids: Vec<EntityId> = fragments.iter().map(|f| f.id).collect();

        let context = format!(
            "disaggregation into {} fragments at tick {}",
            fragments.len(),
            ctx.tick
        );
        let balanced = ctx.ledger.validate_disaggregation(
            id,
            &fragment_ids,
            aggregate_totals,
            fragment_totals,
            &context,
        );
        if !ctx.policy.permits(balanced) {
            ctx.emit(LawEvent::TransformationRejected {
                operation: AuditOperation::Disaggregate,
                context,
            });
            return Ok(());
        }

        ctx.despawn(id);
        for fragment in fragments {
            ctx.spawn(fragment)?;
        }
        info!(aggregate = %id, fragments = fragment_ids.len(), balanced, "Aggregate dissolved");
        ctx.emit(LawEvent::AggregateDissolved {
            aggregate: id,
            fragments: fragment_ids,
            balanced,
        });
        Ok(())
    }

    /// Split `aggregate` into molecular fragments.
    fn fragments(&self, aggregate: &Entity) -> Vec<Entity> {
        let (Some(group), Some(mass), Some(center)) = (
            aggregate.aggregation.as_ref(),
            aggregate.mass(),
            aggregate.position(),
        ) else {
            return Vec::new();
        };
        let count = u32::try_from(group.children.len()).unwrap_or(u32::MAX).max(2);
        let n = f64::from(count);
        let share = mass / n;
        let charge_share = aggregate.charge() / n;
        let velocity = aggregate.velocity();
        let temperature = aggregate.temperature();
        let energy_share = total_energy(aggregate) / n;

        let mut fragments = Vec::new();
        let mut assigned_mass = 0.0;
        let mut assigned_charge = 0.0;
        for index in 0..count {
            let last = index.saturating_add(1) == count;
            let fragment_mass = if last { mass - assigned_mass } else { share };
            let fragment_charge = if last {
                aggregate.charge() - assigned_charge
            } else {
                charge_share
            };
            assigned_mass += fragment_mass;
            assigned_charge += fragment_charge;

            let angle = TAU * f64::from(index) / n;
            let offset = DVec3::new(angle.cos(), 0.0, angle.sin()) * self.config.fragment_spacing;
            let mut physical = Physical::massive(fragment_mass, center + offset)
                .with_velocity(velocity)
                .with_charge(fragment_charge);
            physical.temperature = temperature;

            let mut fragment = Entity::new(Scale::Molecular)
                .with_detail(SimulationDetail::Explicit)
                .with_identity(Identity {
                    parent_id: Some(aggregate.id),
                    lineage_id: aggregate.identity.lineage_id,
                    generation: aggregate.identity.generation.saturating_add(1),
                })
                .with_physical(physical);
            if let Some(chemical) = aggregate.chemical.as_ref() {
                fragment = fragment.with_chemical(split_chemical(chemical, index, count));
            }
            if temperature.is_some() {
                settle_temperature(&mut fragment, energy_share);
            }
            fragments.push(fragment);
        }
        fragments
    }
}

/// Give `entity` the temperature that makes its total energy `energy`.
fn settle_temperature(entity: &mut Entity, energy: f64) {
    let thermal = energy - entity.kinetic_energy();
    let temperature = accounting::temperature_for(entity, thermal)
        .unwrap_or(CMB_TEMPERATURE)
        .max(CMB_TEMPERATURE);
    let state = elements::phase_points(entity.chemical.as_ref()).phase_at(temperature);
    if let Some(p) = entity.physical.as_mut() {
        p.temperature = Some(temperature);
        p.state = Some(state);
    }
}

/// Fragment `index` of `count`: each element divided evenly, remainder to
/// the last fragment.
fn split_chemical(chemical: &Chemical, index: u32, count: u32) -> Chemical {
    let last = index.saturating_add(1) == count;
    let elements = chemical
        .elements
        .iter()
        .filter_map(|(symbol, total)| {
            let share = total.checked_div(count).unwrap_or(0);
            let n = if last {
                total.saturating_sub(share.saturating_mul(count.saturating_sub(1)))
            } else {
                share
            };
            (n > 0).then(|| (symbol.clone(), n))
        })
        .collect();
    Chemical {
        elements,
        bonds: Vec::new(),
        orbital_shells: None,
    }
}

impl LawSystem for AggregationSystem {
    fn name(&self) -> &'static str {
        "aggregation"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        if !self.interval.advance(delta) {
            return Ok(());
        }

        let groups = self.groups(ctx);
        for group in &groups {
            self.aggregate(ctx, group)?;
        }

        let hot: Vec<EntityId> = ctx.store.ids_where(|e| {
            e.aggregation.is_some()
                && e.temperature()
                    .is_some_and(|t| t > self.config.disaggregation_temperature)
        });
        for id in hot {
            self.disaggregate(ctx, id)?;
        }

        debug!(tick = ctx.tick, groups = groups.len(), "Aggregation pass complete");
        Ok(())
    }

    fn reset(&mut self) {
        self.interval.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::testing::Harness;

    fn molecule(position: DVec3, temperature: f64) -> Entity {
        Entity::new(Scale::Molecular)
            .with_physical(
                Physical::massive(2.0, position)
                    .with_temperature(temperature)
                    .with_velocity(DVec3::new(position.x, 0.0, 0.0)),
            )
            .with_chemical(Chemical::from_elements([("H", 2), ("O", 1)]))
    }

    #[test]
    fn waits_for_the_interval() {
        let mut h = Harness::new();
        h.add(molecule(DVec3::ZERO, 300.0));
        h.add(molecule(DVec3::X, 300.0));
        let mut system = AggregationSystem::new(AggregationConfig::default());
        assert!(h.run(&mut system, 0.5).is_ok());
        assert_eq!(h.store.len(), 2);
        assert!(h.run(&mut system, 0.5).is_ok());
        assert_eq!(h.store.len(), 1);
    }

    #[test]
    fn neighbours_merge_into_a_balanced_material() {
        let mut h = Harness::new();
        let a = h.add(molecule(DVec3::ZERO, 300.0));
        let b = h.add(molecule(DVec3::new(1.0, 0.0, 0.0), 300.0));
        let far = h.add(molecule(DVec3::new(100.0, 0.0, 0.0), 300.0));
        let totals = h.ledger.totals();

        assert!(h.run(&mut AggregationSystem::new(AggregationConfig::default()), 1.0).is_ok());

        assert!(!h.store.contains(a) && !h.store.contains(b) && h.store.contains(far));
        let aggregate = h
            .store
            .iter()
            .find(|e| e.is_aggregate())
            .cloned()
            .unwrap();
        assert_eq!(aggregate.scale, Scale::Material);
        assert!((aggregate.mass().unwrap() - 4.0).abs() < 1e-10);
        assert!((aggregate.velocity().x - 0.5).abs() < 1e-10);
        assert!((aggregate.position().unwrap().x - 0.5).abs() < 1e-10);
        let group = aggregate.aggregation.clone();
        assert_eq!(group.map(|g| g.children.len()), Some(2));

        assert!(h.ledger.violations().is_empty());
        assert!((h.ledger.totals().mass - totals.mass).abs() < 1e-10);
        assert!((h.ledger.totals().energy - totals.energy).abs() / totals.energy < 1e-9);
        assert_eq!(h.sink.count_kind("aggregate_formed"), 1);
    }

    #[test]
    fn lonely_molecules_stay_explicit() {
        let mut h = Harness::new();
        h.add(molecule(DVec3::ZERO, 300.0));
        h.add(molecule(DVec3::new(10.0, 0.0, 0.0), 300.0));
        assert!(h.run(&mut AggregationSystem::new(AggregationConfig::default()), 1.0).is_ok());
        assert_eq!(h.store.len(), 2);
    }

    #[test]
    fn hot_aggregates_fall_apart_conserving_totals() {
        let mut h = Harness::new();
        h.add(molecule(DVec3::ZERO, 300.0));
        h.add(molecule(DVec3::X, 300.0));
        h.add(molecule(DVec3::Y, 300.0));
        let mut system = AggregationSystem::new(AggregationConfig::default());
        assert!(h.run(&mut system, 1.0).is_ok());
        assert_eq!(h.store.len(), 1);

        let id = h.store.iter().next().map(|e| e.id).unwrap();
        if let Some(p) = h.store.get_mut(id).and_then(|e| e.physical.as_mut()) {
            p.temperature = Some(2500.0);
        }
        // Re-register the heated aggregate as a collaborator would.
        let heated = h.store.get(id).map(conserved_quantities).unwrap();
        h.ledger.reset();
        h.ledger.add_entity(id, heated);

        assert!(h.run(&mut system, 1.0).is_ok());
        assert_eq!(h.store.len(), 3);
        assert!(h.store.iter().all(|e| e.identity.parent_id == Some(id)));
        assert!(h.ledger.violations().is_empty());
        assert!((h.ledger.totals().mass - 6.0).abs() < 1e-10);
        let atoms: u32 = h
            .store
            .iter()
            .filter_map(|e| e.chemical.as_ref())
            .map(Chemical::atom_count)
            .sum();
        assert_eq!(atoms, 9);
        assert_eq!(h.sink.count_kind("aggregate_dissolved"), 1);
    }

    #[test]
    fn overheated_molecules_do_not_aggregate() {
        let mut h = Harness::new();
        h.add(molecule(DVec3::ZERO, 300.0));
        h.add(molecule(DVec3::X, 300.0));
        let tight = AggregationConfig {
            disaggregation_temperature: 100.0,
            ..AggregationConfig::default()
        };
        assert!(h.run(&mut AggregationSystem::new(tight), 1.0).is_ok());
        assert_eq!(h.store.len(), 2);
        assert_eq!(h.sink.count_kind("aggregate_formed"), 0);
    }
}
