//! Reaction kinetics: nearby atoms and molecules combine into products.
//!
//! Each eligible entity, in id order, considers its nearest compatible
//! neighbour within `reaction_radius`. The pair reacts with probability
//! `1 − exp(−k·Δt)` where `k` is the Arrhenius rate at the pair's mean
//! temperature. An entity takes part in at most one reaction per tick.
//!
//! # Product
//!
//! | Quantity | Rule |
//! |----------|------|
//! | elements, bonds | merged, plus one new bond between the primary elements |
//! | mass, charge, momentum | summed |
//! | position | centre of mass |
//! | temperature | thermal energy = reactants' energy + bond heat − product KE |
//!
//! The reactant and product totals are validated with the ledger before
//! anything is committed; the [`ViolationPolicy`](crate::ViolationPolicy)
//! decides whether an unbalanced reaction still goes ahead.

use std::collections::BTreeSet;

use ebb_events::LawEvent;
use ebb_types::{
    AuditOperation, Chemical, Entity, EntityId, Identity, Physical, Scale, SimulationDetail,
};
use rand::Rng;
use tracing::debug;

use crate::accounting::{self, conserved_quantities, total_energy};
use crate::config::KineticsConfig;
use crate::context::SystemContext;
use crate::elements;
use crate::error::LawError;
use crate::kernels::{self, CMB_TEMPERATURE};
use crate::system::LawSystem;

/// Arrhenius pair reactions between chemical entities.
#[derive(Debug, Clone)]
pub struct ReactionKinetics {
    config: KineticsConfig,
}

impl ReactionKinetics {
    /// A system with the given rate parameters.
    pub const fn new(config: KineticsConfig) -> Self {
        Self { config }
    }

    fn is_reactant(&self, entity: &Entity) -> bool {
        matches!(entity.scale, Scale::Atomic | Scale::Molecular)
            && entity.is_tracked()
            && entity.temperature().is_some()
            && entity.aggregation.is_none()
            && entity
                .chemical
                .as_ref()
                .is_some_and(|c| c.atom_count() > 0 && c.atom_count() < self.config.max_product_atoms)
    }

    /// The first neighbour of `id`, nearest first, that can react with it.
    fn partner(&self, ctx: &SystemContext<'_>, id: EntityId, spent: &BTreeSet<EntityId>) -> Option<EntityId> {
        let entity = ctx.store.get(id)?;
        let position = entity.position()?;
        let atoms = entity.chemical.as_ref().map_or(0, Chemical::atom_count);

        let mut candidates: Vec<(f64, EntityId)> = ctx
            .spatial
            .query_radius(position, self.config.reaction_radius)
            .into_iter()
            .filter(|other| *other != id && !spent.contains(other))
            .filter_map(|other| ctx.store.get(other))
            .filter(|other| self.is_reactant(other))
            .filter(|other| {
                other
                    .chemical
                    .as_ref()
                    .is_some_and(|c| atoms.saturating_add(c.atom_count()) <= self.config.max_product_atoms)
            })
            .filter_map(|other| other.position().map(|p| (p.distance_squared(position), other.id)))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.first().map(|(_, other)| *other)
    }

    /// Build the product of `a + b`.
    fn combine(&self, a: &Entity, b: &Entity) -> Entity {
        let (ma, mb) = (a.mass().unwrap_or(0.0), b.mass().unwrap_or(0.0));
        let mass = ma + mb;
        let momentum = a.momentum() + b.momentum();
        let velocity = momentum / mass;
        let position = (a.position().unwrap_or_default() * ma + b.position().unwrap_or_default() * mb) / mass;

        let mut chemical = Chemical::default();
        let mut bond_heat = 0.0;
        if let (Some(ca), Some(cb)) = (a.chemical.as_ref(), b.chemical.as_ref()) {
            for (symbol, count) in ca.elements.iter().chain(&cb.elements) {
                let slot = chemical.elements.entry(symbol.clone()).or_insert(0);
                *slot = slot.saturating_add(*count);
            }
            chemical.bonds = ca.bonds.iter().chain(&cb.bonds).cloned().collect();
            if let (Some(x), Some(y)) = (elements::primary_element(ca), elements::primary_element(cb)) {
                chemical.bonds.push(elements::bond_label(x, y));
                bond_heat = elements::bond_energy(x, y) * self.config.heat_per_bond;
            }
        }

        let mut product = Entity::new(Scale::Molecular)
            .with_detail(SimulationDetail::Explicit)
            .with_identity(Identity {
                parent_id: Some(a.id),
                lineage_id: None,
                generation: a.identity.generation.max(b.identity.generation).saturating_add(1),
            })
            .with_physical(
                Physical::massive(mass, position)
                    .with_velocity(velocity)
                    .with_charge(a.charge() + b.charge())
                    .with_temperature(CMB_TEMPERATURE),
            )
            .with_chemical(chemical);

        let thermal = total_energy(a) + total_energy(b) + bond_heat - product.kinetic_energy();
        let temperature = accounting::temperature_for(&product, thermal)
            .unwrap_or(CMB_TEMPERATURE)
            .max(CMB_TEMPERATURE);
        let state = elements::phase_points(product.chemical.as_ref()).phase_at(temperature);
        if let Some(p) = product.physical.as_mut() {
            p.temperature = Some(temperature);
            p.state = Some(state);
        }
        product
    }

    /// Validate and, policy permitting, replace `a` and `b` with their product.
    fn react(&self, ctx: &mut SystemContext<'_>, a: EntityId, b: EntityId) -> Result<bool, LawError> {
        let (Some(ea), Some(eb)) = (ctx.store.get(a), ctx.store.get(b)) else {
            return Ok(false);
        };
        let product = self.combine(ea, eb);
        let product_id = product.id;
        let reactant_totals = conserved_quantities(ea) + conserved_quantities(eb);
        let product_totals = conserved_quantities(&product);
        let formula = product.chemical.as_ref().map(Chemical::formula).unwrap_or_default();

        let context = format!("reaction forming {formula} at tick {}", ctx.tick);
        let balanced =
            ctx.ledger
                .validate_reaction(&[a, b], &[product_id], reactant_totals, product_totals, &context);
        if !ctx.policy.permits(balanced) {
            ctx.emit(LawEvent::TransformationRejected {
                operation: AuditOperation::Reaction,
                context,
            });
            return Ok(false);
        }

        ctx.despawn(a);
        ctx.despawn(b);
        ctx.spawn(product)?;
        debug!(product = %product_id, formula = %formula, balanced, "Reaction committed");
        ctx.emit(LawEvent::ReactionCommitted {
            reactants: vec![a, b],
            product: product_id,
            balanced,
        });
        Ok(true)
    }
}

impl LawSystem for ReactionKinetics {
    fn name(&self) -> &'static str {
        "reaction_kinetics"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        let reactants = ctx.store.ids_where(|e| self.is_reactant(e));
        let mut spent = BTreeSet::new();
        let mut committed = 0_usize;

        for id in reactants {
            if committed >= self.config.max_reactions_per_tick {
                break;
            }
            if spent.contains(&id) {
                continue;
            }
            let Some(partner) = self.partner(ctx, id, &spent) else {
                continue;
            };
            let mean_temperature = [id, partner]
                .iter()
                .filter_map(|x| ctx.store.get(*x).and_then(Entity::temperature))
                .sum::<f64>()
                / 2.0;
            let rate = kernels::arrhenius_rate(
                self.config.pre_exponential,
                self.config.activation_energy,
                mean_temperature,
            );
            if !ctx.rng.random_bool(kernels::event_probability(rate, delta)) {
                continue;
            }
            spent.insert(id);
            spent.insert(partner);
            if self.react(ctx, id, partner)? {
                committed = committed.saturating_add(1);
            }
        }
        Ok(())
    }
}
