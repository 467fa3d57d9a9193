//! Meme transmission between neighbouring carriers.
//!
//! Updates are synchronous: every transfer is computed from the strengths
//! at the start of the tick, and a receiver keeps the largest offer it got
//! for each meme. A carrier within `transmission_radius` of a stronger one
//! moves toward it by `rate · gap · Δt`, never past the source. Afterwards
//! every meme decays by `exp(−decay · Δt)` and memes below
//! `forget_threshold` are dropped.

use std::collections::BTreeMap;

use ebb_types::EntityId;
use tracing::debug;

use crate::config::CulturalConfig;
use crate::context::SystemContext;
use crate::error::LawError;
use crate::system::LawSystem;

/// Horizontal spread and decay of memes.
#[derive(Debug, Clone)]
pub struct CulturalTransmission {
    config: CulturalConfig,
}

impl CulturalTransmission {
    /// A system with the given transmission parameters.
    pub const fn new(config: CulturalConfig) -> Self {
        Self { config }
    }
}

impl LawSystem for CulturalTransmission {
    fn name(&self) -> &'static str {
        "cultural_transmission"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        if delta <= 0.0 {
            return Ok(());
        }
        let carriers = ctx.store.ids_where(|e| e.cultural.is_some() && e.position().is_some());

        let mut offers: BTreeMap<(EntityId, String), f64> = BTreeMap::new();
        for source_id in &carriers {
            let Some(source) = ctx.store.get(*source_id) else {
                continue;
            };
            let (Some(center), Some(culture)) = (source.position(), source.cultural.as_ref()) else {
                continue;
            };
            for target_id in ctx.spatial.query_radius(center, self.config.transmission_radius) {
                if target_id == *source_id {
                    continue;
                }
                let Some(target) = ctx.store.get(target_id).and_then(|e| e.cultural.as_ref()) else {
                    continue;
                };
                for (meme, strength) in &culture.memes {
                    let current = target.memes.get(meme).copied().unwrap_or(0.0);
                    if *strength <= current {
                        continue;
                    }
                    let offered = (self.config.transmission_rate * (strength - current))
                        .mul_add(delta, current)
                        .min(*strength);
                    let best = offers.entry((target_id, meme.clone())).or_insert(current);
                    *best = best.max(offered);
                }
            }
        }

        for ((target, meme), strength) in offers {
            if let Some(culture) = ctx.store.get_mut(target).and_then(|e| e.cultural.as_mut()) {
                culture.memes.insert(meme, strength);
            }
        }

        let retention = (-self.config.decay_rate * delta).exp();
        let floor = self.config.forget_threshold;
        let mut forgotten = 0_usize;
        for id in carriers {
            let Some(culture) = ctx.store.get_mut(id).and_then(|e| e.cultural.as_mut()) else {
                continue;
            };
            let before = culture.memes.len();
            culture.memes.retain(|_, strength| {
                *strength = (*strength * retention).clamp(0.0, 1.0);
                *strength >= floor
            });
            forgotten = forgotten.saturating_add(before.saturating_sub(culture.memes.len()));
        }
        if forgotten > 0 {
            debug!(forgotten, tick = ctx.tick, "Memes forgotten");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ebb_types::{Cultural, DVec3, Entity, Physical, Scale};

    use super::*;
    use crate::context::testing::Harness;

    fn carrier(x: f64, memes: &[(&str, f64)]) -> Entity {
        Entity::new(Scale::Organismal)
            .with_physical(Physical::at(DVec3::new(x, 0.0, 0.0)))
            .with_cultural(Cultural {
                memes: memes.iter().map(|(m, s)| ((*m).to_owned(), *s)).collect(),
            })
    }

    fn strength(h: &Harness, id: EntityId, meme: &str) -> Option<f64> {
        h.store
            .get(id)
            .and_then(|e| e.cultural.as_ref())
            .and_then(|c| c.memes.get(meme).copied())
    }

    fn no_decay() -> CulturalConfig {
        CulturalConfig {
            decay_rate: 0.0,
            ..CulturalConfig::default()
        }
    }

    #[test]
    fn memes_flow_from_strong_to_weak_neighbours() {
        let mut h = Harness::new();
        let elder = h.add(carrier(0.0, &[("fire", 0.9)]));
        let learner = h.add(carrier(1.0, &[]));
        let stranger = h.add(carrier(100.0, &[]));
        let mut system = CulturalTransmission::new(no_decay());
        assert!(h.run(&mut system, 1.0).is_ok());

        // 0.2 · 0.9 · 1 s
        assert!(strength(&h, learner, "fire").is_some_and(|s| (s - 0.18).abs() < 1e-12));
        assert!(strength(&h, elder, "fire").is_some_and(|s| (s - 0.9).abs() < 1e-12));
        assert_eq!(strength(&h, stranger, "fire"), None);
    }

    #[test]
    fn transfer_never_overshoots_the_source() {
        let mut h = Harness::new();
        h.add(carrier(0.0, &[("song", 0.5)]));
        let learner = h.add(carrier(1.0, &[("song", 0.4)]));
        let mut system = CulturalTransmission::new(CulturalConfig {
            transmission_rate: 100.0,
            ..no_decay()
        });
        assert!(h.run(&mut system, 1.0).is_ok());
        assert!(strength(&h, learner, "song").is_some_and(|s| (s - 0.5).abs() < 1e-12));
    }

    #[test]
    fn receiver_keeps_the_strongest_offer() {
        let mut h = Harness::new();
        h.add(carrier(-1.0, &[("tool", 0.3)]));
        h.add(carrier(1.0, &[("tool", 0.8)]));
        let learner = h.add(carrier(0.0, &[]));
        let mut system = CulturalTransmission::new(no_decay());
        assert!(h.run(&mut system, 1.0).is_ok());
        assert!(strength(&h, learner, "tool").is_some_and(|s| (s - 0.16).abs() < 1e-12));
    }

    #[test]
    fn weak_memes_decay_and_are_forgotten() {
        let mut h = Harness::new();
        let id = h.add(carrier(0.0, &[("rumour", 0.011), ("myth", 0.9)]));
        let mut system = CulturalTransmission::new(CulturalConfig {
            decay_rate: 0.5,
            ..CulturalConfig::default()
        });
        assert!(h.run(&mut system, 1.0).is_ok());
        assert_eq!(strength(&h, id, "rumour"), None);
        assert!(strength(&h, id, "myth").is_some_and(|s| s < 0.9 && s > 0.5));
    }
}
