//! Periodic cross-check of the ledger against the store.
//!
//! Every `interval` seconds the totals of all tracked entities are derived
//! afresh and compared with the ledger's running totals. Anything outside
//! tolerance is recorded as a violation; nothing is corrected.

use tracing::{debug, warn};

use crate::accounting::tracked_totals;
use crate::config::ValidationConfig;
use crate::context::SystemContext;
use crate::error::LawError;
use crate::system::{Interval, LawSystem};

/// Surfaces drift between bookkeeping and state.
#[derive(Debug, Clone)]
pub struct ConservationValidation {
    interval: Interval,
}

impl ConservationValidation {
    /// A validator running every `config.interval` seconds.
    pub const fn new(config: &ValidationConfig) -> Self {
        Self {
            interval: Interval::new(config.interval),
        }
    }
}

impl LawSystem for ConservationValidation {
    fn name(&self) -> &'static str {
        "conservation_validation"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        if !self.interval.advance(delta) {
            return Ok(());
        }
        let derived = tracked_totals(ctx.store.iter());
        let context = format!("periodic validation at tick {}", ctx.tick);
        if ctx.ledger.cross_check(derived, &context) {
            debug!(tick = ctx.tick, mass = derived.mass, energy = derived.energy, "Ledger consistent");
        } else {
            warn!(tick = ctx.tick, "Ledger drifted from store");
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.interval.reset();
    }
}
