//! The trait every law system implements.

use crate::context::SystemContext;
use crate::error::LawError;

/// One law of the simulation, advanced once per tick.
///
/// Systems run in a fixed order on a single thread. A system that returns
/// `Err` is logged and counted by the orchestrator; later systems in the
/// same tick still run, and the failing system is called again next tick.
pub trait LawSystem: Send {
    /// Stable name used in logs, events and statistics.
    fn name(&self) -> &'static str;

    /// Advance the law by `delta` simulated seconds.
    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError>;

    /// Drop any state cached between ticks. Called on teardown.
    fn reset(&mut self) {}
}

/// Fixed-interval trigger for systems that run less often than every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    period: f64,
    accumulated: f64,
}

impl Interval {
    /// A trigger that fires every `period` seconds.
    pub const fn new(period: f64) -> Self {
        Self {
            period,
            accumulated: 0.0,
        }
    }

    /// Accumulate `delta`; true when a full period has passed. At most one
    /// firing per call, with the overshoot carried forward.
    pub fn advance(&mut self, delta: f64) -> bool {
        self.accumulated += delta;
        if self.accumulated >= self.period {
            self.accumulated = (self.accumulated - self.period).min(self.period);
            true
        } else {
            false
        }
    }

    /// Forget accumulated time.
    pub const fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}
