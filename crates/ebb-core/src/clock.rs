//! Simulation clock.
//!
//! The clock counts completed ticks and accumulates simulated seconds. It
//! is advanced exactly once per completed tick, after every law system has
//! run, so systems see the tick number they are running (`tick() + 1`) and
//! the elapsed time before it.

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// The step is negative, NaN or infinite.
    #[error("invalid tick delta {delta}: must be finite and non-negative")]
    InvalidDelta {
        /// The rejected delta.
        delta: f64,
    },
}

/// Completed ticks and simulated time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimulationClock {
    tick: u64,
    elapsed: f64,
}

impl SimulationClock {
    /// A clock at tick 0, time 0.
    pub const fn new() -> Self {
        Self {
            tick: 0,
            elapsed: 0.0,
        }
    }

    /// Check that `delta` is a usable step.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] for negative or non-finite steps.
    pub fn check_delta(delta: f64) -> Result<(), ClockError> {
        if delta.is_finite() && delta >= 0.0 {
            Ok(())
        } else {
            Err(ClockError::InvalidDelta { delta })
        }
    }

    /// The tick number the next call to [`advance`](Self::advance) will
    /// produce, saturating at `u64::MAX`.
    pub const fn next_tick(&self) -> u64 {
        self.tick.saturating_add(1)
    }

    /// Record one completed tick of `delta` seconds. Returns the new tick
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] for a bad step or
    /// [`ClockError::TickOverflow`] when the counter is exhausted. The
    /// clock is unchanged on error.
    pub fn advance(&mut self, delta: f64) -> Result<u64, ClockError> {
        Self::check_delta(delta)?;
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        self.elapsed += delta;
        Ok(self.tick)
    }

    /// Completed ticks.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds across all completed ticks.
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }
}
