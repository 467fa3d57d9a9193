//! Run control shared between the run loop and whoever drives it.
//!
//! [`RunControl`] is wrapped in an [`Arc`](std::sync::Arc) and shared
//! between the task running [`run_simulation`](crate::runner::run_simulation)
//! and anything that wants to steer it: a Ctrl-C handler, a test, an
//! embedding application. Flags are atomics so the loop reads them without
//! locking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};

use crate::config::RunConfig;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEndReason {
    /// Reached `max_ticks`.
    MaxTicksReached,
    /// Reached `max_real_time_seconds`.
    MaxRealTimeReached,
    /// [`RunControl::request_stop`] was called.
    Stopped,
}

/// Pause, stop, pacing and bounds for one run.
#[derive(Debug)]
pub struct RunControl {
    paused: AtomicBool,
    resume_notify: Notify,
    stop_requested: AtomicBool,
    /// Real-time pause between ticks (ms).
    tick_interval_ms: AtomicU64,
    started_at: DateTime<Utc>,
    /// 0 = unlimited.
    max_ticks: u64,
    /// 0 = unlimited.
    max_real_time_seconds: u64,
    end_reason: Mutex<Option<RunEndReason>>,
}

impl RunControl {
    /// Control state for a run bounded by `config`. The wall clock starts
    /// now.
    pub fn new(config: &RunConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(config.tick_interval_ms),
            started_at: Utc::now(),
            max_ticks: config.max_ticks,
            max_real_time_seconds: config.max_real_time_seconds,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether the run is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause before the next tick.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume and wake the loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until not paused. Returns immediately when running.
    pub async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Ask the loop to stop before its next tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record why the run ended.
    pub async fn set_end_reason(&self, reason: RunEndReason) {
        *self.end_reason.lock().await = Some(reason);
    }

    /// Why the run ended, if it has.
    pub async fn end_reason(&self) -> Option<RunEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Pacing
    // -----------------------------------------------------------------------

    /// Real-time milliseconds between ticks.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the pacing. Returns the previous interval.
    pub fn set_tick_interval_ms(&self, ms: u64) -> u64 {
        self.tick_interval_ms.swap(ms, Ordering::AcqRel)
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    /// True when `max_ticks > 0` and `completed_ticks >= max_ticks`.
    pub const fn tick_limit_reached(&self, completed_ticks: u64) -> bool {
        self.max_ticks > 0 && completed_ticks >= self.max_ticks
    }

    /// True when `max_real_time_seconds > 0` and that much wall-clock time
    /// has passed since [`new`](Self::new).
    pub fn time_limit_reached(&self) -> bool {
        self.max_real_time_seconds > 0 && self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// Wall-clock start of the run.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole wall-clock seconds since the run started.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at).num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Configured tick bound (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Configured wall-clock bound in seconds (0 = unlimited).
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn unbounded() -> RunConfig {
        RunConfig {
            max_ticks: 0,
            max_real_time_seconds: 0,
            ..RunConfig::default()
        }
    }

    #[test]
    fn starts_running() {
        let control = RunControl::new(&unbounded());
        assert!(!control.is_paused());
        assert!(!control.is_stop_requested());
    }

    #[test]
    fn pause_resume_and_stop() {
        let control = RunControl::new(&unbounded());
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
        control.request_stop();
        assert!(control.is_stop_requested());
    }

    #[test]
    fn interval_swap_returns_previous() {
        let control = RunControl::new(&RunConfig {
            tick_interval_ms: 250,
            ..unbounded()
        });
        assert_eq!(control.set_tick_interval_ms(0), 250);
        assert_eq!(control.tick_interval_ms(), 0);
    }

    #[test]
    fn zero_limits_mean_unlimited() {
        let control = RunControl::new(&unbounded());
        assert!(!control.tick_limit_reached(u64::MAX));
        assert!(!control.time_limit_reached());
    }

    #[test]
    fn tick_limit_is_inclusive() {
        let control = RunControl::new(&RunConfig {
            max_ticks: 10,
            ..unbounded()
        });
        assert!(!control.tick_limit_reached(9));
        assert!(control.tick_limit_reached(10));
    }

    #[tokio::test]
    async fn resume_wakes_a_paused_waiter() {
        let control = Arc::new(RunControl::new(&unbounded()));
        control.pause();
        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.wait_if_paused().await })
        };
        tokio::task::yield_now().await;
        control.resume();
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn end_reason_round_trips() {
        let control = RunControl::new(&unbounded());
        assert_eq!(control.end_reason().await, None);
        control.set_end_reason(RunEndReason::Stopped).await;
        assert_eq!(control.end_reason().await, Some(RunEndReason::Stopped));
    }
}
