//! Powertrain activity inference.
//!
//! The motor controller emits the 0x07 status frame continuously while
//! the powertrain is live. This watchdog turns that beacon stream into a
//! debounced two-state machine: the first beacon while the countdown is
//! idle means Off -> On, every further beacon rewinds the countdown, and
//! a full timeout without one means On -> Off. Each transition invokes
//! its callback exactly once.
//!
//! The countdown is a one-shot slot in the shared registry: expiry
//! disarms it, which both delivers the stopped callback once and leaves
//! the timer idle so the next beacon starts a fresh cycle.

use crate::timer::{Repeat, SharedTimers, TimerCallback, TimerError, TimerId};
use std::time::{Duration, Instant};
use tracing::debug;

pub struct ActivityWatchdog {
    timers: SharedTimers,
    timer: TimerId,
    on_started: Box<dyn Fn() + Send>,
}

impl ActivityWatchdog {
    /// Register the activity countdown. `on_started` runs on the
    /// ingestion context when the first beacon arrives; `on_stopped`
    /// runs on the scheduler context when the window elapses. Both must
    /// be short and non-blocking.
    pub fn new(
        timers: &SharedTimers,
        timeout: Duration,
        on_started: Box<dyn Fn() + Send>,
        on_stopped: TimerCallback,
    ) -> Result<Self, TimerError> {
        let timer = timers.register(timeout, Repeat::OneShot, on_stopped)?;
        Ok(Self {
            timers: timers.clone(),
            timer,
            on_started,
        })
    }

    /// Feed one beacon arrival into the state machine.
    pub fn observe_beacon(&self) {
        self.observe_beacon_at(Instant::now());
    }

    pub fn observe_beacon_at(&self, now: Instant) {
        // Arm-or-rewind is one critical section so an expiry sneaking in
        // between the check and the reset cannot swallow a transition
        if self.timers.start_or_reset(self.timer, now) {
            debug!("powertrain activity started");
            (self.on_started)();
        }
    }

    /// Whether the powertrain is currently considered active.
    pub fn is_active(&self) -> bool {
        self.timers.is_running(self.timer)
    }
}
