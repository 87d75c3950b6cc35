//! Restartable countdown timers and the polling scheduler.
//!
//! Timers live in a fixed-size registry populated at startup; each slot
//! carries a timeout, a repeat mode and a callback. A single low-priority
//! scheduler loop polls the registry at a short fixed interval and fires
//! expired callbacks inline on its own execution context. Callbacks must
//! therefore be short, non-blocking, and must not call back into the
//! registry.

use heapless::Vec;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tracing::trace;

/// Registry capacity. The timer set is fixed at startup; a handful of
/// slots covers every debounce/timeout rule the cluster needs.
pub const MAX_TIMERS: usize = 8;

/// Expiry action, registered once at startup.
pub type TimerCallback = Box<dyn Fn() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    /// Disarm after firing once; a later `start` re-arms.
    OneShot,
    /// Re-arm from the expiry instant and keep running.
    Periodic,
}

/// Handle to a registered timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(usize);

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer timeout must be non-zero")]
    ZeroTimeout,
    #[error("timer registry full ({MAX_TIMERS} slots)")]
    RegistryFull,
}

struct TimerSlot {
    timeout: Duration,
    repeat: Repeat,
    running: bool,
    last_reset: Instant,
    fire_count: u32,
    callback: TimerCallback,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimerStats {
    pub registered: u8,
    pub total_fires: u32,
}

/// Fixed-size set of timer slots. Mutated by the owning components
/// (`start`/`stop`/`reset`) and by the scheduler (`poll`).
#[derive(Default)]
pub struct TimerRegistry {
    slots: Vec<TimerSlot, MAX_TIMERS>,
    stats: TimerStats,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            stats: TimerStats::default(),
        }
    }

    /// Add a timer slot. Fails fast on a zero timeout so a
    /// misconfiguration surfaces at startup, not at runtime.
    pub fn register(
        &mut self,
        timeout: Duration,
        repeat: Repeat,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        if timeout.is_zero() {
            return Err(TimerError::ZeroTimeout);
        }
        let id = TimerId(self.slots.len());
        self.slots
            .push(TimerSlot {
                timeout,
                repeat,
                running: false,
                last_reset: Instant::now(),
                fire_count: 0,
                callback,
            })
            .map_err(|_| TimerError::RegistryFull)?;
        self.stats.registered = self.slots.len() as u8;
        Ok(id)
    }

    pub fn start(&mut self, id: TimerId, now: Instant) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.running = true;
            slot.last_reset = now;
        }
    }

    pub fn stop(&mut self, id: TimerId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.running = false;
        }
    }

    /// Rewind the countdown without changing the running flag.
    pub fn reset(&mut self, id: TimerId, now: Instant) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.last_reset = now;
        }
    }

    /// Arm an idle timer or rewind a running one, in one step. Returns
    /// true when this call armed an idle timer.
    pub fn start_or_reset(&mut self, id: TimerId, now: Instant) -> bool {
        match self.slots.get_mut(id.0) {
            Some(slot) => {
                let was_idle = !slot.running;
                slot.running = true;
                slot.last_reset = now;
                was_idle
            }
            None => false,
        }
    }

    pub fn is_running(&self, id: TimerId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.running)
    }

    pub fn fire_count(&self, id: TimerId) -> u32 {
        self.slots.get(id.0).map_or(0, |slot| slot.fire_count)
    }

    pub fn stats(&self) -> TimerStats {
        self.stats
    }

    /// Check every running timer against `now`, firing expired callbacks
    /// synchronously. One-shot timers disarm; periodic timers re-arm
    /// from the poll instant.
    pub fn poll(&mut self, now: Instant) {
        for slot in self.slots.iter_mut() {
            if !slot.running {
                continue;
            }
            if now.duration_since(slot.last_reset) >= slot.timeout {
                (slot.callback)();
                slot.fire_count += 1;
                self.stats.total_fires += 1;
                match slot.repeat {
                    Repeat::OneShot => slot.running = false,
                    Repeat::Periodic => slot.last_reset = now,
                }
            }
        }
    }
}

/// Cloneable handle to the process-wide registry, shared between the
/// components that own timers and the scheduler task. Critical sections
/// are a few loads and stores; the lock is never held across an await.
#[derive(Clone, Default)]
pub struct SharedTimers {
    inner: Arc<Mutex<TimerRegistry>>,
}

impl SharedTimers {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimerRegistry::new())),
        }
    }

    fn guard(&self) -> MutexGuard<'_, TimerRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(
        &self,
        timeout: Duration,
        repeat: Repeat,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        self.guard().register(timeout, repeat, callback)
    }

    pub fn start(&self, id: TimerId, now: Instant) {
        self.guard().start(id, now);
    }

    pub fn stop(&self, id: TimerId) {
        self.guard().stop(id);
    }

    pub fn reset(&self, id: TimerId, now: Instant) {
        self.guard().reset(id, now);
    }

    pub fn start_or_reset(&self, id: TimerId, now: Instant) -> bool {
        self.guard().start_or_reset(id, now)
    }

    pub fn is_running(&self, id: TimerId) -> bool {
        self.guard().is_running(id)
    }

    pub fn fire_count(&self, id: TimerId) -> u32 {
        self.guard().fire_count(id)
    }

    pub fn stats(&self) -> TimerStats {
        self.guard().stats()
    }

    pub fn poll(&self, now: Instant) {
        self.guard().poll(now);
    }
}

/// Timer scheduler loop: polls the registry every `poll_interval` for
/// the process lifetime. Runs as its own task.
pub async fn run_scheduler(timers: SharedTimers, poll_interval: Duration) {
    debug_assert!(!poll_interval.is_zero());
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    trace!("timer scheduler running at {:?} cadence", poll_interval);
    loop {
        ticker.tick().await;
        timers.poll(Instant::now());
    }
}
