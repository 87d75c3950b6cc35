//! Operational mode sink shared with the display and gauge drivers.
//!
//! The watchdog callbacks set these flags as side effects; the display
//! task and gauge driver read them on their own cadence. Plain atomics,
//! same eventual-consistency contract as the telemetry record.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClusterMode {
    /// Display dark, gauges parked.
    Off = 0,
    /// Key on, powertrain silent.
    Idle = 1,
    /// Powertrain active, gauges live.
    Ready = 2,
}

impl ClusterMode {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ClusterMode::Off,
            2 => ClusterMode::Ready,
            _ => ClusterMode::Idle,
        }
    }
}

pub struct ModeState {
    mode: AtomicU8,
    gauge_standby: AtomicBool,
}

impl ModeState {
    /// Cluster boots idle with the gauges parked.
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(ClusterMode::Idle as u8),
            gauge_standby: AtomicBool::new(true),
        }
    }

    pub fn mode(&self) -> ClusterMode {
        ClusterMode::from_raw(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: ClusterMode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    pub fn gauge_standby(&self) -> bool {
        self.gauge_standby.load(Ordering::Relaxed)
    }

    pub fn set_gauge_standby(&self, standby: bool) {
        self.gauge_standby.store(standby, Ordering::Relaxed);
    }

    /// Watchdog "activity started" side effects: ready presentation,
    /// gauge auto-update on.
    pub fn powertrain_started(&self) {
        self.set_mode(ClusterMode::Ready);
        self.set_gauge_standby(false);
    }

    /// Watchdog "activity stopped" side effects: idle presentation,
    /// gauges back to rest.
    pub fn powertrain_stopped(&self) {
        self.set_mode(ClusterMode::Idle);
        self.set_gauge_standby(true);
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_state() {
        let mode = ModeState::new();
        assert_eq!(mode.mode(), ClusterMode::Idle);
        assert!(mode.gauge_standby());
    }

    #[test]
    fn test_transition_side_effects() {
        let mode = ModeState::new();
        mode.powertrain_started();
        assert_eq!(mode.mode(), ClusterMode::Ready);
        assert!(!mode.gauge_standby());

        mode.powertrain_stopped();
        assert_eq!(mode.mode(), ClusterMode::Idle);
        assert!(mode.gauge_standby());
    }
}
