//! Diagnostic frame monitor.
//!
//! When enabled, echoes every ingested frame to the log stream,
//! optionally restricted to a single numeric identifier. Dropped and
//! unknown frames are normally invisible (to avoid flooding); this is
//! the switch that makes them visible.

use crate::decode::DecodeOutcome;
use crate::frame::Frame;
use arrayvec::ArrayString;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;

// Filter value meaning "echo every identifier".
const NO_FILTER: u32 = u32::MAX;

pub struct FrameMonitor {
    enabled: AtomicBool,
    filter: AtomicU32,
}

impl FrameMonitor {
    pub fn new(enabled: bool, filter: Option<u32>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            filter: AtomicU32::new(filter.unwrap_or(NO_FILTER)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Restrict the echo to one raw identifier, or `None` for all.
    pub fn set_filter(&self, filter: Option<u32>) {
        self.filter.store(filter.unwrap_or(NO_FILTER), Ordering::Relaxed);
    }

    /// Whether a frame with this raw identifier would be echoed.
    pub fn matches(&self, raw_id: u32) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let filter = self.filter.load(Ordering::Relaxed);
        filter == NO_FILTER || filter == raw_id
    }

    pub fn echo(&self, frame: &Frame, outcome: DecodeOutcome) {
        if !self.matches(frame.id.raw()) {
            return;
        }
        // 8 payload bytes at 3 chars each
        let mut hex = ArrayString::<24>::new();
        for byte in frame.payload() {
            let _ = write!(hex, "{byte:02X} ");
        }
        debug!(
            "canmon id=0x{:X} len={} [{}] {:?}",
            frame.id.raw(),
            frame.len,
            hex.trim_end(),
            outcome
        );
    }
}

impl Default for FrameMonitor {
    fn default() -> Self {
        Self::new(false, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_matches_nothing() {
        let monitor = FrameMonitor::new(false, None);
        assert!(!monitor.matches(0x06));
    }

    #[test]
    fn test_unfiltered_monitor_matches_everything() {
        let monitor = FrameMonitor::new(true, None);
        assert!(monitor.matches(0x06));
        assert!(monitor.matches(0x99B5_0500));
    }

    #[test]
    fn test_single_id_filter() {
        let monitor = FrameMonitor::new(true, Some(0x07));
        assert!(monitor.matches(0x07));
        assert!(!monitor.matches(0x06));

        monitor.set_filter(None);
        assert!(monitor.matches(0x06));
    }
}
