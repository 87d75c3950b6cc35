//! Deployment configuration for the cluster core.
//!
//! Everything here is tunable per vehicle; the defaults match the
//! reference powertrain. Validation runs once at startup so a broken
//! configuration fails fast instead of surfacing as a silent runtime
//! misbehavior (a zero timeout would turn the watchdog into a strobe).

use crate::decode::BmsProtocol;
use crate::source::BusConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BITRATE: u32 = 500_000;
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_ACTIVITY_TIMEOUT_MS: u64 = 3200;
pub const DEFAULT_SCHEDULER_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// CAN bit rate handed to the transceiver driver.
    pub bitrate: u32,
    /// Bounded wait of one ingestion receive attempt.
    pub receive_timeout_ms: u64,
    /// Trailing window of the powertrain activity watchdog.
    pub activity_timeout_ms: u64,
    /// Timer scheduler poll cadence.
    pub scheduler_interval_ms: u64,
    /// BMS protocol revision on this vehicle.
    pub bms_protocol: BmsProtocol,
    /// Start with the diagnostic frame monitor on.
    pub monitor_enabled: bool,
    /// Restrict the monitor to a single raw identifier.
    pub monitor_filter: Option<u32>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            bitrate: DEFAULT_BITRATE,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            activity_timeout_ms: DEFAULT_ACTIVITY_TIMEOUT_MS,
            scheduler_interval_ms: DEFAULT_SCHEDULER_INTERVAL_MS,
            bms_protocol: BmsProtocol::G1,
            monitor_enabled: false,
            monitor_filter: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("activity timeout must be non-zero")]
    ZeroActivityTimeout,
    #[error("scheduler interval must be non-zero")]
    ZeroSchedulerInterval,
    #[error("receive timeout must be non-zero")]
    ZeroReceiveTimeout,
    #[error("scheduler interval {interval_ms} ms too coarse for activity timeout {timeout_ms} ms")]
    SchedulerIntervalTooCoarse { interval_ms: u64, timeout_ms: u64 },
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.activity_timeout_ms == 0 {
            return Err(ConfigError::ZeroActivityTimeout);
        }
        if self.scheduler_interval_ms == 0 {
            return Err(ConfigError::ZeroSchedulerInterval);
        }
        if self.receive_timeout_ms == 0 {
            return Err(ConfigError::ZeroReceiveTimeout);
        }
        // The countdown check must run at a small fraction of the
        // timeout or the Off transition lags a full poll period
        if self.scheduler_interval_ms > self.activity_timeout_ms / 4 {
            return Err(ConfigError::SchedulerIntervalTooCoarse {
                interval_ms: self.scheduler_interval_ms,
                timeout_ms: self.activity_timeout_ms,
            });
        }
        Ok(())
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_timeout_ms)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_interval_ms)
    }

    /// Bus parameters for `FrameSource::configure`.
    pub fn bus(&self) -> BusConfig {
        BusConfig {
            bitrate: self.bitrate,
            filters: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ClusterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = ClusterConfig {
            activity_timeout_ms: 0,
            ..ClusterConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroActivityTimeout));

        config.activity_timeout_ms = DEFAULT_ACTIVITY_TIMEOUT_MS;
        config.scheduler_interval_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroSchedulerInterval));

        config.scheduler_interval_ms = DEFAULT_SCHEDULER_INTERVAL_MS;
        config.receive_timeout_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroReceiveTimeout));
    }

    #[test]
    fn test_coarse_scheduler_interval_rejected() {
        let config = ClusterConfig {
            activity_timeout_ms: 100,
            scheduler_interval_ms: 30,
            ..ClusterConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::SchedulerIntervalTooCoarse {
                interval_ms: 30,
                timeout_ms: 100,
            })
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ClusterConfig =
            serde_json::from_str(r#"{"activity_timeout_ms": 1600, "bms_protocol": "legacy"}"#)
                .unwrap();
        assert_eq!(config.activity_timeout_ms, 1600);
        assert_eq!(config.bms_protocol, BmsProtocol::Legacy);
        assert_eq!(config.bitrate, DEFAULT_BITRATE);
    }
}
