//! # Instrument Cluster Bus Core
//!
//! The decode and state-inference core of a vehicle instrument cluster:
//! ingests the powertrain CAN bus (motor controller + EMUS-style BMS),
//! maintains a shared lock-free telemetry record, and derives a debounced
//! powertrain active/inactive state that drives the display mode and the
//! analog gauge standby line.
//!
//! ## Features
//!
//! - **Frame ingestion**: bounded-wait receive loop over a pluggable
//!   [`source::FrameSource`], transport faults logged and survived
//! - **Decode dispatch**: exact-match motor-controller IDs plus the
//!   masked BMS broadcast family, protocol-revision aware
//! - **Lock-free telemetry**: single-writer/many-reader record built
//!   from per-field atomics, snapshot API for consumers
//! - **Activity watchdog**: beacon-driven two-state machine with
//!   exactly-once transition callbacks
//! - **Timer scheduler**: fixed-size timer registry polled by one
//!   low-priority loop
//!
//! ## Quick Start
//!
//! ```rust
//! use dashbus::decode::{BmsProtocol, Decoder};
//! use dashbus::frame::{Frame, FrameId};
//! use dashbus::telemetry::TelemetryRecord;
//!
//! let record = TelemetryRecord::new();
//! let decoder = Decoder::new(BmsProtocol::G1);
//!
//! // Motor/inverter status: 20 C / 20 C, 10 rpm, 10.0 V, 5.0 A
//! let frame = Frame::new(FrameId::Standard(0x06), &[60, 60, 10, 0, 100, 0, 50, 0]);
//! decoder.dispatch(&frame, &record);
//!
//! assert_eq!(record.snapshot().motor_temp_c, 20);
//! assert_eq!(record.snapshot().rpm, 10);
//! ```
//!
//! ## Architecture
//!
//! - [`frame`] - bus frame type and protocol identifiers
//! - [`source`] - frame source trait and the bounded ISR-to-task channel
//! - [`decode`] - decode dispatcher writing into the record
//! - [`telemetry`] - the shared telemetry record and snapshots
//! - [`timer`] - timer registry and the scheduler loop
//! - [`watchdog`] - powertrain activity inference
//! - [`ingest`] - the real-time ingestion task
//! - [`mode`] - operational mode sink for display and gauges
//! - [`monitor`] - diagnostic frame echo
//! - [`lamps`] - indicator-lamp evaluation
//! - [`config`] - deployment configuration and validation

#![deny(warnings)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod decode;
pub mod frame;
pub mod ingest;
pub mod lamps;
pub mod mode;
pub mod monitor;
pub mod source;
pub mod telemetry;
pub mod timer;
pub mod watchdog;

// Re-export the types most wirings need
pub use config::ClusterConfig;
pub use decode::{BmsProtocol, Decoder};
pub use frame::{Frame, FrameId};
pub use ingest::IngestionTask;
pub use mode::{ClusterMode, ModeState};
pub use telemetry::{TelemetryRecord, TelemetrySnapshot};
pub use timer::{run_scheduler, SharedTimers};
pub use watchdog::ActivityWatchdog;
