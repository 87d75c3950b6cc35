//! Shared last-known vehicle state.
//!
//! One `TelemetryRecord` exists for the process lifetime. The ingestion
//! task is its single writer (ground speed excepted, which the external
//! speed module owns); the display, gauges and CLI read it concurrently.
//! Every field is an independent atomic cell with `Relaxed` ordering:
//! readers always see the most recent write of each individual field but
//! may observe a torn mixture of old and new fields from one frame. The
//! dashboard tolerates a stale or partial frame for one refresh cycle, so
//! there is no lock on the ingestion path.
//!
//! Fractional quantities are stored in fixed-point raw units (0.1 V,
//! 0.1 A, 0.1 Ah, 0.01 %, 0.1 km/h); [`TelemetrySnapshot`] converts to
//! engineering units for consumers.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI16, AtomicU16, AtomicU32, AtomicU8, Ordering};

// Power-unit status flag bits (0x06 controller family).
pub const PU_FLAG_FORWARD_ACTIVE: u16 = 1 << 3;
pub const PU_FLAG_VEHICLE_RUNNING: u16 = 1 << 9;
pub const PU_FLAG_POWERING_READY: u16 = 1 << 13;

/// BMS charging state as reported in the state broadcast (byte 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingState {
    Disconnected,
    PreHeating,
    PreCharging,
    Charging,
    Balancing,
    Finished,
    Error,
    Unknown,
}

impl ChargingState {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ChargingState::Disconnected,
            1 => ChargingState::PreHeating,
            2 => ChargingState::PreCharging,
            3 => ChargingState::Charging,
            4 => ChargingState::Balancing,
            5 => ChargingState::Finished,
            6 => ChargingState::Error,
            _ => ChargingState::Unknown,
        }
    }
}

/// The continuously-overwritten powertrain/BMS state aggregate.
///
/// Default-initialized to all zeros at startup; fields update
/// independently as frames of each type arrive.
#[derive(Default)]
pub struct TelemetryRecord {
    // Set by the external speed module
    ground_speed_dkmh: AtomicU16,

    // Motor/inverter status (ID 0x06)
    motor_temp_c: AtomicI16,
    inverter_temp_c: AtomicI16,
    rpm: AtomicI16,
    dc_bus_dv: AtomicU16,
    dc_bus_da: AtomicI16,

    // Power-unit flags (ID 0x07)
    power_unit_flags: AtomicU16,

    // BMS state broadcast (sub-address 0x0000)
    bms_input_flags: AtomicU8,
    bms_output_flags: AtomicU8,
    bms_cell_count: AtomicU16,
    bms_charging_state: AtomicU8,
    bms_charging_minutes: AtomicU16,
    bms_last_charging_error: AtomicU8,

    // BMS diagnostics (sub-address 0x0007)
    bms_protection_flags: AtomicU32,
    bms_reduction_flags: AtomicU8,
    bms_battery_status_flags: AtomicU8,

    // BMS module temperatures (sub-address 0x0002)
    module_temp_min_c: AtomicI16,
    module_temp_max_c: AtomicI16,
    module_temp_avg_c: AtomicI16,

    // BMS cell temperatures (sub-address 0x0008)
    cell_temp_min_c: AtomicI16,
    cell_temp_max_c: AtomicI16,
    cell_temp_avg_c: AtomicI16,

    // BMS charge parameters (sub-address 0x0500)
    pack_current_da: AtomicI16,
    pack_charge_dah: AtomicU16,
    soc_cpct: AtomicU16,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer hook for the external pulse-counter speed module,
    /// in 0.1 km/h units.
    pub fn set_ground_speed_dkmh(&self, dkmh: u16) {
        self.ground_speed_dkmh.store(dkmh, Ordering::Relaxed);
    }

    /// Motor/inverter status fields, written together per 0x06 frame.
    /// Stores are sequential, not mutually atomic.
    pub fn set_motor_status(
        &self,
        motor_temp_c: i16,
        inverter_temp_c: i16,
        rpm: i16,
        dc_bus_dv: u16,
        dc_bus_da: i16,
    ) {
        self.motor_temp_c.store(motor_temp_c, Ordering::Relaxed);
        self.inverter_temp_c.store(inverter_temp_c, Ordering::Relaxed);
        self.rpm.store(rpm, Ordering::Relaxed);
        self.dc_bus_dv.store(dc_bus_dv, Ordering::Relaxed);
        self.dc_bus_da.store(dc_bus_da, Ordering::Relaxed);
    }

    pub fn set_power_unit_flags(&self, flags: u16) {
        self.power_unit_flags.store(flags, Ordering::Relaxed);
    }

    pub fn set_bms_state(
        &self,
        input_flags: u8,
        output_flags: u8,
        cell_count: u16,
        charging_state: u8,
        charging_minutes: u16,
        last_charging_error: u8,
    ) {
        self.bms_input_flags.store(input_flags, Ordering::Relaxed);
        self.bms_output_flags.store(output_flags, Ordering::Relaxed);
        self.bms_cell_count.store(cell_count, Ordering::Relaxed);
        self.bms_charging_state
            .store(charging_state, Ordering::Relaxed);
        self.bms_charging_minutes
            .store(charging_minutes, Ordering::Relaxed);
        self.bms_last_charging_error
            .store(last_charging_error, Ordering::Relaxed);
    }

    pub fn set_bms_diagnostics(&self, protection: u32, reduction: u8, battery_status: u8) {
        self.bms_protection_flags
            .store(protection, Ordering::Relaxed);
        self.bms_reduction_flags.store(reduction, Ordering::Relaxed);
        self.bms_battery_status_flags
            .store(battery_status, Ordering::Relaxed);
    }

    pub fn set_module_temps(&self, min_c: i16, max_c: i16, avg_c: i16) {
        self.module_temp_min_c.store(min_c, Ordering::Relaxed);
        self.module_temp_max_c.store(max_c, Ordering::Relaxed);
        self.module_temp_avg_c.store(avg_c, Ordering::Relaxed);
    }

    pub fn set_cell_temps(&self, min_c: i16, max_c: i16, avg_c: i16) {
        self.cell_temp_min_c.store(min_c, Ordering::Relaxed);
        self.cell_temp_max_c.store(max_c, Ordering::Relaxed);
        self.cell_temp_avg_c.store(avg_c, Ordering::Relaxed);
    }

    /// Charge parameters: current in 0.1 A, charge in 0.1 Ah,
    /// state of charge in 0.01 %.
    pub fn set_charge_params(&self, current_da: i16, charge_dah: u16, soc_cpct: u16) {
        self.pack_current_da.store(current_da, Ordering::Relaxed);
        self.pack_charge_dah.store(charge_dah, Ordering::Relaxed);
        self.soc_cpct.store(soc_cpct, Ordering::Relaxed);
    }

    pub fn motor_temp_c(&self) -> i16 {
        self.motor_temp_c.load(Ordering::Relaxed)
    }

    pub fn inverter_temp_c(&self) -> i16 {
        self.inverter_temp_c.load(Ordering::Relaxed)
    }

    pub fn rpm(&self) -> i16 {
        self.rpm.load(Ordering::Relaxed)
    }

    pub fn dc_bus_dv(&self) -> u16 {
        self.dc_bus_dv.load(Ordering::Relaxed)
    }

    pub fn dc_bus_da(&self) -> i16 {
        self.dc_bus_da.load(Ordering::Relaxed)
    }

    pub fn power_unit_flags(&self) -> u16 {
        self.power_unit_flags.load(Ordering::Relaxed)
    }

    pub fn charging_state(&self) -> ChargingState {
        ChargingState::from_raw(self.bms_charging_state.load(Ordering::Relaxed))
    }

    pub fn soc_cpct(&self) -> u16 {
        self.soc_cpct.load(Ordering::Relaxed)
    }

    /// Field-by-field copy for display/gauge/CLI consumers. Not a
    /// transaction: concurrent writes may land between field reads.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            ground_speed_kmh: f32::from(self.ground_speed_dkmh.load(Ordering::Relaxed)) / 10.0,
            motor_temp_c: self.motor_temp_c.load(Ordering::Relaxed),
            inverter_temp_c: self.inverter_temp_c.load(Ordering::Relaxed),
            rpm: self.rpm.load(Ordering::Relaxed),
            dc_bus_voltage_v: f32::from(self.dc_bus_dv.load(Ordering::Relaxed)) / 10.0,
            dc_bus_current_a: f32::from(self.dc_bus_da.load(Ordering::Relaxed)) / 10.0,
            power_unit_flags: self.power_unit_flags.load(Ordering::Relaxed),
            bms_input_flags: self.bms_input_flags.load(Ordering::Relaxed),
            bms_output_flags: self.bms_output_flags.load(Ordering::Relaxed),
            bms_cell_count: self.bms_cell_count.load(Ordering::Relaxed),
            charging_state: self.charging_state(),
            charging_minutes: self.bms_charging_minutes.load(Ordering::Relaxed),
            last_charging_error: self.bms_last_charging_error.load(Ordering::Relaxed),
            protection_flags: self.bms_protection_flags.load(Ordering::Relaxed),
            reduction_flags: self.bms_reduction_flags.load(Ordering::Relaxed),
            battery_status_flags: self.bms_battery_status_flags.load(Ordering::Relaxed),
            module_temp_min_c: self.module_temp_min_c.load(Ordering::Relaxed),
            module_temp_max_c: self.module_temp_max_c.load(Ordering::Relaxed),
            module_temp_avg_c: self.module_temp_avg_c.load(Ordering::Relaxed),
            cell_temp_min_c: self.cell_temp_min_c.load(Ordering::Relaxed),
            cell_temp_max_c: self.cell_temp_max_c.load(Ordering::Relaxed),
            cell_temp_avg_c: self.cell_temp_avg_c.load(Ordering::Relaxed),
            pack_current_a: f32::from(self.pack_current_da.load(Ordering::Relaxed)) / 10.0,
            pack_charge_ah: f32::from(self.pack_charge_dah.load(Ordering::Relaxed)) / 10.0,
            soc_percent: f32::from(self.soc_cpct.load(Ordering::Relaxed)) / 100.0,
        }
    }
}

/// Plain copy of the record in engineering units, for serialization and
/// presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub ground_speed_kmh: f32,
    pub motor_temp_c: i16,
    pub inverter_temp_c: i16,
    pub rpm: i16,
    pub dc_bus_voltage_v: f32,
    pub dc_bus_current_a: f32,
    pub power_unit_flags: u16,
    pub bms_input_flags: u8,
    pub bms_output_flags: u8,
    pub bms_cell_count: u16,
    pub charging_state: ChargingState,
    pub charging_minutes: u16,
    pub last_charging_error: u8,
    pub protection_flags: u32,
    pub reduction_flags: u8,
    pub battery_status_flags: u8,
    pub module_temp_min_c: i16,
    pub module_temp_max_c: i16,
    pub module_temp_avg_c: i16,
    pub cell_temp_min_c: i16,
    pub cell_temp_max_c: i16,
    pub cell_temp_avg_c: i16,
    pub pack_current_a: f32,
    pub pack_charge_ah: f32,
    pub soc_percent: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_starts_zeroed() {
        let record = TelemetryRecord::new();
        let snapshot = record.snapshot();
        assert_eq!(snapshot.rpm, 0);
        assert_eq!(snapshot.motor_temp_c, 0);
        assert_eq!(snapshot.dc_bus_voltage_v, 0.0);
        assert_eq!(snapshot.charging_state, ChargingState::Disconnected);
        assert_eq!(snapshot.soc_percent, 0.0);
    }

    #[test]
    fn test_fixed_point_conversions() {
        let record = TelemetryRecord::new();
        record.set_motor_status(20, 21, -500, 105, -36);
        record.set_charge_params(-123, 4821, 7350);
        record.set_ground_speed_dkmh(425);

        let snapshot = record.snapshot();
        assert_eq!(snapshot.rpm, -500);
        assert!((snapshot.dc_bus_voltage_v - 10.5).abs() < f32::EPSILON);
        assert!((snapshot.dc_bus_current_a - (-3.6)).abs() < f32::EPSILON);
        assert!((snapshot.pack_current_a - (-12.3)).abs() < f32::EPSILON);
        assert!((snapshot.pack_charge_ah - 482.1).abs() < 0.001);
        assert!((snapshot.soc_percent - 73.5).abs() < 0.001);
        assert!((snapshot.ground_speed_kmh - 42.5).abs() < 0.001);
    }

    #[test]
    fn test_charging_state_mapping() {
        assert_eq!(ChargingState::from_raw(0), ChargingState::Disconnected);
        assert_eq!(ChargingState::from_raw(3), ChargingState::Charging);
        assert_eq!(ChargingState::from_raw(6), ChargingState::Error);
        assert_eq!(ChargingState::from_raw(42), ChargingState::Unknown);
    }

    #[test]
    fn test_fields_update_independently() {
        let record = TelemetryRecord::new();
        record.set_power_unit_flags(PU_FLAG_VEHICLE_RUNNING | PU_FLAG_FORWARD_ACTIVE);
        // Motor status untouched by the flags write
        assert_eq!(record.rpm(), 0);
        assert_eq!(
            record.power_unit_flags(),
            PU_FLAG_VEHICLE_RUNNING | PU_FLAG_FORWARD_ACTIVE
        );

        record.set_motor_status(35, 30, 1200, 960, 150);
        assert_eq!(record.rpm(), 1200);
        assert_eq!(
            record.power_unit_flags(),
            PU_FLAG_VEHICLE_RUNNING | PU_FLAG_FORWARD_ACTIVE
        );
    }
}
