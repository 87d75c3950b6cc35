//! Indicator-lamp evaluation.
//!
//! Pure mapping from a telemetry snapshot plus the powertrain activity
//! state to the four cluster lamps. The GPIO/driver side belongs to the
//! display hardware; this is only the decision logic.

use crate::telemetry::{ChargingState, TelemetrySnapshot};
use serde::{Deserialize, Serialize};

/// Hottest-point threshold for the temperature lamp.
pub const TEMP_LAMP_THRESHOLD_C: i16 = 70;
/// At or below this cell temperature the lamp tracks the cold side
/// instead of the hot side.
pub const FREEZE_OVERRIDE_C: i16 = 2;
/// State-of-charge warning threshold.
pub const SOC_LAMP_THRESHOLD_PCT: f32 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LampState {
    pub battery: bool,
    pub temperature: bool,
    pub soc: bool,
    pub running: bool,
}

/// Evaluate all four lamps against one snapshot.
pub fn evaluate(snapshot: &TelemetrySnapshot, powertrain_active: bool) -> LampState {
    // Temperature lamp watches the hottest point in the drivetrain,
    // unless the cells are near freezing, which takes precedence
    let hottest = snapshot
        .motor_temp_c
        .max(snapshot.inverter_temp_c)
        .max(snapshot.module_temp_max_c)
        .max(snapshot.cell_temp_max_c);
    let gauge_temp = if snapshot.cell_temp_min_c <= FREEZE_OVERRIDE_C {
        snapshot.cell_temp_min_c
    } else {
        hottest
    };

    LampState {
        battery: snapshot.charging_state != ChargingState::Disconnected,
        temperature: gauge_temp > TEMP_LAMP_THRESHOLD_C,
        soc: snapshot.soc_percent < SOC_LAMP_THRESHOLD_PCT,
        running: powertrain_active,
    }
}
