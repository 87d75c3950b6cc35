//! Decode dispatcher: maps a frame identifier to its decode rule and
//! writes the extracted fields into the telemetry record.
//!
//! The motor controller speaks little-endian on standard IDs; the EMUS
//! BMS family speaks big-endian on extended IDs sharing one high-16-bit
//! prefix, with the low 16 bits selecting the message. Bus noise is
//! expected: frames that fail a rule are dropped without an error.

use crate::frame::{
    Frame, FrameId, BMS_SUB_CELL_TEMPS, BMS_SUB_CHARGE_PARAMS, BMS_SUB_DIAGNOSTICS,
    BMS_SUB_MODULE_TEMPS, BMS_SUB_STATE, MOTOR_STATUS_ID, POWER_FLAGS_ID,
};
use crate::telemetry::TelemetryRecord;
use serde::{Deserialize, Serialize};

/// "Sensor value not available" marker. A 0x06 frame containing this
/// byte anywhere in its payload is discarded whole.
pub const SENTINEL_BYTE: u8 = 0xFF;

/// Temperature bias of the motor-controller status message (raw 0 means
/// -40 degrees C). Fixed by the controller, independent of the BMS
/// protocol revision.
const MOTOR_TEMP_BIAS_C: i16 = -40;

/// BMS protocol revision. The two revisions seen in the field disagree
/// on the state-of-charge layout and the temperature bias; the revision
/// is deployment configuration, not a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BmsProtocol {
    /// Canonical revision: temperatures biased by -100, SoC in bytes 4-5
    /// big-endian, 0.01 % units.
    G1,
    /// Historical revision: temperatures biased by -40, SoC as a single
    /// integer-percent byte 4.
    Legacy,
}

impl BmsProtocol {
    fn temp_bias_c(self) -> i16 {
        match self {
            BmsProtocol::G1 => -100,
            BmsProtocol::Legacy => -40,
        }
    }
}

/// Kind of frame a decode applied fields from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    MotorStatus,
    PowerUnitFlags,
    BmsState,
    BmsModuleTemps,
    BmsDiagnostics,
    BmsCellTemps,
    BmsChargeParams,
}

/// What the dispatcher did with a frame. Never an error: noise and
/// unknown identifiers are part of normal bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Fields were written to the record.
    Applied(FrameKind),
    /// Recognized identifier, but the payload failed its validity rule
    /// (sentinel byte or truncated); nothing was written.
    Invalid,
    /// Identifier not part of the protocol; nothing was written.
    Ignored,
}

/// Stateless decode engine, parameterized by the BMS protocol revision.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    protocol: BmsProtocol,
}

impl Decoder {
    pub fn new(protocol: BmsProtocol) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> BmsProtocol {
        self.protocol
    }

    /// Dispatch one frame against the decode table, writing any
    /// extracted fields into `record`.
    pub fn dispatch(&self, frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
        match frame.id {
            FrameId::Standard(MOTOR_STATUS_ID) => decode_motor_status(frame, record),
            FrameId::Standard(POWER_FLAGS_ID) => decode_power_unit_flags(frame, record),
            _ => match frame.id.bms_sub_address() {
                Some(sub) => self.dispatch_bms(sub, frame, record),
                None => DecodeOutcome::Ignored,
            },
        }
    }

    fn dispatch_bms(&self, sub: u16, frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
        match sub {
            BMS_SUB_STATE => decode_bms_state(frame, record),
            BMS_SUB_MODULE_TEMPS => self.decode_module_temps(frame, record),
            BMS_SUB_DIAGNOSTICS => decode_bms_diagnostics(frame, record),
            BMS_SUB_CELL_TEMPS => self.decode_cell_temps(frame, record),
            BMS_SUB_CHARGE_PARAMS => self.decode_charge_params(frame, record),
            _ => DecodeOutcome::Ignored,
        }
    }

    fn decode_module_temps(&self, frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
        let data = frame.payload();
        if data.len() < 3 {
            return DecodeOutcome::Invalid;
        }
        let bias = self.protocol.temp_bias_c();
        record.set_module_temps(
            i16::from(data[0]) + bias,
            i16::from(data[1]) + bias,
            i16::from(data[2]) + bias,
        );
        DecodeOutcome::Applied(FrameKind::BmsModuleTemps)
    }

    fn decode_cell_temps(&self, frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
        let data = frame.payload();
        if data.len() < 3 {
            return DecodeOutcome::Invalid;
        }
        let bias = self.protocol.temp_bias_c();
        record.set_cell_temps(
            i16::from(data[0]) + bias,
            i16::from(data[1]) + bias,
            i16::from(data[2]) + bias,
        );
        DecodeOutcome::Applied(FrameKind::BmsCellTemps)
    }

    fn decode_charge_params(&self, frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
        let data = frame.payload();
        let current_da = match data.get(0..2) {
            Some(b) => i16::from_be_bytes([b[0], b[1]]),
            None => return DecodeOutcome::Invalid,
        };
        let charge_dah = match data.get(2..4) {
            Some(b) => u16::from_be_bytes([b[0], b[1]]),
            None => return DecodeOutcome::Invalid,
        };
        // The record keeps SoC in 0.01 % units regardless of revision.
        let soc_cpct = match self.protocol {
            BmsProtocol::G1 => match data.get(4..6) {
                Some(b) => u16::from_be_bytes([b[0], b[1]]),
                None => return DecodeOutcome::Invalid,
            },
            BmsProtocol::Legacy => match data.get(4) {
                Some(&pct) => u16::from(pct).saturating_mul(100),
                None => return DecodeOutcome::Invalid,
            },
        };
        record.set_charge_params(current_da, charge_dah, soc_cpct);
        DecodeOutcome::Applied(FrameKind::BmsChargeParams)
    }
}

fn decode_motor_status(frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
    let data = frame.payload();
    if data.len() < 8 {
        return DecodeOutcome::Invalid;
    }
    // Sensor-invalid marker anywhere discards the whole frame
    if data.iter().any(|&b| b == SENTINEL_BYTE) {
        return DecodeOutcome::Invalid;
    }
    record.set_motor_status(
        i16::from(data[0]) + MOTOR_TEMP_BIAS_C,
        i16::from(data[1]) + MOTOR_TEMP_BIAS_C,
        i16::from_le_bytes([data[2], data[3]]),
        u16::from_le_bytes([data[4], data[5]]),
        i16::from_le_bytes([data[6], data[7]]),
    );
    DecodeOutcome::Applied(FrameKind::MotorStatus)
}

fn decode_power_unit_flags(frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
    let data = frame.payload();
    if data.len() < 2 {
        return DecodeOutcome::Invalid;
    }
    record.set_power_unit_flags(u16::from_le_bytes([data[0], data[1]]));
    DecodeOutcome::Applied(FrameKind::PowerUnitFlags)
}

fn decode_bms_state(frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
    let data = frame.payload();
    if data.len() < 8 {
        return DecodeOutcome::Invalid;
    }
    // Cell count straddles the message: low byte at 2, high byte at 7
    let cell_count = u16::from_be_bytes([data[7], data[2]]);
    record.set_bms_state(
        data[0],
        data[1],
        cell_count,
        data[3],
        u16::from_be_bytes([data[4], data[5]]),
        data[6],
    );
    DecodeOutcome::Applied(FrameKind::BmsState)
}

fn decode_bms_diagnostics(frame: &Frame, record: &TelemetryRecord) -> DecodeOutcome {
    let data = frame.payload();
    if data.len() < 6 {
        return DecodeOutcome::Invalid;
    }
    let protection = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    record.set_bms_diagnostics(protection, data[4], data[5]);
    DecodeOutcome::Applied(FrameKind::BmsDiagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> Decoder {
        Decoder::new(BmsProtocol::G1)
    }

    #[test]
    fn test_motor_status_reference_vector() {
        let record = TelemetryRecord::new();
        let frame = Frame::new(
            FrameId::Standard(MOTOR_STATUS_ID),
            &[60, 60, 10, 0, 100, 0, 50, 0],
        );
        let outcome = decoder().dispatch(&frame, &record);
        assert_eq!(outcome, DecodeOutcome::Applied(FrameKind::MotorStatus));

        let snapshot = record.snapshot();
        assert_eq!(snapshot.motor_temp_c, 20);
        assert_eq!(snapshot.inverter_temp_c, 20);
        assert_eq!(snapshot.rpm, 10);
        assert!((snapshot.dc_bus_voltage_v - 10.0).abs() < f32::EPSILON);
        assert!((snapshot.dc_bus_current_a - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_motor_status_sentinel_discards_whole_frame() {
        let record = TelemetryRecord::new();
        // A sentinel at any position must leave every field untouched
        for position in 0..8 {
            let mut payload = [60u8, 60, 10, 0, 100, 0, 50, 0];
            payload[position] = SENTINEL_BYTE;
            let frame = Frame::new(FrameId::Standard(MOTOR_STATUS_ID), &payload);
            assert_eq!(decoder().dispatch(&frame, &record), DecodeOutcome::Invalid);
        }
        let snapshot = record.snapshot();
        assert_eq!(snapshot.motor_temp_c, 0);
        assert_eq!(snapshot.rpm, 0);
        assert_eq!(snapshot.dc_bus_voltage_v, 0.0);
    }

    #[test]
    fn test_motor_status_signed_fields() {
        let record = TelemetryRecord::new();
        // rpm -300 = 0xFED4 LE, current -292 = 0xFEDC LE; no sentinel bytes
        let frame = Frame::new(
            FrameId::Standard(MOTOR_STATUS_ID),
            &[0, 10, 0xD4, 0xFE, 0x0A, 0x00, 0xDC, 0xFE],
        );
        assert_eq!(
            decoder().dispatch(&frame, &record),
            DecodeOutcome::Applied(FrameKind::MotorStatus)
        );
        assert_eq!(record.rpm(), -300);
        assert_eq!(record.motor_temp_c(), -40);
        assert_eq!(record.dc_bus_da(), -292);
    }

    #[test]
    fn test_power_unit_flags_little_endian() {
        let record = TelemetryRecord::new();
        let frame = Frame::new(FrameId::Standard(POWER_FLAGS_ID), &[0x34, 0x12]);
        assert_eq!(
            decoder().dispatch(&frame, &record),
            DecodeOutcome::Applied(FrameKind::PowerUnitFlags)
        );
        assert_eq!(record.power_unit_flags(), 0x1234);
    }

    #[test]
    fn test_unknown_identifier_is_inert() {
        let record = TelemetryRecord::new();
        let frame = Frame::new(FrameId::Standard(0x123), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(decoder().dispatch(&frame, &record), DecodeOutcome::Ignored);
        assert_eq!(record.snapshot(), TelemetryRecord::new().snapshot());
    }

    #[test]
    fn test_charge_params_reference_vector() {
        let record = TelemetryRecord::new();
        let frame = Frame::bms(BMS_SUB_CHARGE_PARAMS, &[0x01, 0x00, 0x00, 0x0A, 0x00, 0x32]);
        assert_eq!(
            decoder().dispatch(&frame, &record),
            DecodeOutcome::Applied(FrameKind::BmsChargeParams)
        );
        let snapshot = record.snapshot();
        assert!((snapshot.pack_current_a - 25.6).abs() < 0.001);
        assert!((snapshot.pack_charge_ah - 1.0).abs() < 0.001);
        assert!((snapshot.soc_percent - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_charge_params_legacy_single_byte_soc() {
        let record = TelemetryRecord::new();
        let legacy = Decoder::new(BmsProtocol::Legacy);
        let frame = Frame::bms(BMS_SUB_CHARGE_PARAMS, &[0x00, 0x64, 0x00, 0x0A, 85]);
        assert_eq!(
            legacy.dispatch(&frame, &record),
            DecodeOutcome::Applied(FrameKind::BmsChargeParams)
        );
        let snapshot = record.snapshot();
        assert!((snapshot.pack_current_a - 10.0).abs() < 0.001);
        assert!((snapshot.soc_percent - 85.0).abs() < 0.001);
    }

    #[test]
    fn test_temp_bias_per_revision() {
        let record = TelemetryRecord::new();
        let frame = Frame::bms(crate::frame::BMS_SUB_MODULE_TEMPS, &[110, 130, 120]);

        decoder().dispatch(&frame, &record);
        assert_eq!(record.snapshot().module_temp_min_c, 10);
        assert_eq!(record.snapshot().module_temp_max_c, 30);

        Decoder::new(BmsProtocol::Legacy).dispatch(&frame, &record);
        assert_eq!(record.snapshot().module_temp_min_c, 70);
        assert_eq!(record.snapshot().module_temp_avg_c, 80);
    }

    #[test]
    fn test_truncated_frames_dropped() {
        let record = TelemetryRecord::new();
        let short_motor = Frame::new(FrameId::Standard(MOTOR_STATUS_ID), &[60, 60, 10]);
        assert_eq!(
            decoder().dispatch(&short_motor, &record),
            DecodeOutcome::Invalid
        );
        let short_state = Frame::bms(crate::frame::BMS_SUB_STATE, &[1, 2, 3]);
        assert_eq!(
            decoder().dispatch(&short_state, &record),
            DecodeOutcome::Invalid
        );
        assert_eq!(record.snapshot(), TelemetryRecord::new().snapshot());
    }
}
