use dashbus::decode::{BmsProtocol, DecodeOutcome, Decoder, FrameKind};
use dashbus::frame::{
    Frame, FrameId, BMS_SUB_CELL_TEMPS, BMS_SUB_CHARGE_PARAMS, BMS_SUB_DIAGNOSTICS,
    BMS_SUB_MODULE_TEMPS, BMS_SUB_STATE, MOTOR_STATUS_ID, POWER_FLAGS_ID,
};
use dashbus::telemetry::{ChargingState, TelemetryRecord};

fn motor_frame(payload: &[u8]) -> Frame {
    Frame::new(FrameId::Standard(MOTOR_STATUS_ID), payload)
}

#[test]
fn test_full_broadcast_set_populates_record() {
    let record = TelemetryRecord::new();
    let decoder = Decoder::new(BmsProtocol::G1);

    let frames = [
        motor_frame(&[60, 60, 10, 0, 100, 0, 50, 0]),
        Frame::new(FrameId::Standard(POWER_FLAGS_ID), &[0x00, 0x02]),
        // ignition + charger mains in, contactor out, 280 cells,
        // charging 25 minutes into the main stage, no error
        Frame::bms(BMS_SUB_STATE, &[0x03, 0x04, 0x18, 3, 0x00, 0x19, 0, 0x01]),
        Frame::bms(BMS_SUB_MODULE_TEMPS, &[118, 125, 121]),
        Frame::bms(BMS_SUB_DIAGNOSTICS, &[0x00, 0x01, 0x00, 0x02, 0x05, 0x3F]),
        Frame::bms(BMS_SUB_CELL_TEMPS, &[116, 127, 120]),
        Frame::bms(BMS_SUB_CHARGE_PARAMS, &[0x00, 0xC8, 0x01, 0x2C, 0x22, 0x60]),
    ];
    for frame in &frames {
        assert!(matches!(
            decoder.dispatch(frame, &record),
            DecodeOutcome::Applied(_)
        ));
    }

    let snapshot = record.snapshot();
    assert_eq!(snapshot.motor_temp_c, 20);
    assert_eq!(snapshot.inverter_temp_c, 20);
    assert_eq!(snapshot.rpm, 10);
    assert!((snapshot.dc_bus_voltage_v - 10.0).abs() < f32::EPSILON);
    assert!((snapshot.dc_bus_current_a - 5.0).abs() < f32::EPSILON);
    assert_eq!(snapshot.power_unit_flags, 0x0200);

    assert_eq!(snapshot.bms_input_flags, 0x03);
    assert_eq!(snapshot.bms_output_flags, 0x04);
    // Cell count straddles bytes 2 and 7: 0x0118 = 280
    assert_eq!(snapshot.bms_cell_count, 280);
    assert_eq!(snapshot.charging_state, ChargingState::Charging);
    assert_eq!(snapshot.charging_minutes, 25);
    assert_eq!(snapshot.last_charging_error, 0);

    assert_eq!(snapshot.module_temp_min_c, 18);
    assert_eq!(snapshot.module_temp_max_c, 25);
    assert_eq!(snapshot.module_temp_avg_c, 21);
    assert_eq!(snapshot.cell_temp_min_c, 16);
    assert_eq!(snapshot.cell_temp_max_c, 27);
    assert_eq!(snapshot.cell_temp_avg_c, 20);

    assert_eq!(snapshot.protection_flags, 0x0001_0002);
    assert_eq!(snapshot.reduction_flags, 0x05);
    assert_eq!(snapshot.battery_status_flags, 0x3F);

    assert!((snapshot.pack_current_a - 20.0).abs() < 0.001);
    assert!((snapshot.pack_charge_ah - 30.0).abs() < 0.001);
    assert!((snapshot.soc_percent - 88.0).abs() < 0.001);
}

#[test]
fn test_sentinel_preserves_previous_motor_fields() {
    let record = TelemetryRecord::new();
    let decoder = Decoder::new(BmsProtocol::G1);

    decoder.dispatch(&motor_frame(&[60, 60, 10, 0, 100, 0, 50, 0]), &record);
    assert_eq!(record.rpm(), 10);

    // A later frame carrying the sensor-invalid marker must not
    // disturb any previously decoded field
    let outcome = decoder.dispatch(&motor_frame(&[70, 70, 0xFF, 0, 110, 0, 60, 0]), &record);
    assert_eq!(outcome, DecodeOutcome::Invalid);

    let snapshot = record.snapshot();
    assert_eq!(snapshot.motor_temp_c, 20);
    assert_eq!(snapshot.rpm, 10);
    assert!((snapshot.dc_bus_voltage_v - 10.0).abs() < f32::EPSILON);
}

#[test]
fn test_unknown_identifiers_never_mutate_record() {
    let record = TelemetryRecord::new();
    let decoder = Decoder::new(BmsProtocol::G1);
    let baseline = record.snapshot();

    let strangers = [
        Frame::new(FrameId::Standard(0x123), &[1, 2, 3, 4, 5, 6, 7, 8]),
        Frame::new(FrameId::Standard(0x05), &[9; 8]),
        // Extended ID outside the BMS family prefix
        Frame::new(FrameId::Extended(0x1234_0000), &[1; 8]),
        // Right prefix, unassigned sub-address
        Frame::bms(0x0042, &[1; 8]),
    ];
    for frame in &strangers {
        assert_eq!(decoder.dispatch(frame, &record), DecodeOutcome::Ignored);
    }
    assert_eq!(record.snapshot(), baseline);
}

#[test]
fn test_revisions_disagree_on_soc_and_bias() {
    let temps = Frame::bms(BMS_SUB_MODULE_TEMPS, &[130, 140, 135]);
    let charge = Frame::bms(BMS_SUB_CHARGE_PARAMS, &[0x00, 0x0A, 0x00, 0x14, 0x40, 0x1F]);

    let g1_record = TelemetryRecord::new();
    let g1 = Decoder::new(BmsProtocol::G1);
    g1.dispatch(&temps, &g1_record);
    g1.dispatch(&charge, &g1_record);
    let g1_snapshot = g1_record.snapshot();
    assert_eq!(g1_snapshot.module_temp_min_c, 30);
    // Two-byte SoC: 0x401F = 16415 -> 164.15 % is nonsense input but
    // decodes mechanically; use the raw relationship
    assert!((g1_snapshot.soc_percent - 164.15).abs() < 0.001);

    let legacy_record = TelemetryRecord::new();
    let legacy = Decoder::new(BmsProtocol::Legacy);
    legacy.dispatch(&temps, &legacy_record);
    legacy.dispatch(&charge, &legacy_record);
    let legacy_snapshot = legacy_record.snapshot();
    assert_eq!(legacy_snapshot.module_temp_min_c, 90);
    // Single-byte SoC: byte 4 = 0x40 = 64 %
    assert!((legacy_snapshot.soc_percent - 64.0).abs() < 0.001);
}

#[test]
fn test_beacon_payload_decodes_flags_but_identifier_is_the_signal() {
    let record = TelemetryRecord::new();
    let decoder = Decoder::new(BmsProtocol::G1);

    // Truncated beacon: flags cannot decode, frame is still the beacon
    let bare = Frame::new(FrameId::Standard(POWER_FLAGS_ID), &[]);
    assert_eq!(decoder.dispatch(&bare, &record), DecodeOutcome::Invalid);
    assert!(bare.id.is_beacon());
    assert_eq!(record.power_unit_flags(), 0);

    let full = Frame::new(FrameId::Standard(POWER_FLAGS_ID), &[0xAB, 0xCD]);
    assert_eq!(
        decoder.dispatch(&full, &record),
        DecodeOutcome::Applied(FrameKind::PowerUnitFlags)
    );
    assert_eq!(record.power_unit_flags(), 0xCDAB);
}
