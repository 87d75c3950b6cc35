//! Instrument cluster core wired to a simulated powertrain bus.
//!
//! Runs the real ingestion task, timer scheduler and watchdog against a
//! frame generator that alternates drive and rest phases, so the mode
//! transitions and telemetry flow can be observed without vehicle
//! hardware. Prints a JSON telemetry snapshot once per second.

use clap::{App, Arg};
use colored::Colorize;
use dashbus::config::ClusterConfig;
use dashbus::decode::{BmsProtocol, Decoder};
use dashbus::frame::{
    Frame, FrameId, BMS_SUB_CELL_TEMPS, BMS_SUB_CHARGE_PARAMS, BMS_SUB_DIAGNOSTICS,
    BMS_SUB_MODULE_TEMPS, BMS_SUB_STATE, MOTOR_STATUS_ID, POWER_FLAGS_ID,
};
use dashbus::ingest::IngestionTask;
use dashbus::lamps;
use dashbus::mode::{ClusterMode, ModeState};
use dashbus::monitor::FrameMonitor;
use dashbus::source::{frame_channel, FrameProducer, FrameSource};
use dashbus::telemetry::{TelemetryRecord, PU_FLAG_POWERING_READY, PU_FLAG_VEHICLE_RUNNING};
use dashbus::timer::{run_scheduler, Repeat, SharedTimers};
use dashbus::watchdog::ActivityWatchdog;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::info;

const SNAPSHOT_PERIOD_MS: u64 = 1000;
const HEARTBEAT_PERIOD_S: u64 = 5;

// Simulated powertrain cadence
const SIM_TICK_MS: u64 = 100;
const DRIVE_PHASE_MS: u64 = 8_000;
const CYCLE_MS: u64 = 14_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("dashbus-sim")
        .version("0.1.0")
        .about("Instrument cluster core driven by a simulated powertrain bus")
        .arg(
            Arg::with_name("activity-timeout")
                .long("activity-timeout")
                .value_name("MS")
                .help("Powertrain activity watchdog window in milliseconds")
                .takes_value(true)
                .default_value("3200"),
        )
        .arg(
            Arg::with_name("scheduler-interval")
                .long("scheduler-interval")
                .value_name("MS")
                .help("Timer scheduler poll cadence in milliseconds")
                .takes_value(true)
                .default_value("10"),
        )
        .arg(
            Arg::with_name("protocol")
                .long("protocol")
                .value_name("REV")
                .help("BMS protocol revision")
                .takes_value(true)
                .possible_values(&["g1", "legacy"])
                .default_value("g1"),
        )
        .arg(
            Arg::with_name("monitor")
                .long("monitor")
                .help("Echo every ingested frame to the log"),
        )
        .arg(
            Arg::with_name("filter")
                .long("filter")
                .value_name("ID")
                .help("Restrict the monitor echo to one identifier (decimal or 0x-hex)")
                .takes_value(true),
        )
        .get_matches();

    let config = ClusterConfig {
        activity_timeout_ms: matches
            .value_of("activity-timeout")
            .unwrap_or("3200")
            .parse()?,
        scheduler_interval_ms: matches
            .value_of("scheduler-interval")
            .unwrap_or("10")
            .parse()?,
        bms_protocol: match matches.value_of("protocol") {
            Some("legacy") => BmsProtocol::Legacy,
            _ => BmsProtocol::G1,
        },
        monitor_enabled: matches.is_present("monitor"),
        monitor_filter: match matches.value_of("filter") {
            Some(value) => Some(parse_id(value)?),
            None => None,
        },
        ..ClusterConfig::default()
    };
    config.validate()?;

    println!("🚗 Instrument Cluster Core (simulated powertrain)");
    println!("   activity timeout: {} ms", config.activity_timeout_ms);
    println!("   BMS protocol:     {:?}", config.bms_protocol);

    let record = Arc::new(TelemetryRecord::new());
    let mode = Arc::new(ModeState::new());
    let monitor = Arc::new(FrameMonitor::new(
        config.monitor_enabled,
        config.monitor_filter,
    ));
    let timers = SharedTimers::new();

    let started_mode = Arc::clone(&mode);
    let stopped_mode = Arc::clone(&mode);
    let watchdog = ActivityWatchdog::new(
        &timers,
        config.activity_timeout(),
        Box::new(move || {
            started_mode.powertrain_started();
            println!("{}", "▶ powertrain active - cluster READY".green().bold());
        }),
        Box::new(move || {
            stopped_mode.powertrain_stopped();
            println!("{}", "■ powertrain silent - cluster IDLE".yellow().bold());
        }),
    )?;

    let (producer, mut source) = frame_channel();
    source.configure(&config.bus())?;

    let ingestion = IngestionTask::new(
        source,
        Decoder::new(config.bms_protocol),
        Arc::clone(&record),
        watchdog,
        Arc::clone(&monitor),
        config.receive_timeout(),
    );

    // Periodic heartbeat exercises the scheduler's re-arming mode
    let heartbeat = timers.register(
        Duration::from_secs(HEARTBEAT_PERIOD_S),
        Repeat::Periodic,
        Box::new(|| info!("cluster heartbeat")),
    )?;
    timers.start(heartbeat, Instant::now());

    tokio::spawn(run_scheduler(timers.clone(), config.scheduler_interval()));
    tokio::spawn(ingestion.run());
    tokio::spawn(simulate_powertrain(producer, config.bms_protocol));

    let mut snapshot_ticker = interval(Duration::from_millis(SNAPSHOT_PERIOD_MS));
    loop {
        tokio::select! {
            _ = snapshot_ticker.tick() => {
                let snapshot = record.snapshot();
                let lamp_state = lamps::evaluate(&snapshot, mode.mode() == ClusterMode::Ready);
                info!(
                    "mode={:?} lamps={} telemetry={}",
                    mode.mode(),
                    serde_json::to_string(&lamp_state)?,
                    serde_json::to_string(&snapshot)?
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                break;
            }
        }
    }

    println!("🚗 cluster core stopped");
    Ok(())
}

fn parse_id(value: &str) -> Result<u32, std::num::ParseIntError> {
    match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

/// Frame generator standing in for the vehicle. Alternates a drive
/// phase (motor status at 10 Hz, beacon at 5 Hz) with a rest phase
/// (BMS broadcasts only) so both watchdog transitions occur.
async fn simulate_powertrain(producer: FrameProducer, protocol: BmsProtocol) {
    let mut ticker = interval(Duration::from_millis(SIM_TICK_MS));
    let mut tick: u64 = 0;
    loop {
        ticker.tick().await;
        tick += 1;

        let phase_ms = (tick * SIM_TICK_MS) % CYCLE_MS;
        let driving = phase_ms < DRIVE_PHASE_MS;

        if driving {
            producer.offer(motor_status_frame(tick));
            if tick % 2 == 0 {
                let flags = PU_FLAG_VEHICLE_RUNNING | PU_FLAG_POWERING_READY;
                producer.offer(Frame::new(
                    FrameId::Standard(POWER_FLAGS_ID),
                    &flags.to_le_bytes(),
                ));
            }
        }

        // BMS keeps broadcasting at 1 Hz in both phases
        if tick % 10 == 0 {
            for frame in bms_broadcast(tick, protocol) {
                producer.offer(frame);
            }
        }
    }
}

fn motor_status_frame(tick: u64) -> Frame {
    // Gentle deterministic ramps, clear of the 0xFF sentinel
    let ramp = (tick % 64) as u16;
    let rpm = 1200i16 + ramp as i16 * 8;
    let decivolts = 960 + ramp / 4;
    let deciamps = 120i16 + ramp as i16;
    let motor_raw = 95u8 + (ramp / 16) as u8; // 55 C nominal
    let inverter_raw = 88u8;

    let rpm_bytes = rpm.to_le_bytes();
    let volt_bytes = decivolts.to_le_bytes();
    let amp_bytes = deciamps.to_le_bytes();
    Frame::new(
        FrameId::Standard(MOTOR_STATUS_ID),
        &[
            motor_raw,
            inverter_raw,
            rpm_bytes[0],
            rpm_bytes[1],
            volt_bytes[0],
            volt_bytes[1],
            amp_bytes[0],
            amp_bytes[1],
        ],
    )
}

fn bms_broadcast(tick: u64, protocol: BmsProtocol) -> [Frame; 5] {
    // SoC drains slowly from 87 %
    let soc_cpct = 8700u16.saturating_sub((tick / 10) as u16);
    let minutes = 0u16.to_be_bytes();
    let current_da = (-185i16).to_be_bytes();
    let charge_dah = 412u16.to_be_bytes();

    // Temperatures around 20 C in the revision's own bias
    let (temp_bias, soc_bytes) = match protocol {
        BmsProtocol::G1 => (100u8, soc_cpct.to_be_bytes()),
        BmsProtocol::Legacy => (40u8, [(soc_cpct / 100) as u8, 0]),
    };

    [
        // State: ignition on, contactor closed, 24 cells, not charging
        Frame::bms(
            BMS_SUB_STATE,
            &[0x01, 0x04, 24, 0, minutes[0], minutes[1], 0, 0],
        ),
        Frame::bms(
            BMS_SUB_MODULE_TEMPS,
            &[temp_bias + 18, temp_bias + 24, temp_bias + 21],
        ),
        Frame::bms(
            BMS_SUB_CELL_TEMPS,
            &[temp_bias + 17, temp_bias + 26, temp_bias + 22],
        ),
        Frame::bms(BMS_SUB_DIAGNOSTICS, &[0, 0, 0, 0, 0, 0]),
        Frame::bms(
            BMS_SUB_CHARGE_PARAMS,
            &[
                current_da[0],
                current_da[1],
                charge_dah[0],
                charge_dah[1],
                soc_bytes[0],
                soc_bytes[1],
            ],
        ),
    ]
}
