//! I/O and logic worker threads: startup, operator intents, and cleanup.
//!
//! Verifies that:
//! - Threads are joined when the workers are dropped or shut down
//! - Intents sent through the handle are applied on the next logic tick
//! - A tare requested by the operator survives a stopped mode's zeroing
//! - The handle reports an error once the logic loop is gone
//! - The status snapshot carries the active phase next to the pending targets

use espresso_core::mocks::NullLink;
use espresso_core::modes::{MANUAL, NINE_BAR, PREHEAT};
use espresso_core::{
    IoWorker, LinkStatus, LinkTiming, LogicWorker, MachineInterface, MachineShared, ModeParams,
    ModeRegistry, Supervisor, TransitionOutcome,
};
use espresso_hardware::{NoiseLevels, PlantParams, SimulatedMachine};
use espresso_traits::{FlowDirection, MachineCommand, MonotonicClock, PumpMode};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

fn supervisor() -> Supervisor {
    let registry = ModeRegistry::builder()
        .with_standard_modes(&ModeParams::default())
        .build()
        .unwrap();
    Supervisor::new(registry, "Idle").unwrap()
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn quiet_sim() -> SimulatedMachine {
    let params = PlantParams {
        noise: NoiseLevels::NONE,
        ..PlantParams::default()
    };
    SimulatedMachine::new(params, 1, Duration::from_millis(2)).paced(MonotonicClock::new())
}

#[test]
fn io_worker_exits_on_drop() {
    let shared = MachineShared::new();
    let timing = LinkTiming {
        read_timeout: Duration::from_millis(10),
        retry_backoff: Duration::from_millis(10),
    };
    let worker = IoWorker::spawn(MachineInterface::new(NullLink, shared.clone(), timing));
    assert!(wait_until(|| worker.ticks() > 0));
    assert_eq!(shared.link_status(), LinkStatus::Disconnected);
    drop(worker);
}

#[test]
fn io_worker_publishes_simulated_state() {
    let shared = MachineShared::new();
    let worker = IoWorker::spawn(MachineInterface::new(
        quiet_sim(),
        shared.clone(),
        LinkTiming::default(),
    ));
    assert!(wait_until(|| shared.state().sample_time > 0.05));
    worker.shutdown();
}

#[test]
fn intents_drive_the_supervisor() {
    let shared = MachineShared::new();
    let io = IoWorker::spawn(MachineInterface::new(
        quiet_sim(),
        shared.clone(),
        LinkTiming::default(),
    ));
    let logic = LogicWorker::spawn(supervisor(), shared.clone(), 200, MonotonicClock::new());
    let handle = logic.handle();

    assert_eq!(
        handle.transition("Latte", WAIT).unwrap(),
        TransitionOutcome::UnknownMode
    );
    assert_eq!(
        handle.transition(PREHEAT, WAIT).unwrap(),
        TransitionOutcome::Switched
    );
    handle.start().unwrap();
    assert!(wait_until(|| {
        let s = handle.status();
        s.running && s.mode == PREHEAT && s.command[1] == 93.0
    }));
    // The plant follows the command.
    assert!(wait_until(|| shared.state().water_temp > 25.0));

    handle.stop().unwrap();
    assert!(wait_until(|| !handle.status().running && shared.output().command.is_zero()));

    logic.shutdown();
    io.shutdown();
}

#[test]
fn status_exposes_shot_targets() {
    let shared = MachineShared::new();
    let logic = LogicWorker::spawn(supervisor(), shared.clone(), 200, MonotonicClock::new());
    let handle = logic.handle();

    assert_eq!(
        handle.transition(NINE_BAR, WAIT).unwrap(),
        TransitionOutcome::Switched
    );
    handle.start().unwrap();
    // No telemetry arrives, so the shot holds in preheat.
    assert!(wait_until(|| {
        let s = handle.status();
        s.mode == NINE_BAR
            && s.phase.phase == "preheat"
            && !s.phase.done
            && s.phase.step.is_none()
            && s.command[1] == 93.0
            && s.command[2] == 93.0
    }));
    logic.shutdown();
}

#[test]
fn operator_tare_survives_stopped_mode() {
    let shared = MachineShared::new();
    let logic = LogicWorker::spawn(supervisor(), shared.clone(), 200, MonotonicClock::new());
    let handle = logic.handle();
    handle.tare().unwrap();
    assert!(wait_until(|| shared.output().command.tare.is_armed()));
    drop(logic);
}

#[test]
fn manual_command_is_replayed() {
    let shared = MachineShared::new();
    let logic = LogicWorker::spawn(supervisor(), shared.clone(), 200, MonotonicClock::new());
    let handle = logic.handle();
    assert!(handle.transition(MANUAL, WAIT).unwrap().is_switched());
    handle
        .set_manual(MachineCommand {
            pump_cmd: 1.5,
            pump_mode: PumpMode::Flow,
            flow_direction: FlowDirection::Spout,
            ..MachineCommand::default()
        })
        .unwrap();
    handle.start().unwrap();
    assert!(wait_until(|| {
        let out = shared.output();
        out.logging && out.command.flow_direction == FlowDirection::Spout
    }));
    logic.shutdown();
}

#[test]
fn handle_errors_after_shutdown() {
    let shared = MachineShared::new();
    let logic = LogicWorker::spawn(supervisor(), shared, 100, MonotonicClock::new());
    let handle = logic.handle();
    logic.shutdown();
    assert!(handle.start().is_err());
    assert!(handle.transition(PREHEAT, Duration::from_millis(50)).is_err());
}
