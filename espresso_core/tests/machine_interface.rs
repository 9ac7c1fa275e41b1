use espresso_core::mocks::NullLink;
use espresso_core::{LinkStatus, LinkTiming, MachineInterface, MachineShared};
use espresso_hardware::{FramingError, HwError};
use espresso_traits::clock::test_clock::TestClock;
use espresso_traits::{LinkError, MachineCommand, MachineLink, MachineState, PumpMode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

/// Link that replays scripted read results and records every command.
#[derive(Default)]
struct ScriptedLink {
    reads: VecDeque<Result<MachineState, HwError>>,
    sent: Arc<Mutex<Vec<MachineCommand>>>,
}

impl MachineLink for ScriptedLink {
    fn sample(&mut self, _timeout: Duration) -> Result<MachineState, LinkError> {
        match self.reads.pop_front() {
            Some(Ok(s)) => Ok(s),
            Some(Err(e)) => Err(Box::new(e)),
            None => Err(Box::new(HwError::Timeout)),
        }
    }

    fn send(&mut self, cmd: &MachineCommand) -> Result<(), LinkError> {
        self.sent.lock().unwrap().push(*cmd);
        Ok(())
    }
}

const TIMING: LinkTiming = LinkTiming {
    read_timeout: Duration::from_millis(50),
    retry_backoff: Duration::from_millis(100),
};

fn at(t: f64) -> MachineState {
    MachineState {
        sample_time: t,
        pressure: 1.5,
        ..MachineState::default()
    }
}

#[test]
fn tare_goes_out_exactly_once() {
    let link = ScriptedLink::default();
    let sent = link.sent.clone();
    let shared = MachineShared::new();
    let mut machine = MachineInterface::new(link, shared.clone(), TIMING);

    shared.with_output(|out| {
        out.command.pump_mode = PumpMode::Flow;
        out.command.pump_cmd = 2.0;
        out.command.tare.request();
    });
    machine.send_command();
    assert!(!shared.output().command.tare.is_armed());
    machine.send_command();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].tare.is_armed());
    assert!(!sent[1].tare.is_armed());
    assert_eq!(sent[1].pump_cmd, 2.0);
}

#[test]
fn framing_error_resyncs_without_backoff() {
    let clock = TestClock::new();
    let link = ScriptedLink {
        reads: VecDeque::from([
            Ok(at(0.01)),
            Err(HwError::Framing(FramingError::Magic { found: *b"XX" })),
            Ok(at(0.02)),
        ]),
        ..ScriptedLink::default()
    };
    let shared = MachineShared::new();
    let mut machine =
        MachineInterface::new(link, shared.clone(), TIMING).with_clock(clock.clone());

    assert!(machine.sample());
    assert!(!machine.sample());
    assert_eq!(shared.link_status(), LinkStatus::Resyncing);
    assert_eq!(shared.state().sample_time, 0.01, "previous state kept");
    assert_eq!(clock.elapsed(), Duration::ZERO);

    assert!(machine.sample());
    assert_eq!(shared.link_status(), LinkStatus::Connected);
    assert_eq!(shared.state().sample_time, 0.02);
}

#[test]
fn timeouts_back_off_and_degrade() {
    let clock = TestClock::new();
    let shared = MachineShared::new();
    let mut machine = MachineInterface::new(ScriptedLink::default(), shared.clone(), TIMING)
        .with_clock(clock.clone());

    for _ in 0..3 {
        machine.tick();
    }
    assert_eq!(shared.link_status(), LinkStatus::Degraded);
    assert_eq!(clock.elapsed(), TIMING.retry_backoff * 3);
}

#[test]
fn missing_device_is_not_fatal() {
    let clock = TestClock::new();
    let shared = MachineShared::new();
    let mut machine = MachineInterface::new(NullLink, shared.clone(), TIMING).with_clock(clock);
    shared.with_output(|out| out.logging = true);

    for _ in 0..5 {
        machine.tick();
    }
    assert_eq!(shared.link_status(), LinkStatus::Disconnected);
    assert_eq!(shared.state(), MachineState::default());
    // Logging still records what was attempted.
    assert_eq!(shared.log_len(), 5);
}

#[test]
fn clear_request_empties_log_before_append() {
    let link = ScriptedLink {
        reads: (1..=4).map(|i| Ok(at(f64::from(i) * 0.01))).collect(),
        ..ScriptedLink::default()
    };
    let shared = MachineShared::new();
    let mut machine = MachineInterface::new(link, shared.clone(), TIMING);

    shared.with_output(|out| out.logging = true);
    machine.tick();
    machine.tick();
    assert_eq!(shared.log_len(), 2);

    shared.with_output(|out| out.request_clear_log());
    machine.tick();
    let rows = shared.log_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sample_time, 0.03);

    shared.with_output(|out| out.logging = false);
    machine.tick();
    assert_eq!(shared.log_len(), 1);
}

#[test]
fn save_log_writes_timestamped_csv() {
    let link = ScriptedLink {
        reads: (1..=3).map(|i| Ok(at(f64::from(i) * 0.01))).collect(),
        ..ScriptedLink::default()
    };
    let shared = MachineShared::new();
    let mut machine = MachineInterface::new(link, shared.clone(), TIMING);
    shared.with_output(|out| out.logging = true);
    for _ in 0..3 {
        machine.tick();
    }

    let dir = tempdir().unwrap();
    let path = machine.save_log(&dir.path().join("logs")).unwrap();
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.ends_with(".csv"));
    assert_eq!(name.len(), "YYYYmmdd-HHMMSS.csv".len());

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(headers.len(), 18);
    assert_eq!(&headers[0], "pump_cmd");
    assert_eq!(&headers[6], "sample_time");
    assert_eq!(&headers[17], "water_heater_power");
    assert_eq!(rdr.records().count(), 3);
    // Saving does not consume the buffer.
    assert_eq!(shared.log_len(), 3);
}
