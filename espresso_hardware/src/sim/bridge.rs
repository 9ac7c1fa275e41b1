//! Device-side protocol endpoint in front of a [`SimulatedMachine`].
//!
//! `SimBridge` is a [`Port`]: writes are parsed as firmware commands (ascii
//! tokens or packed vectors) and reads return encoded telemetry packets, one
//! plant step per sample. A `StreamLink` over a bridge exercises the whole
//! wire path without hardware.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use espresso_traits::{FlowDirection, MachineCommand, MachineState, PumpMode};

use super::machine::SimulatedMachine;
use crate::codec::{
    AsciiToken, Channel, CommandCodec, PACKED_COMMAND_SIZE, TelemetryFrame, TelemetryLayout,
    decode_command, encode_telemetry, parse_ascii_token,
};
use crate::link::Port;

/// Boiler setpoint the firmware applies on `POWER_ON`.
const POWER_ON_TEMP_C: f32 = 93.0;
/// Boiler setpoint the firmware applies on `STEAM_ON`.
const STEAM_TEMP_C: f32 = 140.0;

/// Shared record of every ascii line the bridge received.
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<String>>>);

impl Transcript {
    fn push(&self, line: &str) {
        if let Ok(mut v) = self.0.lock() {
            v.push(line.to_string());
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Number of received lines equal to `token`.
    pub fn count(&self, token: &str) -> usize {
        self.0
            .lock()
            .map(|v| v.iter().filter(|l| l.as_str() == token).count())
            .unwrap_or(0)
    }
}

pub struct SimBridge {
    machine: SimulatedMachine,
    layout: TelemetryLayout,
    codec: CommandCodec,
    device_cmd: MachineCommand,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
    transcript: Transcript,
}

impl SimBridge {
    pub fn new(machine: SimulatedMachine, layout: TelemetryLayout, codec: CommandCodec) -> Self {
        Self {
            machine,
            layout,
            codec,
            device_cmd: MachineCommand::default(),
            inbox: Vec::new(),
            outbox: VecDeque::new(),
            transcript: Transcript::default(),
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    /// Command the firmware is currently executing.
    pub fn device_command(&self) -> &MachineCommand {
        &self.device_cmd
    }

    pub fn machine(&self) -> &SimulatedMachine {
        &self.machine
    }

    fn apply_token(&mut self, tok: AsciiToken) {
        let c = &mut self.device_cmd;
        let steaming = c.flow_direction == FlowDirection::Steam;
        match tok {
            AsciiToken::SetPressure(v) | AsciiToken::SetFlow(v) => {
                c.pump_mode = if matches!(tok, AsciiToken::SetPressure(_)) {
                    PumpMode::Pressure
                } else {
                    PumpMode::Flow
                };
                c.pump_cmd = v;
                if !steaming {
                    c.flow_direction = FlowDirection::Group;
                }
            }
            AsciiToken::Stop => {
                c.pump_mode = PumpMode::Disabled;
                c.pump_cmd = 0.0;
                if !steaming {
                    c.flow_direction = FlowDirection::Tank;
                }
            }
            AsciiToken::SetWaterTemp(v) => c.water_temp_cmd = v,
            AsciiToken::SetGroupTemp(v) => c.group_temp_cmd = v,
            AsciiToken::SteamOn => {
                c.flow_direction = FlowDirection::Steam;
                c.water_temp_cmd = STEAM_TEMP_C;
            }
            AsciiToken::SteamOff => c.flow_direction = FlowDirection::Tank,
            AsciiToken::Tare => c.tare.request(),
            AsciiToken::PowerOn => {
                c.water_temp_cmd = POWER_ON_TEMP_C;
                c.group_temp_cmd = POWER_ON_TEMP_C;
            }
            AsciiToken::PowerOff => c.zero(),
        }
    }

    fn drain_inbox(&mut self) {
        match self.codec {
            CommandCodec::Ascii => {
                while let Some(pos) = self.inbox.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = self.inbox.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    self.transcript.push(&line);
                    match parse_ascii_token(&line) {
                        Ok(tok) => self.apply_token(tok),
                        Err(e) => tracing::warn!(error = %e, "simulated firmware ignored command"),
                    }
                }
            }
            CommandCodec::Packed => {
                while self.inbox.len() >= PACKED_COMMAND_SIZE {
                    let chunk: Vec<u8> = self.inbox.drain(..PACKED_COMMAND_SIZE).collect();
                    match decode_command(&chunk) {
                        Ok(cmd) => {
                            let tare = self.device_cmd.tare.is_armed();
                            self.device_cmd = cmd;
                            if tare {
                                self.device_cmd.tare.request();
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "simulated firmware ignored command"),
                    }
                }
            }
        }
    }

    fn channel_value(state: &MachineState, ch: Channel) -> f32 {
        match ch {
            Channel::Pressure => state.pressure,
            Channel::Flow => state.flow,
            Channel::Weight => state.weight,
            Channel::WaterTemp | Channel::Temp => state.water_temp,
            Channel::GroupTemp => state.group_temp,
        }
    }

    fn produce_packet(&mut self) {
        let channels = self.layout.channels.channels();
        let mut values = Vec::with_capacity(self.layout.floats());
        for _ in 0..self.layout.samples_per_packet {
            self.machine.apply(&self.device_cmd);
            self.device_cmd.tare.take();
            let s = self.machine.advance();
            values.extend(channels.iter().map(|ch| Self::channel_value(&s, *ch)));
        }
        if let Some(frame) = TelemetryFrame::new(self.layout, values) {
            self.outbox.extend(encode_telemetry(&frame));
        }
    }
}

impl Read for SimBridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.outbox.is_empty() {
            self.produce_packet();
        }
        let n = buf.len().min(self.outbox.len());
        for (dst, src) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for SimBridge {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbox.extend_from_slice(buf);
        self.drain_inbox();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for SimBridge {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}
