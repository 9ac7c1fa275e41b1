//! Single-phase modes: the command is a pure function of the parameters.

use super::{FLUSH, IDLE, MANUAL, Mode, PREHEAT, PhaseView, STEAM};
use crate::config::{FlushParams, PreheatParams, SteamParams};
use crate::exchange::ControlOutput;
use espresso_traits::{FlowDirection, MachineCommand, MachineState, PumpMode};

#[derive(Debug, Clone, Copy, Default)]
pub struct IdleMode;

impl Mode for IdleMode {
    fn title(&self) -> &str {
        IDLE
    }

    fn start(&mut self) {}

    fn run(&mut self, _state: &MachineState, out: &mut ControlOutput) {
        out.halt();
    }

    fn phase(&self) -> PhaseView {
        PhaseView::steady("idle")
    }
}

fn circulate(out: &mut ControlOutput, dir: FlowDirection, flow: f32, water: f32, group: f32) {
    let cmd = &mut out.command;
    cmd.flow_direction = dir;
    cmd.pump_mode = PumpMode::Flow;
    cmd.pump_cmd = flow;
    cmd.water_temp_cmd = water;
    cmd.group_temp_cmd = group;
}

/// Circulate to the tank while the heaters come up.
#[derive(Debug, Clone, Copy)]
pub struct PreheatMode {
    params: PreheatParams,
}

impl PreheatMode {
    pub fn new(params: PreheatParams) -> Self {
        Self { params }
    }
}

impl Mode for PreheatMode {
    fn title(&self) -> &str {
        PREHEAT
    }

    fn start(&mut self) {}

    fn run(&mut self, _state: &MachineState, out: &mut ControlOutput) {
        let p = self.params;
        circulate(out, FlowDirection::Tank, p.flow, p.water_temp, p.group_temp);
    }

    fn phase(&self) -> PhaseView {
        PhaseView::steady("heating")
    }
}

/// Run water through the group.
#[derive(Debug, Clone, Copy)]
pub struct FlushMode {
    params: FlushParams,
}

impl FlushMode {
    pub fn new(params: FlushParams) -> Self {
        Self { params }
    }
}

impl Mode for FlushMode {
    fn title(&self) -> &str {
        FLUSH
    }

    fn start(&mut self) {}

    fn run(&mut self, _state: &MachineState, out: &mut ControlOutput) {
        let p = self.params;
        circulate(out, FlowDirection::Group, p.flow, p.water_temp, p.group_temp);
    }

    fn phase(&self) -> PhaseView {
        PhaseView::steady("flushing")
    }
}

/// Replays whatever command the operator last supplied, logging as it goes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualMode {
    cmd: MachineCommand,
}

impl ManualMode {
    /// Replace the replayed command. A tare in `cmd` is forwarded once.
    pub fn set(&mut self, cmd: MachineCommand) {
        self.cmd = cmd;
    }

    pub fn command(&self) -> MachineCommand {
        self.cmd
    }
}

impl Mode for ManualMode {
    fn title(&self) -> &str {
        MANUAL
    }

    fn start(&mut self) {}

    fn run(&mut self, _state: &MachineState, out: &mut ControlOutput) {
        let tare = self.cmd.tare.take() || out.command.tare.is_armed();
        out.command = self.cmd;
        if tare {
            out.command.tare.request();
        }
        out.logging = true;
    }

    fn phase(&self) -> PhaseView {
        PhaseView::steady("manual")
    }
}

/// Steam wand: pump off, boiler to steam temperature.
#[derive(Debug, Clone, Copy)]
pub struct SteamMode {
    params: SteamParams,
}

impl SteamMode {
    pub fn new(params: SteamParams) -> Self {
        Self { params }
    }
}

impl Mode for SteamMode {
    fn title(&self) -> &str {
        STEAM
    }

    fn start(&mut self) {}

    fn run(&mut self, _state: &MachineState, out: &mut ControlOutput) {
        let cmd = &mut out.command;
        cmd.flow_direction = FlowDirection::Steam;
        cmd.pump_mode = PumpMode::Disabled;
        cmd.pump_cmd = 0.0;
        cmd.water_temp_cmd = self.params.water_temp;
        cmd.group_temp_cmd = self.params.group_temp;
    }

    fn phase(&self) -> PhaseView {
        PhaseView::steady("steaming")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preheat_circulates_to_tank() {
        let mut m = PreheatMode::new(PreheatParams::default());
        let mut out = ControlOutput::default();
        m.run(&MachineState::default(), &mut out);
        assert_eq!(out.command.flow_direction, FlowDirection::Tank);
        assert_eq!(out.command.pump_mode, PumpMode::Flow);
        assert_eq!(out.command.pump_cmd, 2.0);
        assert_eq!(out.command.water_temp_cmd, 93.0);
    }

    #[test]
    fn manual_forwards_tare_once_and_logs() {
        let mut m = ManualMode::default();
        let mut cmd = MachineCommand {
            pump_cmd: 3.0,
            pump_mode: PumpMode::Flow,
            flow_direction: FlowDirection::Group,
            ..MachineCommand::default()
        };
        cmd.tare.request();
        m.set(cmd);

        let mut out = ControlOutput::default();
        m.run(&MachineState::default(), &mut out);
        assert!(out.logging);
        assert!(out.command.tare.take());

        m.run(&MachineState::default(), &mut out);
        assert!(!out.command.tare.is_armed());
        assert_eq!(out.command.pump_cmd, 3.0);

        assert!(m.exit(&MachineState::default(), &mut out));
        assert!(out.command.is_zero());
        assert!(!out.logging);
    }

    #[test]
    fn steam_disables_pump() {
        let mut m = SteamMode::new(SteamParams::default());
        let mut out = ControlOutput::default();
        m.run(&MachineState::default(), &mut out);
        assert_eq!(out.command.flow_direction, FlowDirection::Steam);
        assert_eq!(out.command.pump_mode, PumpMode::Disabled);
        assert_eq!(out.command.water_temp_cmd, 140.0);
    }
}
