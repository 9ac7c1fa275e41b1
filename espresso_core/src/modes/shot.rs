//! Fixed nine-bar shot sequence.
//!
//! Strictly linear: Preheat → Purge → Preinfuse → Shot → End → Done. All
//! timing is measured on the telemetry `sample_time`, never wall clock, so
//! the sequence behaves the same against the simulator and the machine.

use super::{Mode, NINE_BAR, PhaseView};
use crate::config::ShotParams;
use crate::exchange::ControlOutput;
use crate::util::within;
use espresso_traits::{FlowDirection, MachineState, PumpMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShotPhase {
    Preheat,
    Purge,
    Preinfuse,
    Shot,
    End,
    Done,
}

impl ShotPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Preheat => "preheat",
            Self::Purge => "purge",
            Self::Preinfuse => "preinfuse",
            Self::Shot => "shot",
            Self::End => "end",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShotSequencer {
    params: ShotParams,
    phase: ShotPhase,
    pi_flow: f32,
    /// `sample_time` at which the current timed phase began.
    phase_start: f64,
}

impl ShotSequencer {
    pub fn new(params: ShotParams) -> Self {
        Self {
            params,
            phase: ShotPhase::Preheat,
            pi_flow: 0.0,
            phase_start: 0.0,
        }
    }

    pub fn shot_phase(&self) -> ShotPhase {
        self.phase
    }

    /// Current open-loop pre-infusion flow.
    pub fn pi_flow(&self) -> f32 {
        self.pi_flow
    }

    fn enter(&mut self, next: ShotPhase, t: f64) {
        tracing::debug!(from = self.phase.name(), to = next.name(), t, "shot phase");
        self.phase = next;
        self.phase_start = t;
    }

    fn ramp(&mut self, out: &mut ControlOutput, dir: FlowDirection) {
        self.pi_flow += self.params.pi_flow_step;
        let cmd = &mut out.command;
        cmd.flow_direction = dir;
        cmd.pump_mode = PumpMode::Flow;
        cmd.pump_cmd = self.pi_flow;
        cmd.tare.request();
    }
}

impl Mode for ShotSequencer {
    fn title(&self) -> &str {
        NINE_BAR
    }

    fn start(&mut self) {
        self.phase = ShotPhase::Preheat;
        self.pi_flow = 0.0;
        self.phase_start = 0.0;
    }

    fn run(&mut self, state: &MachineState, out: &mut ControlOutput) {
        let p = self.params;
        let t = state.sample_time;
        match self.phase {
            ShotPhase::Preheat => {
                let cmd = &mut out.command;
                cmd.flow_direction = FlowDirection::Tank;
                cmd.pump_mode = PumpMode::Flow;
                cmd.pump_cmd = p.preheat_flow;
                cmd.water_temp_cmd = p.water_temp;
                cmd.group_temp_cmd = p.group_temp;
                cmd.tare.request();
                out.request_clear_log();
                if within(state.water_temp, p.water_temp, p.temp_tolerance)
                    && within(state.group_temp, p.group_temp, p.temp_tolerance)
                {
                    self.enter(ShotPhase::Purge, t);
                }
            }
            ShotPhase::Purge => {
                self.ramp(out, FlowDirection::Drip);
                if t - self.phase_start >= p.purge_s {
                    self.enter(ShotPhase::Preinfuse, t);
                }
            }
            ShotPhase::Preinfuse => {
                out.logging = true;
                self.ramp(out, FlowDirection::Group);
                if state.pressure >= p.pi_end_pressure {
                    out.command.tare.request();
                    self.enter(ShotPhase::Shot, t);
                }
            }
            ShotPhase::Shot => {
                let cmd = &mut out.command;
                cmd.flow_direction = FlowDirection::Group;
                cmd.pump_mode = PumpMode::Pressure;
                cmd.pump_cmd = p.shot_pressure;
                if state.weight >= p.shot_weight {
                    self.enter(ShotPhase::End, t);
                }
            }
            ShotPhase::End => {
                out.logging = false;
                out.command.flow_direction = FlowDirection::Drip;
                out.command.pump_cmd = 0.0;
                if t - self.phase_start >= p.end_dwell_s {
                    out.command.flow_direction = FlowDirection::Tank;
                    out.command.pump_mode = PumpMode::Disabled;
                    self.enter(ShotPhase::Done, t);
                    tracing::info!(weight = state.weight, "shot complete");
                    out.halt();
                }
            }
            ShotPhase::Done => out.halt(),
        }
    }

    fn exit(&mut self, state: &MachineState, out: &mut ControlOutput) -> bool {
        let safe = matches!(self.phase, ShotPhase::Done | ShotPhase::Preheat)
            || state.pressure <= self.params.safe_exit_pressure;
        if safe {
            out.halt();
        }
        safe
    }

    fn phase(&self) -> PhaseView {
        PhaseView {
            phase: self.phase.name(),
            done: self.phase == ShotPhase::Done,
            step: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(t: f64) -> MachineState {
        MachineState {
            sample_time: t,
            water_temp: 93.0,
            group_temp: 93.0,
            ..MachineState::default()
        }
    }

    #[test]
    fn cold_machine_stays_in_preheat() {
        let mut s = ShotSequencer::new(ShotParams::default());
        let mut out = ControlOutput::default();
        let cold = MachineState {
            water_temp: 92.4,
            group_temp: 93.0,
            ..MachineState::default()
        };
        for _ in 0..10 {
            s.run(&cold, &mut out);
        }
        assert_eq!(s.shot_phase(), ShotPhase::Preheat);
        assert!(out.command.tare.is_armed());
        assert!(out.clear_log_requested());
    }

    #[test]
    fn purge_ramps_then_preinfuses_on_time() {
        let mut s = ShotSequencer::new(ShotParams::default());
        let mut out = ControlOutput::default();
        s.run(&at(0.0), &mut out);
        assert_eq!(s.shot_phase(), ShotPhase::Purge);

        s.run(&at(1.0), &mut out);
        assert_eq!(out.command.flow_direction, FlowDirection::Drip);
        assert!((s.pi_flow() - 0.01).abs() < 1e-6);
        assert_eq!(s.shot_phase(), ShotPhase::Purge);

        s.run(&at(2.0), &mut out);
        assert_eq!(s.shot_phase(), ShotPhase::Preinfuse);
        assert!(!out.logging);
    }

    #[test]
    fn guard_refuses_exit_under_pressure() {
        let mut s = ShotSequencer::new(ShotParams::default());
        let mut out = ControlOutput::default();
        s.run(&at(0.0), &mut out);
        let loaded = MachineState {
            pressure: 8.5,
            ..at(1.0)
        };
        s.run(&loaded, &mut out);
        let before = out;
        assert!(!s.exit(&loaded, &mut out));
        assert_eq!(out, before);

        let relieved = MachineState {
            pressure: 0.5,
            ..loaded
        };
        assert!(s.exit(&relieved, &mut out));
        assert!(out.command.is_zero());
    }

    #[test]
    fn fresh_sequencer_may_exit() {
        let mut s = ShotSequencer::new(ShotParams::default());
        let mut out = ControlOutput::default();
        let loaded = MachineState {
            pressure: 9.0,
            ..MachineState::default()
        };
        assert!(s.exit(&loaded, &mut out));
    }
}
