//! Data-driven shot: walks a [`Profile`] one step at a time.

use super::{Mode, PhaseView};
use crate::config::ProfileParams;
use crate::exchange::ControlOutput;
use crate::profile::{Profile, Step};
use crate::util::within;
use espresso_traits::{FlowDirection, MachineState, PumpMode};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilePhase {
    /// Pump held off until step 0 temperatures are reached.
    Heating,
    Step(usize),
    Finished,
}

#[derive(Debug, Clone)]
pub struct ProfileStepper {
    profile: Arc<Profile>,
    params: ProfileParams,
    phase: ProfilePhase,
    run_start: Option<f64>,
    step_start: f64,
    entered: Option<usize>,
    commands_issued: usize,
}

impl ProfileStepper {
    pub fn new(profile: Arc<Profile>, params: ProfileParams) -> Self {
        let mut s = Self {
            profile,
            params,
            phase: ProfilePhase::Heating,
            run_start: None,
            step_start: 0.0,
            entered: None,
            commands_issued: 0,
        };
        s.start();
        s
    }

    pub fn profile_phase(&self) -> ProfilePhase {
        self.phase
    }

    /// Number of step commands written since `start`.
    pub fn commands_issued(&self) -> usize {
        self.commands_issued
    }

    /// Seconds since the first run tick, if the run has begun.
    pub fn elapsed(&self, state: &MachineState) -> Option<f64> {
        self.run_start.map(|t0| state.sample_time - t0)
    }

    fn enter(&mut self, i: usize, t: f64, out: &mut ControlOutput) {
        let step: Step = self.profile.steps()[i];
        self.phase = ProfilePhase::Step(i);
        self.step_start = t;
        self.entered = Some(i);
        self.commands_issued += 1;

        let cmd = &mut out.command;
        cmd.flow_direction = FlowDirection::Group;
        cmd.pump_mode = step.control.pump_mode();
        cmd.pump_cmd = step.setpoint;
        cmd.water_temp_cmd = step.water_temp;
        cmd.group_temp_cmd = step.group_temp;
        out.logging = true;
        tracing::info!(
            profile = self.profile.name(),
            step = i,
            control = ?step.control,
            setpoint = step.setpoint,
            t,
            "profile step"
        );
    }

    fn finish(&mut self, out: &mut ControlOutput) {
        self.phase = ProfilePhase::Finished;
        out.halt();
        tracing::info!(profile = self.profile.name(), "profile finished");
    }
}

impl Mode for ProfileStepper {
    fn title(&self) -> &str {
        self.profile.name()
    }

    fn start(&mut self) {
        self.phase = if self.params.heat_gate {
            ProfilePhase::Heating
        } else {
            ProfilePhase::Step(0)
        };
        self.run_start = None;
        self.step_start = 0.0;
        self.entered = None;
        self.commands_issued = 0;
    }

    fn run(&mut self, state: &MachineState, out: &mut ControlOutput) {
        let t = state.sample_time;
        if self.run_start.is_none() {
            self.run_start = Some(t);
            out.command.tare.request();
            out.request_clear_log();
        }
        match self.phase {
            ProfilePhase::Heating => {
                let first = *self.profile.first();
                let cmd = &mut out.command;
                cmd.flow_direction = FlowDirection::Tank;
                cmd.pump_mode = PumpMode::Disabled;
                cmd.pump_cmd = 0.0;
                cmd.water_temp_cmd = first.water_temp;
                cmd.group_temp_cmd = first.group_temp;
                let tol = self.params.heat_tolerance;
                if within(state.water_temp, first.water_temp, tol)
                    && within(state.group_temp, first.group_temp, tol)
                {
                    self.enter(0, t, out);
                }
            }
            ProfilePhase::Step(i) => {
                if self.entered != Some(i) {
                    self.enter(i, t, out);
                    return;
                }
                let step = self.profile.steps()[i];
                let elapsed = t - self.step_start;
                if step.is_complete(state, elapsed, self.params.pressure_below_min_s) {
                    if i + 1 < self.profile.len() {
                        self.enter(i + 1, t, out);
                    } else {
                        self.finish(out);
                    }
                }
            }
            ProfilePhase::Finished => out.halt(),
        }
    }

    fn exit(&mut self, state: &MachineState, out: &mut ControlOutput) -> bool {
        let safe = matches!(self.phase, ProfilePhase::Finished | ProfilePhase::Heating)
            || state.pressure <= self.params.safe_exit_pressure;
        if safe {
            out.halt();
        }
        safe
    }

    fn phase(&self) -> PhaseView {
        match self.phase {
            ProfilePhase::Heating => PhaseView::steady("heating"),
            ProfilePhase::Step(i) => PhaseView {
                phase: "step",
                done: false,
                step: Some(i),
            },
            ProfilePhase::Finished => PhaseView {
                phase: "finished",
                done: true,
                step: None,
            },
        }
    }
}
