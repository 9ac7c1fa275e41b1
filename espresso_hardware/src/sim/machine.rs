use std::time::Duration;

use espresso_traits::{Clock, LinkError, MachineCommand, MachineLink, MachineState};

use super::plant::{Plant, PlantParams};

/// Simulated machine behind the `MachineLink` contract.
///
/// Each `sample` advances the plant by a fixed step under the last command
/// received. With a pacing clock the call also sleeps that step, so a loop
/// around it runs at the plant's rate; without one it returns immediately and
/// time is purely virtual.
pub struct SimulatedMachine {
    plant: Plant,
    state: MachineState,
    cmd: MachineCommand,
    dt: Duration,
    pacing: Option<Box<dyn Clock + Send>>,
}

impl SimulatedMachine {
    pub fn new(params: PlantParams, seed: u64, dt: Duration) -> Self {
        Self {
            state: params.ambient_state(),
            plant: Plant::new(params, seed),
            cmd: MachineCommand::default(),
            dt,
            pacing: None,
        }
    }

    /// Start from `state` instead of ambient.
    pub fn with_state(mut self, state: MachineState) -> Self {
        self.state = state;
        self
    }

    /// Sleep one step on `clock` per sample.
    pub fn paced(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.pacing = Some(Box::new(clock));
        self
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Last command received.
    pub fn command(&self) -> &MachineCommand {
        &self.cmd
    }

    pub fn dt(&self) -> Duration {
        self.dt
    }

    /// Advance one step. A tare applies to this step only.
    pub fn advance(&mut self) -> MachineState {
        if let Some(clock) = &self.pacing {
            clock.sleep(self.dt);
        }
        self.state = self.plant.step(&self.state, &self.cmd, self.dt.as_secs_f64());
        if self.cmd.tare.take() {
            tracing::trace!(t = self.state.sample_time, "simulated tare");
        }
        self.state
    }

    /// Replace the pending command, keeping an undelivered tare armed.
    pub fn apply(&mut self, cmd: &MachineCommand) {
        let tare = self.cmd.tare.is_armed() || cmd.tare.is_armed();
        self.cmd = *cmd;
        if tare {
            self.cmd.tare.request();
        }
    }
}

impl MachineLink for SimulatedMachine {
    fn sample(&mut self, _timeout: Duration) -> Result<MachineState, LinkError> {
        Ok(self.advance())
    }

    fn send(&mut self, cmd: &MachineCommand) -> Result<(), LinkError> {
        self.apply(cmd);
        Ok(())
    }
}
