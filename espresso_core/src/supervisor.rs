//! Mode supervisor: a guarded state machine over registered modes.
//!
//! Holds exactly one active mode and a `running` flag. A transition replaces
//! the active mode only when the target is registered, is not already
//! active, and the active mode's exit guard agrees. Refused requests change
//! nothing; the returned [`TransitionOutcome`] says why.

use crate::error::BuildError;
use crate::exchange::ControlOutput;
use crate::modes::{ActiveMode, Mode, PhaseView};
use crate::registry::ModeRegistry;
use espresso_traits::{MachineCommand, MachineState};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Switched,
    AlreadyActive,
    UnknownMode,
    /// The active mode's exit guard said it is not safe to leave yet.
    GuardRejected,
}

impl TransitionOutcome {
    pub fn is_switched(self) -> bool {
        self == Self::Switched
    }
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    registry: ModeRegistry,
    active: ActiveMode,
    running: bool,
}

impl Supervisor {
    /// Start in `initial`, stopped.
    pub fn new(registry: ModeRegistry, initial: &str) -> Result<Self, BuildError> {
        let active = registry
            .get(initial)
            .ok_or_else(|| BuildError::UnknownInitialMode(initial.to_string()))?
            .instantiate();
        Ok(Self {
            registry,
            active,
            running: false,
        })
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    pub fn active(&self) -> &ActiveMode {
        &self.active
    }

    pub fn active_title(&self) -> &str {
        self.active.title()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn phase(&self) -> PhaseView {
        self.active.phase()
    }

    pub fn transition(
        &mut self,
        title: &str,
        state: &MachineState,
        out: &mut ControlOutput,
    ) -> TransitionOutcome {
        let Some(spec) = self.registry.get(title) else {
            tracing::debug!(target_mode = title, "transition to unknown mode ignored");
            return TransitionOutcome::UnknownMode;
        };
        if self.active.title() == title {
            tracing::debug!(target_mode = title, "mode already active");
            return TransitionOutcome::AlreadyActive;
        }
        if !self.active.exit(state, out) {
            tracing::info!(
                from = self.active.title(),
                to = title,
                pressure = state.pressure,
                "transition refused by exit guard"
            );
            return TransitionOutcome::GuardRejected;
        }
        let next = spec.instantiate();
        tracing::info!(from = self.active.title(), to = title, "mode transition");
        self.active = next;
        self.running = false;
        TransitionOutcome::Switched
    }

    pub fn start(&mut self) {
        self.active.start();
        self.running = true;
        tracing::info!(mode = self.active.title(), "mode started");
    }

    pub fn stop(&mut self) {
        if self.running {
            tracing::info!(mode = self.active.title(), "mode stopped");
        }
        self.running = false;
    }

    /// Run the active mode if running, otherwise hold it stopped.
    pub fn tick(&mut self, state: &MachineState, out: &mut ControlOutput) {
        if self.running {
            self.active.run(state, out);
        } else {
            self.active.stop(state, out);
        }
    }

    /// Hand an operator command to the Manual mode. Returns false (and does
    /// nothing) when another mode is active.
    pub fn set_manual(&mut self, cmd: MachineCommand) -> bool {
        match &mut self.active {
            ActiveMode::Manual(m) => {
                m.set(cmd);
                true
            }
            _ => false,
        }
    }
}
