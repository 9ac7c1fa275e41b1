//! Brewing modes.
//!
//! Every mode implements [`Mode`]; the supervisor holds exactly one
//! [`ActiveMode`] and is the only caller, so only the active mode ever writes
//! the pending command.

mod basic;
mod shot;
mod stepper;

pub use basic::{FlushMode, IdleMode, ManualMode, PreheatMode, SteamMode};
pub use shot::{ShotPhase, ShotSequencer};
pub use stepper::{ProfilePhase, ProfileStepper};

use crate::config::{FlushParams, PreheatParams, ProfileParams, ShotParams, SteamParams};
use crate::exchange::ControlOutput;
use crate::profile::Profile;
use espresso_traits::MachineState;
use serde::Serialize;
use std::sync::Arc;

pub const IDLE: &str = "Idle";
pub const PREHEAT: &str = "Preheat";
pub const FLUSH: &str = "Flush";
pub const MANUAL: &str = "Manual";
pub const STEAM: &str = "Steam";
pub const NINE_BAR: &str = "Nine Bar";

/// Read-only view of a mode's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseView {
    pub phase: &'static str,
    /// The mode has nothing left to do.
    pub done: bool,
    /// Current step index for profile modes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl PhaseView {
    pub const fn steady(phase: &'static str) -> Self {
        Self {
            phase,
            done: false,
            step: None,
        }
    }
}

pub trait Mode {
    fn title(&self) -> &str;

    /// Reset to the initial sub-phase.
    fn start(&mut self);

    /// Write the command for this tick and advance the sub-phase.
    fn run(&mut self, state: &MachineState, out: &mut ControlOutput);

    /// Idempotently zero the command and stop logging.
    fn stop(&mut self, _state: &MachineState, out: &mut ControlOutput) {
        out.halt();
    }

    /// Clean up for a switch away; returns whether switching is safe now.
    fn exit(&mut self, _state: &MachineState, out: &mut ControlOutput) -> bool {
        out.halt();
        true
    }

    fn phase(&self) -> PhaseView;
}

/// The closed set of modes the supervisor can hold.
#[derive(Debug, Clone)]
pub enum ActiveMode {
    Idle(IdleMode),
    Preheat(PreheatMode),
    Flush(FlushMode),
    Manual(ManualMode),
    Steam(SteamMode),
    Shot(ShotSequencer),
    Profile(ProfileStepper),
}

impl ActiveMode {
    fn as_mode(&self) -> &dyn Mode {
        match self {
            Self::Idle(m) => m,
            Self::Preheat(m) => m,
            Self::Flush(m) => m,
            Self::Manual(m) => m,
            Self::Steam(m) => m,
            Self::Shot(m) => m,
            Self::Profile(m) => m,
        }
    }

    fn as_mode_mut(&mut self) -> &mut dyn Mode {
        match self {
            Self::Idle(m) => m,
            Self::Preheat(m) => m,
            Self::Flush(m) => m,
            Self::Manual(m) => m,
            Self::Steam(m) => m,
            Self::Shot(m) => m,
            Self::Profile(m) => m,
        }
    }
}

impl Mode for ActiveMode {
    fn title(&self) -> &str {
        self.as_mode().title()
    }

    fn start(&mut self) {
        self.as_mode_mut().start();
    }

    fn run(&mut self, state: &MachineState, out: &mut ControlOutput) {
        self.as_mode_mut().run(state, out);
    }

    fn stop(&mut self, state: &MachineState, out: &mut ControlOutput) {
        self.as_mode_mut().stop(state, out);
    }

    fn exit(&mut self, state: &MachineState, out: &mut ControlOutput) -> bool {
        self.as_mode_mut().exit(state, out)
    }

    fn phase(&self) -> PhaseView {
        self.as_mode().phase()
    }
}

/// Recipe for a fresh mode instance; the registry stores these.
#[derive(Debug, Clone)]
pub enum ModeSpec {
    Idle,
    Preheat(PreheatParams),
    Flush(FlushParams),
    Manual,
    Steam(SteamParams),
    Shot(ShotParams),
    Profile {
        profile: Arc<Profile>,
        params: ProfileParams,
    },
}

impl ModeSpec {
    pub fn title(&self) -> &str {
        match self {
            Self::Idle => IDLE,
            Self::Preheat(_) => PREHEAT,
            Self::Flush(_) => FLUSH,
            Self::Manual => MANUAL,
            Self::Steam(_) => STEAM,
            Self::Shot(_) => NINE_BAR,
            Self::Profile { profile, .. } => profile.name(),
        }
    }

    pub fn instantiate(&self) -> ActiveMode {
        match self {
            Self::Idle => ActiveMode::Idle(IdleMode),
            Self::Preheat(p) => ActiveMode::Preheat(PreheatMode::new(*p)),
            Self::Flush(p) => ActiveMode::Flush(FlushMode::new(*p)),
            Self::Manual => ActiveMode::Manual(ManualMode::default()),
            Self::Steam(p) => ActiveMode::Steam(SteamMode::new(*p)),
            Self::Shot(p) => ActiveMode::Shot(ShotSequencer::new(*p)),
            Self::Profile { profile, params } => {
                ActiveMode::Profile(ProfileStepper::new(profile.clone(), *params))
            }
        }
    }
}
