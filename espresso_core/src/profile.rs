//! Validated brew profiles: ordered steps with an exit condition each.

use crate::error::BuildError;
use espresso_traits::{MachineState, PumpMode};

/// Pump control quantity of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Pressure,
    Flow,
}

impl ControlMode {
    pub fn pump_mode(self) -> PumpMode {
        match self {
            Self::Pressure => PumpMode::Pressure,
            Self::Flow => PumpMode::Flow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCondition {
    /// Step elapsed time (s) reaches the value.
    Time,
    WeightAbove,
    PressureAbove,
    /// Pressure falls to the value, once the step has run a minimum time.
    PressureBelow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub control: ControlMode,
    pub setpoint: f32,
    pub water_temp: f32,
    pub group_temp: f32,
    pub exit: ExitCondition,
    pub exit_value: f32,
}

impl Step {
    /// Whether this step is finished given the latest state and the time
    /// spent in it.
    pub fn is_complete(&self, state: &MachineState, elapsed_s: f64, below_min_s: f64) -> bool {
        match self.exit {
            ExitCondition::Time => elapsed_s >= f64::from(self.exit_value),
            ExitCondition::WeightAbove => state.weight >= self.exit_value,
            ExitCondition::PressureAbove => state.pressure >= self.exit_value,
            ExitCondition::PressureBelow => {
                elapsed_s >= below_min_s && state.pressure <= self.exit_value
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    name: String,
    steps: Vec<Step>,
}

impl Profile {
    /// Build a profile; fails on an empty step list or non-finite values.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self, BuildError> {
        let name = name.into();
        let invalid = |reason: String| BuildError::InvalidProfile {
            name: name.clone(),
            reason,
        };
        if steps.is_empty() {
            return Err(invalid("no steps".into()));
        }
        for (i, s) in steps.iter().enumerate() {
            let values = [s.setpoint, s.water_temp, s.group_temp, s.exit_value];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(invalid(format!("step {i} has a non-finite value")));
            }
            if s.setpoint < 0.0 || s.exit_value < 0.0 {
                return Err(invalid(format!("step {i} has a negative value")));
            }
        }
        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn first(&self) -> &Step {
        // Non-empty by construction.
        &self.steps[0]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
