//! Runtime parameter types for the modes and the machine interface.
//!
//! These are separate from the TOML-deserialized config in `espresso_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

/// Targets for the preheat mode: circulate at `flow` to the tank while the
/// heaters track their setpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreheatParams {
    pub flow: f32,
    pub water_temp: f32,
    pub group_temp: f32,
}

impl Default for PreheatParams {
    fn default() -> Self {
        Self {
            flow: 2.0,
            water_temp: 93.0,
            group_temp: 93.0,
        }
    }
}

/// Targets for the flush mode (flow through the group).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushParams {
    pub flow: f32,
    pub water_temp: f32,
    pub group_temp: f32,
}

impl Default for FlushParams {
    fn default() -> Self {
        Self {
            flow: 4.0,
            water_temp: 93.0,
            group_temp: 93.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteamParams {
    pub water_temp: f32,
    pub group_temp: f32,
}

impl Default for SteamParams {
    fn default() -> Self {
        Self {
            water_temp: 140.0,
            group_temp: 93.0,
        }
    }
}

/// Parameters of the fixed nine-bar shot sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotParams {
    /// Flow while waiting for temperature (ml/s, to tank).
    pub preheat_flow: f32,
    pub water_temp: f32,
    pub group_temp: f32,
    /// Both temperatures must be strictly within this band (°C).
    pub temp_tolerance: f32,
    /// Drip purge duration (s of sample time).
    pub purge_s: f64,
    /// Pre-infusion flow added per tick (ml/s).
    pub pi_flow_step: f32,
    /// Pressure that ends pre-infusion (bar).
    pub pi_end_pressure: f32,
    pub shot_pressure: f32,
    /// Cup weight that ends the shot (g).
    pub shot_weight: f32,
    /// Drip dwell after the shot (s of sample time).
    pub end_dwell_s: f64,
    /// Mode changes are refused above this pressure (bar).
    pub safe_exit_pressure: f32,
}

impl Default for ShotParams {
    fn default() -> Self {
        Self {
            preheat_flow: 2.0,
            water_temp: 93.0,
            group_temp: 93.0,
            temp_tolerance: 0.5,
            purge_s: 2.0,
            pi_flow_step: 0.01,
            pi_end_pressure: 4.0,
            shot_pressure: 9.0,
            shot_weight: 32.0,
            end_dwell_s: 2.0,
            safe_exit_pressure: 1.0,
        }
    }
}

/// Behaviour shared by every profile-driven mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    /// Hold the pump off until step 0 temperatures are reached.
    pub heat_gate: bool,
    pub heat_tolerance: f32,
    /// `Press <` exits only after the step has run this long (s).
    pub pressure_below_min_s: f64,
    pub safe_exit_pressure: f32,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            heat_gate: true,
            heat_tolerance: 1.0,
            pressure_below_min_s: 1.0,
            safe_exit_pressure: 1.0,
        }
    }
}

/// Everything needed to build the standard mode set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModeParams {
    pub preheat: PreheatParams,
    pub flush: FlushParams,
    pub steam: SteamParams,
    pub shot: ShotParams,
    pub profile: ProfileParams,
}

/// Read timeout and failure backoff of the I/O loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub read_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(100),
        }
    }
}
