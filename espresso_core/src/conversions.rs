//! `From` implementations bridging `espresso_config` types to `espresso_core`
//! types, plus the hardware-side mappings the CLI needs to build a link.

use crate::config::{
    FlushParams, LinkTiming, ModeParams, PreheatParams, ProfileParams, ShotParams, SteamParams,
};
use crate::error::BuildError;
use crate::profile::{ControlMode, ExitCondition, Profile, Step};
use espresso_config::{ControlKind, ExitKind, ProfileLibrary, StepDef};
use std::sync::Arc;
use std::time::Duration;

// ── Mode parameters ──────────────────────────────────────────────────────────

impl From<&espresso_config::PreheatCfg> for PreheatParams {
    fn from(c: &espresso_config::PreheatCfg) -> Self {
        Self {
            flow: c.flow,
            water_temp: c.water_temp,
            group_temp: c.group_temp,
        }
    }
}

impl From<&espresso_config::FlushCfg> for FlushParams {
    fn from(c: &espresso_config::FlushCfg) -> Self {
        Self {
            flow: c.flow,
            water_temp: c.water_temp,
            group_temp: c.group_temp,
        }
    }
}

impl From<&espresso_config::SteamCfg> for SteamParams {
    fn from(c: &espresso_config::SteamCfg) -> Self {
        Self {
            water_temp: c.water_temp,
            group_temp: c.group_temp,
        }
    }
}

impl From<&espresso_config::ShotCfg> for ShotParams {
    fn from(c: &espresso_config::ShotCfg) -> Self {
        Self {
            preheat_flow: c.preheat_flow,
            water_temp: c.water_temp,
            group_temp: c.group_temp,
            temp_tolerance: c.temp_tolerance,
            purge_s: c.purge_s,
            pi_flow_step: c.pi_flow_step,
            pi_end_pressure: c.pi_end_pressure,
            shot_pressure: c.shot_pressure,
            shot_weight: c.shot_weight,
            end_dwell_s: c.end_dwell_s,
            safe_exit_pressure: c.safe_exit_pressure,
        }
    }
}

impl From<&espresso_config::ProfileCfg> for ProfileParams {
    fn from(c: &espresso_config::ProfileCfg) -> Self {
        Self {
            heat_gate: c.heat_gate,
            heat_tolerance: c.heat_tolerance,
            pressure_below_min_s: c.pressure_below_min_s,
            safe_exit_pressure: c.safe_exit_pressure,
        }
    }
}

impl From<&espresso_config::Config> for ModeParams {
    fn from(c: &espresso_config::Config) -> Self {
        Self {
            preheat: (&c.preheat).into(),
            flush: (&c.flush).into(),
            steam: (&c.steam).into(),
            shot: (&c.shot).into(),
            profile: (&c.profile).into(),
        }
    }
}

// ── Link timing ──────────────────────────────────────────────────────────────

impl From<&espresso_config::LinkCfg> for LinkTiming {
    fn from(c: &espresso_config::LinkCfg) -> Self {
        Self {
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            retry_backoff: Duration::from_millis(c.retry_backoff_ms),
        }
    }
}

// ── Profiles ─────────────────────────────────────────────────────────────────

impl From<ControlKind> for ControlMode {
    fn from(k: ControlKind) -> Self {
        match k {
            ControlKind::Pressure => Self::Pressure,
            ControlKind::Flow => Self::Flow,
        }
    }
}

impl From<ExitKind> for ExitCondition {
    fn from(k: ExitKind) -> Self {
        match k {
            ExitKind::Time => Self::Time,
            ExitKind::WeightAbove => Self::WeightAbove,
            ExitKind::PressureAbove => Self::PressureAbove,
            ExitKind::PressureBelow => Self::PressureBelow,
        }
    }
}

impl From<&StepDef> for Step {
    fn from(d: &StepDef) -> Self {
        Self {
            control: d.control.into(),
            setpoint: d.setpoint,
            water_temp: d.water_temp,
            group_temp: d.group_temp,
            exit: d.exit.into(),
            exit_value: d.exit_value,
        }
    }
}

/// Validate every profile in a persisted library, in name order.
pub fn profiles_from_library(lib: &ProfileLibrary) -> Result<Vec<Arc<Profile>>, BuildError> {
    lib.iter()
        .map(|(name, defs)| {
            let steps = defs.iter().map(Step::from).collect();
            Profile::new(name.clone(), steps).map(Arc::new)
        })
        .collect()
}

// ── Hardware ─────────────────────────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub mod hardware {
    use espresso_hardware::codec::{ChannelSet, CommandCodec, TelemetryLayout};
    use espresso_hardware::{NoiseLevels, PlantParams};

    pub fn telemetry_layout(c: &espresso_config::LinkCfg) -> TelemetryLayout {
        let channels = match c.channels {
            espresso_config::Channels::Basic => ChannelSet::Basic,
            espresso_config::Channels::DualTemp => ChannelSet::DualTemp,
            espresso_config::Channels::Weighted => ChannelSet::Weighted,
        };
        TelemetryLayout::new(c.samples_per_packet, channels)
    }

    pub fn command_codec(c: &espresso_config::LinkCfg) -> CommandCodec {
        match c.command_codec {
            espresso_config::CommandCodec::Ascii => CommandCodec::Ascii,
            espresso_config::CommandCodec::Packed => CommandCodec::Packed,
        }
    }

    pub fn plant_params(c: &espresso_config::SimulatorCfg) -> PlantParams {
        PlantParams {
            alpha_water: c.alpha_water,
            alpha_heater: c.alpha_heater,
            alpha_group: c.alpha_group,
            alpha_hydraulic: c.alpha_hydraulic,
            resistance_group: c.resistance_group,
            resistance_open: c.resistance_open,
            ambient_c: c.ambient_c,
            noise: NoiseLevels {
                pressure: c.noise.pressure,
                flow: c.noise.flow,
                temperature: c.noise.temperature,
                weight: c.noise.weight,
                derived: c.noise.derived,
            },
        }
    }
}
