#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and profile library for the espresso controller.
//!
//! - `Config` and its sections are deserialized from TOML and checked by
//!   [`Config::validate`]. Every section is optional and falls back to the
//!   defaults below.
//! - Brew profiles live in a separate JSON file keyed by profile name; see
//!   the [`profiles`] module.
use serde::Deserialize;

pub mod profiles;

pub use profiles::{
    ControlKind, ExitKind, ProfileLibrary, StepDef, load_profiles_json, parse_profiles_json,
    save_profiles_json,
};

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// In-process plant simulator
    #[default]
    Sim,
    /// Byte-stream bridge to the machine (serial-over-TCP adapter)
    Tcp,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandCodec {
    #[default]
    Ascii,
    Packed,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channels {
    Basic,
    DualTemp,
    #[default]
    Weighted,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkCfg {
    pub kind: LinkKind,
    /// `host:port` of the bridge; required for `kind = "tcp"`
    pub address: Option<String>,
    pub command_codec: CommandCodec,
    /// Samples per telemetry packet (N)
    pub samples_per_packet: usize,
    pub channels: Channels,
    /// Bounded wait for one telemetry packet
    pub read_timeout_ms: u64,
    /// Pause after a failed read before retrying
    pub retry_backoff_ms: u64,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            kind: LinkKind::Sim,
            address: None,
            command_codec: CommandCodec::Ascii,
            samples_per_packet: 10,
            channels: Channels::Weighted,
            read_timeout_ms: 100,
            retry_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SupervisorCfg {
    /// Logic loop rate
    pub tick_hz: u32,
    /// Title of the mode active at startup
    pub initial_mode: String,
}

impl Default for SupervisorCfg {
    fn default() -> Self {
        Self {
            tick_hz: 50,
            initial_mode: "Idle".to_string(),
        }
    }
}

/// Tank recirculation while heating.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PreheatCfg {
    pub flow: f32,
    pub water_temp: f32,
    pub group_temp: f32,
}

impl Default for PreheatCfg {
    fn default() -> Self {
        Self {
            flow: 2.0,
            water_temp: 93.0,
            group_temp: 93.0,
        }
    }
}

/// Water through the group with no puck.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FlushCfg {
    pub flow: f32,
    pub water_temp: f32,
    pub group_temp: f32,
}

impl Default for FlushCfg {
    fn default() -> Self {
        Self {
            flow: 4.0,
            water_temp: 93.0,
            group_temp: 93.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SteamCfg {
    pub water_temp: f32,
    pub group_temp: f32,
}

impl Default for SteamCfg {
    fn default() -> Self {
        Self {
            water_temp: 140.0,
            group_temp: 93.0,
        }
    }
}

/// Fixed preheat → purge → preinfuse → shot → end sequence.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ShotCfg {
    pub preheat_flow: f32,
    pub water_temp: f32,
    pub group_temp: f32,
    /// Both temperatures must be within this band to leave preheat (°C)
    pub temp_tolerance: f32,
    /// Drip-tray purge window (s)
    pub purge_s: f64,
    /// Preinfusion flow ramp per logic tick (mL/s)
    pub pi_flow_step: f32,
    pub pi_end_pressure: f32,
    pub shot_pressure: f32,
    pub shot_weight: f32,
    /// Bleed to drip tray before parking (s)
    pub end_dwell_s: f64,
    /// Switching away mid-shot is allowed at or below this pressure (bar)
    pub safe_exit_pressure: f32,
}

impl Default for ShotCfg {
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

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ProfileCfg {
    /// Hold the pump until step 0 temperatures are reached
    pub heat_gate: bool,
    pub heat_tolerance: f32,
    /// Minimum time in step before a "pressure below" exit may fire (s)
    pub pressure_below_min_s: f64,
    pub safe_exit_pressure: f32,
}

impl Default for ProfileCfg {
    fn default() -> Self {
        Self {
            heat_gate: true,
            heat_tolerance: 1.0,
            pressure_below_min_s: 1.0,
            safe_exit_pressure: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct NoiseCfg {
    pub pressure: f32,
    pub flow: f32,
    pub temperature: f32,
    pub weight: f32,
    pub derived: f32,
}

impl Default for NoiseCfg {
    fn default() -> Self {
        Self {
            pressure: 0.02,
            flow: 0.02,
            temperature: 0.05,
            weight: 0.01,
            derived: 0.0005,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SimulatorCfg {
    pub seed: u64,
    /// Plant step (ms); the simulator sleeps this long per sample
    pub dt_ms: u64,
    pub alpha_water: f32,
    pub alpha_heater: f32,
    pub alpha_group: f32,
    pub alpha_hydraulic: f32,
    pub resistance_group: f32,
    pub resistance_open: f32,
    pub ambient_c: f32,
    pub noise: NoiseCfg,
}

impl Default for SimulatorCfg {
    fn default() -> Self {
        Self {
            seed: 0,
            dt_ms: 10,
            alpha_water: 0.15,
            alpha_heater: 0.08,
            alpha_group: 0.05,
            alpha_hydraulic: 0.2,
            resistance_group: 5.0,
            resistance_open: 0.01,
            ambient_c: 20.0,
            noise: NoiseCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Brew data log (command ∥ state rows).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataLogCfg {
    pub dir: String,
}

impl Default for DataLogCfg {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub link: LinkCfg,
    pub supervisor: SupervisorCfg,
    pub preheat: PreheatCfg,
    pub flush: FlushCfg,
    pub steam: SteamCfg,
    pub shot: ShotCfg,
    pub profile: ProfileCfg,
    pub simulator: SimulatorCfg,
    pub logging: Logging,
    pub data_log: DataLogCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn check_temp(name: &str, v: f32) -> eyre::Result<()> {
    if !v.is_finite() || !(0.0..=200.0).contains(&v) {
        eyre::bail!("{name} must be within 0..=200 °C, got {v}");
    }
    Ok(())
}

fn check_positive(name: &str, v: f32) -> eyre::Result<()> {
    if !v.is_finite() || v <= 0.0 {
        eyre::bail!("{name} must be > 0, got {v}");
    }
    Ok(())
}

fn check_alpha(name: &str, v: f32) -> eyre::Result<()> {
    if !(v > 0.0 && v <= 1.0) {
        eyre::bail!("{name} must be in (0, 1], got {v}");
    }
    Ok(())
}

impl Config {
    /// Check ranges and cross-field requirements.
    pub fn validate(&self) -> eyre::Result<()> {
        let l = &self.link;
        if l.kind == LinkKind::Tcp && l.address.as_deref().is_none_or(str::is_empty) {
            eyre::bail!("link.address is required when link.kind = \"tcp\"");
        }
        if l.samples_per_packet == 0 {
            eyre::bail!("link.samples_per_packet must be >= 1");
        }
        if l.read_timeout_ms == 0 {
            eyre::bail!("link.read_timeout_ms must be > 0");
        }

        let s = &self.supervisor;
        if !(1..=1000).contains(&s.tick_hz) {
            eyre::bail!("supervisor.tick_hz must be within 1..=1000, got {}", s.tick_hz);
        }
        if s.initial_mode.trim().is_empty() {
            eyre::bail!("supervisor.initial_mode must not be empty");
        }

        check_positive("preheat.flow", self.preheat.flow)?;
        check_temp("preheat.water_temp", self.preheat.water_temp)?;
        check_temp("preheat.group_temp", self.preheat.group_temp)?;
        check_positive("flush.flow", self.flush.flow)?;
        check_temp("flush.water_temp", self.flush.water_temp)?;
        check_temp("flush.group_temp", self.flush.group_temp)?;
        check_temp("steam.water_temp", self.steam.water_temp)?;
        check_temp("steam.group_temp", self.steam.group_temp)?;

        let sh = &self.shot;
        check_positive("shot.preheat_flow", sh.preheat_flow)?;
        check_temp("shot.water_temp", sh.water_temp)?;
        check_temp("shot.group_temp", sh.group_temp)?;
        check_positive("shot.temp_tolerance", sh.temp_tolerance)?;
        check_positive("shot.pi_flow_step", sh.pi_flow_step)?;
        check_positive("shot.pi_end_pressure", sh.pi_end_pressure)?;
        check_positive("shot.shot_pressure", sh.shot_pressure)?;
        check_positive("shot.shot_weight", sh.shot_weight)?;
        if !(sh.purge_s.is_finite() && sh.purge_s >= 0.0) {
            eyre::bail!("shot.purge_s must be >= 0, got {}", sh.purge_s);
        }
        if !(sh.end_dwell_s.is_finite() && sh.end_dwell_s >= 0.0) {
            eyre::bail!("shot.end_dwell_s must be >= 0, got {}", sh.end_dwell_s);
        }
        if !(sh.safe_exit_pressure.is_finite() && sh.safe_exit_pressure >= 0.0) {
            eyre::bail!("shot.safe_exit_pressure must be >= 0");
        }

        let p = &self.profile;
        check_positive("profile.heat_tolerance", p.heat_tolerance)?;
        if !(p.pressure_below_min_s.is_finite() && p.pressure_below_min_s >= 0.0) {
            eyre::bail!("profile.pressure_below_min_s must be >= 0");
        }
        if !(p.safe_exit_pressure.is_finite() && p.safe_exit_pressure >= 0.0) {
            eyre::bail!("profile.safe_exit_pressure must be >= 0");
        }

        let sim = &self.simulator;
        if sim.dt_ms == 0 {
            eyre::bail!("simulator.dt_ms must be > 0");
        }
        check_alpha("simulator.alpha_water", sim.alpha_water)?;
        check_alpha("simulator.alpha_heater", sim.alpha_heater)?;
        check_alpha("simulator.alpha_group", sim.alpha_group)?;
        check_alpha("simulator.alpha_hydraulic", sim.alpha_hydraulic)?;
        check_positive("simulator.resistance_group", sim.resistance_group)?;
        check_positive("simulator.resistance_open", sim.resistance_open)?;
        let n = &sim.noise;
        for (name, v) in [
            ("pressure", n.pressure),
            ("flow", n.flow),
            ("temperature", n.temperature),
            ("weight", n.weight),
            ("derived", n.derived),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                eyre::bail!("simulator.noise.{name} must be >= 0, got {v}");
            }
        }

        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {r:?}");
        }
        if self.data_log.dir.trim().is_empty() {
            eyre::bail!("data_log.dir must not be empty");
        }
        Ok(())
    }
}
