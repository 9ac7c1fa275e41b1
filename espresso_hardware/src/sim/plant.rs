//! First-order plant model of the machine.
//!
//! Thermal channels smooth exponentially toward their setpoints. Pressure and
//! flow are coupled through a resistance that depends on where the water is
//! routed. Weight integrates flow into the cup. Every channel then gets
//! additive Gaussian noise from a seeded generator, so a run is reproducible
//! for a given seed and exactly noiseless with zero noise levels.

use std::f32::consts::TAU;

use espresso_traits::{FlowDirection, MachineCommand, MachineState, PumpMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Pump geometry used for the derived velocity and torque channels (m).
const PUMP_RADIUS: f32 = 0.33;
/// Thermal mass of the group and the heater block (J/°C).
const THERMAL_MASS: f32 = 200.0;
/// Group heat loss coefficient (W/°C).
const GROUP_LOSS: f32 = 0.02;
/// Specific heat of water (J/g·°C).
const WATER_HEAT: f32 = 4.2;

/// Standard deviation of the additive noise per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseLevels {
    pub pressure: f32,
    pub flow: f32,
    pub temperature: f32,
    pub weight: f32,
    /// Velocity, torque and power channels.
    pub derived: f32,
}

impl NoiseLevels {
    pub const NONE: Self = Self {
        pressure: 0.0,
        flow: 0.0,
        temperature: 0.0,
        weight: 0.0,
        derived: 0.0,
    };
}

impl Default for NoiseLevels {
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

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantParams {
    pub alpha_water: f32,
    pub alpha_heater: f32,
    pub alpha_group: f32,
    /// Smoothing of the controlled hydraulic channel (pressure or flow).
    pub alpha_hydraulic: f32,
    /// Resistance when routed through the puck.
    pub resistance_group: f32,
    /// Resistance when venting to tank, drip tray, spout or steam wand.
    pub resistance_open: f32,
    /// Starting temperature of every thermal channel (°C).
    pub ambient_c: f32,
    pub noise: NoiseLevels,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            alpha_water: 0.15,
            alpha_heater: 0.08,
            alpha_group: 0.05,
            alpha_hydraulic: 0.2,
            resistance_group: 5.0,
            resistance_open: 0.01,
            ambient_c: 20.0,
            noise: NoiseLevels::default(),
        }
    }
}

impl PlantParams {
    pub fn resistance(&self, dir: FlowDirection) -> f32 {
        match dir {
            FlowDirection::Group => self.resistance_group,
            FlowDirection::Tank
            | FlowDirection::Drip
            | FlowDirection::Spout
            | FlowDirection::Steam => self.resistance_open,
        }
    }

    /// Machine at rest at ambient temperature.
    pub fn ambient_state(&self) -> MachineState {
        MachineState {
            water_temp: self.ambient_c,
            heater_temp: self.ambient_c,
            group_temp: self.ambient_c,
            ..MachineState::default()
        }
    }
}

#[inline]
fn smooth(x: f32, target: f32, alpha: f32) -> f32 {
    (1.0 - alpha) * x + alpha * target
}

pub struct Plant {
    params: PlantParams,
    rng: StdRng,
}

impl Plant {
    pub fn new(params: PlantParams, seed: u64) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &PlantParams {
        &self.params
    }

    fn noise(&mut self, sigma: f32) -> f32 {
        if sigma == 0.0 {
            return 0.0;
        }
        let z: f32 = self.rng.sample(StandardNormal);
        sigma * z
    }

    /// Advance the plant by `dt` seconds under `cmd`.
    ///
    /// An armed tare in `cmd` zeroes the weight; the caller is responsible
    /// for disarming it afterwards.
    pub fn step(&mut self, state: &MachineState, cmd: &MachineCommand, dt: f64) -> MachineState {
        let p = self.params;
        let dt_s = dt as f32;
        let r = p.resistance(cmd.flow_direction);
        let mut next = *state;
        next.sample_time = state.sample_time + dt;

        match cmd.pump_mode {
            PumpMode::Pressure => {
                next.pressure = smooth(state.pressure, cmd.pump_cmd, p.alpha_hydraulic);
                next.flow = next.pressure / r;
            }
            PumpMode::Flow => {
                next.flow = smooth(state.flow, cmd.pump_cmd, p.alpha_hydraulic);
                next.pressure = next.flow * r;
            }
            // Velocity and torque loops are not modelled; the pump coasts down.
            PumpMode::Disabled | PumpMode::Velocity | PumpMode::Torque => {
                next.pressure = smooth(state.pressure, 0.0, p.alpha_hydraulic);
                next.flow = smooth(state.flow, 0.0, p.alpha_hydraulic);
            }
        }

        next.water_temp = smooth(state.water_temp, cmd.water_temp_cmd, p.alpha_water);
        next.heater_temp = smooth(state.heater_temp, cmd.water_temp_cmd, p.alpha_heater);
        next.group_temp = smooth(state.group_temp, cmd.group_temp_cmd, p.alpha_group);

        next.pump_velocity = next.flow * TAU / PUMP_RADIUS;
        next.pump_torque_cmd = next.pressure * PUMP_RADIUS / (10.0 * TAU);
        next.pump_torque = next.pump_torque_cmd;

        if cmd.flow_direction == FlowDirection::Group {
            next.weight = state.weight + dt_s * next.flow;
        }

        let (d_group, d_heater) = if dt > 0.0 {
            (
                (next.group_temp - state.group_temp) / dt_s,
                (next.heater_temp - state.heater_temp) / dt_s,
            )
        } else {
            (0.0, 0.0)
        };
        next.group_heater_power = d_group * THERMAL_MASS + GROUP_LOSS * next.group_temp;
        next.water_heater_power = next.flow * next.water_temp * WATER_HEAT + d_heater * THERMAL_MASS;

        let n = p.noise;
        next.pressure += self.noise(n.pressure);
        next.flow += self.noise(n.flow);
        next.water_temp += self.noise(n.temperature);
        next.heater_temp += self.noise(n.temperature);
        next.group_temp += self.noise(n.temperature);
        next.pump_velocity += self.noise(n.derived);
        next.pump_torque_cmd += self.noise(n.derived);
        next.pump_torque += self.noise(n.derived);
        next.weight += self.noise(n.weight);
        next.group_heater_power += self.noise(n.derived);
        next.water_heater_power += self.noise(n.derived);

        if cmd.tare.is_armed() {
            next.weight = 0.0;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Plant {
        Plant::new(
            PlantParams {
                noise: NoiseLevels::NONE,
                ..PlantParams::default()
            },
            1,
        )
    }

    #[test]
    fn default_noise_sigmas() {
        let n = NoiseLevels::default();
        assert_eq!((n.pressure, n.flow), (0.02, 0.02));
        assert_eq!(n.temperature, 0.05);
        assert_eq!(n.weight, 0.01);
        assert_eq!(n.derived, 0.0005);
    }

    fn cmd(mode: PumpMode, v: f32, dir: FlowDirection) -> MachineCommand {
        MachineCommand {
            pump_cmd: v,
            pump_mode: mode,
            flow_direction: dir,
            ..MachineCommand::default()
        }
    }

    #[test]
    fn pressure_control_couples_flow_through_resistance() {
        let mut plant = quiet();
        let s = plant.step(
            &MachineState::default(),
            &cmd(PumpMode::Pressure, 9.0, FlowDirection::Group),
            0.01,
        );
        assert!((s.pressure - 1.8).abs() < 1e-6);
        assert!((s.flow - 0.36).abs() < 1e-6);
        assert!((s.weight - 0.0036).abs() < 1e-7);
    }

    #[test]
    fn flow_control_into_drip_builds_no_pressure_or_weight() {
        let mut plant = quiet();
        let s = plant.step(
            &MachineState::default(),
            &cmd(PumpMode::Flow, 4.0, FlowDirection::Drip),
            0.01,
        );
        assert!((s.flow - 0.8).abs() < 1e-6);
        assert!((s.pressure - 0.008).abs() < 1e-6);
        assert_eq!(s.weight, 0.0);
    }

    #[test]
    fn disabled_pump_decays() {
        let mut plant = quiet();
        let start = MachineState {
            pressure: 9.0,
            flow: 2.0,
            ..MachineState::default()
        };
        let s = plant.step(&start, &MachineCommand::default(), 0.01);
        assert!((s.pressure - 7.2).abs() < 1e-5);
        assert!((s.flow - 1.6).abs() < 1e-6);
    }

    #[test]
    fn thermal_channels_smooth_toward_targets() {
        let mut plant = quiet();
        let c = MachineCommand {
            water_temp_cmd: 93.0,
            group_temp_cmd: 93.0,
            ..MachineCommand::default()
        };
        let s0 = plant.params().ambient_state();
        let s = plant.step(&s0, &c, 0.01);
        assert!((s.water_temp - (0.85 * 20.0 + 0.15 * 93.0)).abs() < 1e-4);
        assert!((s.heater_temp - (0.92 * 20.0 + 0.08 * 93.0)).abs() < 1e-4);
        assert!((s.group_temp - (0.95 * 20.0 + 0.05 * 93.0)).abs() < 1e-4);
        assert!(s.group_heater_power > 0.0);
    }

    #[test]
    fn tare_zeroes_weight() {
        let mut plant = quiet();
        let start = MachineState {
            weight: 18.0,
            ..MachineState::default()
        };
        let mut c = cmd(PumpMode::Flow, 2.0, FlowDirection::Group);
        c.tare.request();
        assert_eq!(plant.step(&start, &c, 0.01).weight, 0.0);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let c = cmd(PumpMode::Flow, 2.0, FlowDirection::Group);
        let mut a = Plant::new(PlantParams::default(), 7);
        let mut b = Plant::new(PlantParams::default(), 7);
        let (mut sa, mut sb) = (MachineState::default(), MachineState::default());
        for _ in 0..50 {
            sa = a.step(&sa, &c, 0.01);
            sb = b.step(&sb, &c, 0.01);
        }
        assert_eq!(sa, sb);
    }
}
