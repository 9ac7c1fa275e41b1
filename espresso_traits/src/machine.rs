//! Machine data model shared by the link, the simulator and the control core.
//!
//! `MachineState` is the 12-channel snapshot produced every sample tick and
//! `MachineCommand` the 6-field actuator request. Both are `Copy` values so
//! they are always exchanged whole.

use serde::{Deserialize, Serialize};

/// Control law applied to the pump. Discriminants are the wire codes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PumpMode {
    #[default]
    Disabled = 0,
    Pressure = 1,
    Flow = 2,
    Velocity = 3,
    Torque = 4,
}

impl PumpMode {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PumpMode {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::Disabled,
            1 => Self::Pressure,
            2 => Self::Flow,
            3 => Self::Velocity,
            4 => Self::Torque,
            other => return Err(other),
        })
    }
}

/// Physical routing of the pumped water. Discriminants are the wire codes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FlowDirection {
    #[default]
    Tank = 0,
    Group = 1,
    Drip = 2,
    Spout = 3,
    Steam = 4,
}

impl FlowDirection {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FlowDirection {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::Tank,
            1 => Self::Group,
            2 => Self::Drip,
            3 => Self::Spout,
            4 => Self::Steam,
            other => return Err(other),
        })
    }
}

/// Edge-triggered tare request.
///
/// Modes call [`TareRequest::request`]; the machine interface calls
/// [`TareRequest::take`] when it transmits, which disarms the request in the
/// same step. There is no way to hold the flag high across transmissions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TareRequest(bool);

impl TareRequest {
    #[inline]
    pub fn request(&mut self) {
        self.0 = true;
    }

    /// Consume the request, returning whether it was armed.
    #[inline]
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.0)
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.0
    }
}

/// One telemetry snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    /// Seconds on the link's monotonic timeline.
    pub sample_time: f64,
    /// bar
    pub pressure: f32,
    /// mL/s
    pub flow: f32,
    /// °C
    pub water_temp: f32,
    /// °C
    pub heater_temp: f32,
    /// °C
    pub group_temp: f32,
    /// rad/s
    pub pump_velocity: f32,
    /// N·m
    pub pump_torque_cmd: f32,
    /// N·m
    pub pump_torque: f32,
    /// grams since the last tare
    pub weight: f32,
    /// W
    pub group_heater_power: f32,
    /// W
    pub water_heater_power: f32,
}

impl MachineState {
    pub const CHANNELS: [&'static str; 12] = [
        "sample_time",
        "pressure",
        "flow",
        "water_temp",
        "heater_temp",
        "group_temp",
        "pump_velocity",
        "pump_torque_cmd",
        "pump_torque",
        "weight",
        "group_heater_power",
        "water_heater_power",
    ];

    /// Ordered channel vector.
    pub fn as_array(&self) -> [f64; 12] {
        [
            self.sample_time,
            f64::from(self.pressure),
            f64::from(self.flow),
            f64::from(self.water_temp),
            f64::from(self.heater_temp),
            f64::from(self.group_temp),
            f64::from(self.pump_velocity),
            f64::from(self.pump_torque_cmd),
            f64::from(self.pump_torque),
            f64::from(self.weight),
            f64::from(self.group_heater_power),
            f64::from(self.water_heater_power),
        ]
    }
}

/// Pending actuator request.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MachineCommand {
    /// Setpoint whose unit depends on `pump_mode` (bar, mL/s, rad/s or N·m).
    pub pump_cmd: f32,
    pub water_temp_cmd: f32,
    pub group_temp_cmd: f32,
    pub pump_mode: PumpMode,
    pub flow_direction: FlowDirection,
    pub tare: TareRequest,
}

impl MachineCommand {
    pub const FIELDS: [&'static str; 6] = [
        "pump_cmd",
        "water_temp_cmd",
        "group_temp_cmd",
        "pump_cmd_type",
        "flow_direction",
        "tare",
    ];

    /// Reset every field, including a pending tare.
    #[inline]
    pub fn zero(&mut self) {
        *self = Self::default();
    }

    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|v| *v == 0.0)
    }

    /// Ordered wire vector; enums become their codes and tare is 0/1.
    pub fn as_array(&self) -> [f32; 6] {
        [
            self.pump_cmd,
            self.water_temp_cmd,
            self.group_temp_cmd,
            f32::from(self.pump_mode.code()),
            f32::from(self.flow_direction.code()),
            if self.tare.is_armed() { 1.0 } else { 0.0 },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tare_is_consumed_once() {
        let mut t = TareRequest::default();
        assert!(!t.take());
        t.request();
        t.request();
        assert!(t.is_armed());
        assert!(t.take());
        assert!(!t.take());
    }

    #[test]
    fn zeroed_command_has_all_zero_vector() {
        let mut c = MachineCommand {
            pump_cmd: 9.0,
            water_temp_cmd: 93.0,
            group_temp_cmd: 93.0,
            pump_mode: PumpMode::Pressure,
            flow_direction: FlowDirection::Group,
            tare: TareRequest::default(),
        };
        c.tare.request();
        assert!(!c.is_zero());
        c.zero();
        assert!(c.is_zero());
        assert_eq!(c.as_array(), [0.0; 6]);
    }

    #[test]
    fn enum_codes_round_trip() {
        for code in 0u8..5 {
            assert_eq!(PumpMode::try_from(code).map(PumpMode::code), Ok(code));
            assert_eq!(FlowDirection::try_from(code).map(FlowDirection::code), Ok(code));
        }
        assert_eq!(PumpMode::try_from(9), Err(9));
    }
}
