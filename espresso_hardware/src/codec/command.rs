//! Command encoders.
//!
//! Two interchangeable wire forms:
//! - packed: the 6-float command vector, little-endian, no header;
//! - ascii: newline-terminated firmware tokens (`SET_P:9.0`, `TARE`, ...).
//!
//! The ascii form is stateful. It diffs each command against the last one it
//! transmitted and only emits tokens for fields that changed, so a mode that
//! rewrites the same setpoint every tick does not flood the device.

use std::fmt;

use espresso_traits::{FlowDirection, MachineCommand, PumpMode};

use crate::error::CodecError;
use crate::util::{get_f32s_le, put_f32s_le};

/// Bytes in one packed command.
pub const PACKED_COMMAND_SIZE: usize = 6 * 4;

/// Encoder selected per deployment.
pub trait CommandEncoder: Send {
    /// Bytes to send once when the link opens.
    fn open(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn encode(&mut self, cmd: &MachineCommand) -> Result<Vec<u8>, CodecError>;

    /// Bytes to send once when the link closes.
    fn close(&mut self) -> Vec<u8> {
        Vec::new()
    }
}

/// Pack a command as 6 little-endian floats.
pub fn encode_command(cmd: &MachineCommand) -> [u8; PACKED_COMMAND_SIZE] {
    let mut v = Vec::with_capacity(PACKED_COMMAND_SIZE);
    put_f32s_le(&mut v, &cmd.as_array());
    let mut out = [0u8; PACKED_COMMAND_SIZE];
    out.copy_from_slice(&v);
    out
}

/// Inverse of [`encode_command`]; enum codes must be in range.
pub fn decode_command(bytes: &[u8]) -> Result<MachineCommand, CodecError> {
    if bytes.len() != PACKED_COMMAND_SIZE {
        return Err(CodecError::BadValue(format!(
            "packed command of {} bytes",
            bytes.len()
        )));
    }
    let v = get_f32s_le(bytes);
    let code = |x: f32, what: &str| -> Result<u8, CodecError> {
        if x.fract() == 0.0 && (0.0..=f32::from(u8::MAX)).contains(&x) {
            Ok(x as u8)
        } else {
            Err(CodecError::BadValue(format!("{what}={x}")))
        }
    };
    let pump_mode = PumpMode::try_from(code(v[3], "pump_cmd_type")?)
        .map_err(|c| CodecError::BadValue(format!("pump_cmd_type={c}")))?;
    let flow_direction = FlowDirection::try_from(code(v[4], "flow_direction")?)
        .map_err(|c| CodecError::BadValue(format!("flow_direction={c}")))?;
    let mut cmd = MachineCommand {
        pump_cmd: v[0],
        water_temp_cmd: v[1],
        group_temp_cmd: v[2],
        pump_mode,
        flow_direction,
        ..MachineCommand::default()
    };
    if v[5] != 0.0 {
        cmd.tare.request();
    }
    Ok(cmd)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PackedEncoder;

impl CommandEncoder for PackedEncoder {
    fn encode(&mut self, cmd: &MachineCommand) -> Result<Vec<u8>, CodecError> {
        Ok(encode_command(cmd).to_vec())
    }
}

/// One firmware token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AsciiToken {
    SetPressure(f32),
    SetFlow(f32),
    SetWaterTemp(f32),
    SetGroupTemp(f32),
    SteamOn,
    SteamOff,
    Stop,
    Tare,
    PowerOn,
    PowerOff,
}

impl fmt::Display for AsciiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `{:?}` keeps the decimal point on whole numbers ("4.0", not "4").
        match self {
            Self::SetPressure(v) => write!(f, "SET_P:{v:?}"),
            Self::SetFlow(v) => write!(f, "SET_F:{v:?}"),
            Self::SetWaterTemp(v) => write!(f, "SET_TW:{v:?}"),
            Self::SetGroupTemp(v) => write!(f, "SET_TG:{v:?}"),
            Self::SteamOn => f.write_str("STEAM_ON"),
            Self::SteamOff => f.write_str("STEAM_OFF"),
            Self::Stop => f.write_str("STOP"),
            Self::Tare => f.write_str("TARE"),
            Self::PowerOn => f.write_str("POWER_ON"),
            Self::PowerOff => f.write_str("POWER_OFF"),
        }
    }
}

/// Parse one token (surrounding whitespace ignored).
pub fn parse_ascii_token(s: &str) -> Result<AsciiToken, CodecError> {
    let s = s.trim();
    if let Some((name, value)) = s.split_once(':') {
        let v: f32 = value
            .trim()
            .parse()
            .map_err(|_| CodecError::BadValue(s.to_string()))?;
        return match name {
            "SET_P" => Ok(AsciiToken::SetPressure(v)),
            "SET_F" => Ok(AsciiToken::SetFlow(v)),
            "SET_TW" => Ok(AsciiToken::SetWaterTemp(v)),
            "SET_TG" => Ok(AsciiToken::SetGroupTemp(v)),
            _ => Err(CodecError::UnknownToken(s.to_string())),
        };
    }
    match s {
        "STEAM_ON" => Ok(AsciiToken::SteamOn),
        "STEAM_OFF" => Ok(AsciiToken::SteamOff),
        "STOP" => Ok(AsciiToken::Stop),
        "TARE" => Ok(AsciiToken::Tare),
        "POWER_ON" => Ok(AsciiToken::PowerOn),
        "POWER_OFF" => Ok(AsciiToken::PowerOff),
        _ => Err(CodecError::UnknownToken(s.to_string())),
    }
}

/// Diffing ascii encoder.
#[derive(Debug, Default)]
pub struct AsciiEncoder {
    last: Option<MachineCommand>,
}

impl AsciiEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens needed to move the device from the last sent command to `cmd`.
    pub fn tokens(&self, cmd: &MachineCommand) -> Result<Vec<AsciiToken>, CodecError> {
        let pump = match cmd.pump_mode {
            PumpMode::Disabled => AsciiToken::Stop,
            PumpMode::Pressure => AsciiToken::SetPressure(cmd.pump_cmd),
            PumpMode::Flow => AsciiToken::SetFlow(cmd.pump_cmd),
            m @ (PumpMode::Velocity | PumpMode::Torque) => {
                return Err(CodecError::Unsupported(m));
            }
        };
        let steam = cmd.flow_direction == FlowDirection::Steam;

        let mut out = Vec::new();
        if cmd.tare.is_armed() {
            out.push(AsciiToken::Tare);
        }
        match &self.last {
            None => {
                if steam {
                    out.push(AsciiToken::SteamOn);
                }
                out.push(pump);
                out.push(AsciiToken::SetWaterTemp(cmd.water_temp_cmd));
                out.push(AsciiToken::SetGroupTemp(cmd.group_temp_cmd));
            }
            Some(prev) => {
                let was_steam = prev.flow_direction == FlowDirection::Steam;
                if steam != was_steam {
                    out.push(if steam {
                        AsciiToken::SteamOn
                    } else {
                        AsciiToken::SteamOff
                    });
                }
                let pump_changed = prev.pump_mode != cmd.pump_mode
                    || (cmd.pump_mode != PumpMode::Disabled && prev.pump_cmd != cmd.pump_cmd);
                if pump_changed {
                    out.push(pump);
                }
                if prev.water_temp_cmd != cmd.water_temp_cmd {
                    out.push(AsciiToken::SetWaterTemp(cmd.water_temp_cmd));
                }
                if prev.group_temp_cmd != cmd.group_temp_cmd {
                    out.push(AsciiToken::SetGroupTemp(cmd.group_temp_cmd));
                }
            }
        }
        Ok(out)
    }
}

fn lines(tokens: &[AsciiToken]) -> Vec<u8> {
    let mut s = String::new();
    for t in tokens {
        s.push_str(&t.to_string());
        s.push('\n');
    }
    s.into_bytes()
}

impl CommandEncoder for AsciiEncoder {
    fn open(&mut self) -> Vec<u8> {
        self.last = None;
        lines(&[AsciiToken::PowerOn])
    }

    fn encode(&mut self, cmd: &MachineCommand) -> Result<Vec<u8>, CodecError> {
        let tokens = self.tokens(cmd)?;
        self.last = Some(*cmd);
        Ok(lines(&tokens))
    }

    fn close(&mut self) -> Vec<u8> {
        self.last = None;
        lines(&[AsciiToken::PowerOff])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(v: f32) -> MachineCommand {
        MachineCommand {
            pump_cmd: v,
            water_temp_cmd: 93.0,
            group_temp_cmd: 93.0,
            pump_mode: PumpMode::Flow,
            flow_direction: FlowDirection::Group,
            ..MachineCommand::default()
        }
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn first_command_sends_full_set_then_only_changes() {
        let mut enc = AsciiEncoder::new();
        assert_eq!(
            text(enc.encode(&flow(4.0)).unwrap()),
            "SET_F:4.0\nSET_TW:93.0\nSET_TG:93.0\n"
        );
        assert_eq!(text(enc.encode(&flow(4.0)).unwrap()), "");
        let mut p = flow(9.0);
        p.pump_mode = PumpMode::Pressure;
        assert_eq!(text(enc.encode(&p).unwrap()), "SET_P:9.0\n");
    }

    #[test]
    fn tare_and_steam_edges() {
        let mut enc = AsciiEncoder::new();
        let _ = enc.encode(&MachineCommand::default()).unwrap();
        let mut c = MachineCommand {
            flow_direction: FlowDirection::Steam,
            ..MachineCommand::default()
        };
        c.tare.request();
        assert_eq!(text(enc.encode(&c).unwrap()), "TARE\nSTEAM_ON\n");
        assert_eq!(
            text(enc.encode(&MachineCommand::default()).unwrap()),
            "STEAM_OFF\n"
        );
    }

    #[test]
    fn velocity_control_is_rejected() {
        let mut enc = AsciiEncoder::new();
        let c = MachineCommand {
            pump_mode: PumpMode::Velocity,
            ..MachineCommand::default()
        };
        assert_eq!(enc.encode(&c), Err(CodecError::Unsupported(PumpMode::Velocity)));
    }

    #[test]
    fn parses_every_token_it_prints() {
        for t in [
            AsciiToken::SetPressure(9.0),
            AsciiToken::SetFlow(0.25),
            AsciiToken::SetWaterTemp(93.5),
            AsciiToken::SetGroupTemp(88.0),
            AsciiToken::SteamOn,
            AsciiToken::SteamOff,
            AsciiToken::Stop,
            AsciiToken::Tare,
            AsciiToken::PowerOn,
            AsciiToken::PowerOff,
        ] {
            assert_eq!(parse_ascii_token(&t.to_string()), Ok(t));
        }
        assert!(matches!(
            parse_ascii_token("SET_X:1.0"),
            Err(CodecError::UnknownToken(_))
        ));
        assert!(matches!(
            parse_ascii_token("SET_P:abc"),
            Err(CodecError::BadValue(_))
        ));
    }

    #[test]
    fn packed_command_layout() {
        let mut c = flow(2.0);
        c.tare.request();
        let bytes = encode_command(&c);
        assert_eq!(get_f32s_le(&bytes), vec![2.0, 93.0, 93.0, 2.0, 1.0, 1.0]);
        assert_eq!(decode_command(&bytes), Ok(c));
        assert!(decode_command(&bytes[..20]).is_err());
    }
}
