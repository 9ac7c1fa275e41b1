//! JSON profile library.
//!
//! A library maps profile names to ordered step lists:
//!
//! ```json
//! {
//!   "classic": [
//!     ["F", 4.0, 93, 93, "Time >", 4.0],
//!     ["P", 9.0, 93, 93, "Weight >", 36.0]
//!   ],
//!   "timed": [[8.0, "F", 2.0, 92, 92], [25.0, "P", 9.0, 92, 92]]
//! }
//! ```
//!
//! Each step is either the timed form `[duration, mode, value, water, group]`
//! (exit after `duration` seconds in step), the conditional form
//! `[mode, setpoint, water, group, exit, exit_value]`, or a table with the
//! same fields by name. Saving always writes the conditional form.

use std::collections::BTreeMap;
use std::path::Path;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    #[serde(rename = "P", alias = "pressure", alias = "Pressure")]
    Pressure,
    #[serde(rename = "F", alias = "flow", alias = "Flow")]
    Flow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitKind {
    #[serde(rename = "Time >", alias = "time")]
    Time,
    #[serde(rename = "Weight >", alias = "weight_above")]
    WeightAbove,
    #[serde(rename = "Press >", alias = "pressure_above")]
    PressureAbove,
    #[serde(rename = "Press <", alias = "pressure_below")]
    PressureBelow,
}

/// One profile step as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "StepRow", into = "StepRow")]
pub struct StepDef {
    pub control: ControlKind,
    pub setpoint: f32,
    pub water_temp: f32,
    pub group_temp: f32,
    pub exit: ExitKind,
    pub exit_value: f32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StepRow {
    Timed((f32, ControlKind, f32, f32, f32)),
    Conditional((ControlKind, f32, f32, f32, ExitKind, f32)),
    Table {
        control: ControlKind,
        setpoint: f32,
        water_temp: f32,
        group_temp: f32,
        exit: ExitKind,
        exit_value: f32,
    },
}

impl From<StepRow> for StepDef {
    fn from(row: StepRow) -> Self {
        match row {
            StepRow::Timed((duration, control, setpoint, water_temp, group_temp)) => Self {
                control,
                setpoint,
                water_temp,
                group_temp,
                exit: ExitKind::Time,
                exit_value: duration,
            },
            StepRow::Conditional((control, setpoint, water_temp, group_temp, exit, exit_value))
            | StepRow::Table {
                control,
                setpoint,
                water_temp,
                group_temp,
                exit,
                exit_value,
            } => Self {
                control,
                setpoint,
                water_temp,
                group_temp,
                exit,
                exit_value,
            },
        }
    }
}

impl From<StepDef> for StepRow {
    fn from(s: StepDef) -> Self {
        Self::Conditional((
            s.control,
            s.setpoint,
            s.water_temp,
            s.group_temp,
            s.exit,
            s.exit_value,
        ))
    }
}

impl StepDef {
    pub fn validate(&self) -> eyre::Result<()> {
        for (name, v) in [
            ("setpoint", self.setpoint),
            ("water_temp", self.water_temp),
            ("group_temp", self.group_temp),
            ("exit_value", self.exit_value),
        ] {
            if !v.is_finite() {
                eyre::bail!("{name} must be finite, got {v}");
            }
        }
        if self.setpoint < 0.0 {
            eyre::bail!("setpoint must be >= 0, got {}", self.setpoint);
        }
        if self.exit_value < 0.0 {
            eyre::bail!("exit_value must be >= 0, got {}", self.exit_value);
        }
        Ok(())
    }
}

/// Profiles by name, each an ordered step list.
pub type ProfileLibrary = BTreeMap<String, Vec<StepDef>>;

fn validate_library(lib: &ProfileLibrary) -> eyre::Result<()> {
    for (name, steps) in lib {
        if steps.is_empty() {
            eyre::bail!("profile {name:?} has no steps");
        }
        for (i, s) in steps.iter().enumerate() {
            s.validate()
                .wrap_err_with(|| format!("profile {name:?} step {i}"))?;
        }
    }
    Ok(())
}

pub fn parse_profiles_json(s: &str) -> eyre::Result<ProfileLibrary> {
    let lib: ProfileLibrary =
        serde_json::from_str(s).wrap_err("profile library is not valid JSON")?;
    validate_library(&lib)?;
    Ok(lib)
}

pub fn load_profiles_json(path: &Path) -> eyre::Result<ProfileLibrary> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read profile library {}", path.display()))?;
    parse_profiles_json(&text).wrap_err_with(|| format!("in {}", path.display()))
}

pub fn save_profiles_json(path: &Path, lib: &ProfileLibrary) -> eyre::Result<()> {
    validate_library(lib)?;
    let text = serde_json::to_string_pretty(lib)?;
    std::fs::write(path, text).wrap_err_with(|| format!("write {}", path.display()))
}
