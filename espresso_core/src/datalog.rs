//! In-memory brew data log and its CSV form.

use chrono::{DateTime, TimeZone};
use espresso_traits::{MachineCommand, MachineState};
use serde::Serialize;

/// One logged I/O tick: the command that was sent, then the state that was
/// read. Column order is the CSV header order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogRow {
    pub pump_cmd: f32,
    pub water_temp_cmd: f32,
    pub group_temp_cmd: f32,
    pub pump_cmd_type: u8,
    pub flow_direction: u8,
    pub tare: u8,
    pub sample_time: f64,
    pub pressure: f32,
    pub flow: f32,
    pub water_temp: f32,
    pub heater_temp: f32,
    pub group_temp: f32,
    pub pump_velocity: f32,
    pub pump_torque_cmd: f32,
    pub pump_torque: f32,
    pub weight: f32,
    pub group_heater_power: f32,
    pub water_heater_power: f32,
}

impl LogRow {
    pub fn new(cmd: &MachineCommand, s: &MachineState) -> Self {
        Self {
            pump_cmd: cmd.pump_cmd,
            water_temp_cmd: cmd.water_temp_cmd,
            group_temp_cmd: cmd.group_temp_cmd,
            pump_cmd_type: cmd.pump_mode.code(),
            flow_direction: cmd.flow_direction.code(),
            tare: u8::from(cmd.tare.is_armed()),
            sample_time: s.sample_time,
            pressure: s.pressure,
            flow: s.flow,
            water_temp: s.water_temp,
            heater_temp: s.heater_temp,
            group_temp: s.group_temp,
            pump_velocity: s.pump_velocity,
            pump_torque_cmd: s.pump_torque_cmd,
            pump_torque: s.pump_torque,
            weight: s.weight,
            group_heater_power: s.group_heater_power,
            water_heater_power: s.water_heater_power,
        }
    }
}

/// Append-only buffer of rows; cleared at the start of each shot.
#[derive(Debug, Clone, Default)]
pub struct DataLog {
    rows: Vec<LogRow>,
}

impl DataLog {
    pub fn push(&mut self, row: LogRow) {
        self.rows.push(row);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }
}

/// Rows as CSV with a header line.
pub fn csv_bytes(rows: &[LogRow]) -> Result<Vec<u8>, csv::Error> {
    let mut w = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        w.write_record(HEADER)?;
    }
    for row in rows {
        w.serialize(row)?;
    }
    w.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Header for an empty log; `serialize` emits it from the field names otherwise.
const HEADER: [&str; 18] = [
    "pump_cmd",
    "water_temp_cmd",
    "group_temp_cmd",
    "pump_cmd_type",
    "flow_direction",
    "tare",
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

/// `YYYYmmdd-HHMMSS.csv` for the given wall-clock time.
pub fn log_file_name<Tz: TimeZone>(at: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.csv", at.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use espresso_traits::{FlowDirection, PumpMode};

    #[test]
    fn file_name_is_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name(at), "20240309-070501.csv");
    }

    #[test]
    fn csv_has_header_and_codes() {
        let cmd = MachineCommand {
            pump_cmd: 9.0,
            pump_mode: PumpMode::Pressure,
            flow_direction: FlowDirection::Group,
            ..MachineCommand::default()
        };
        let state = MachineState {
            sample_time: 1.5,
            weight: 12.25,
            ..MachineState::default()
        };
        let bytes = csv_bytes(&[LogRow::new(&cmd, &state)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), HEADER.join(","));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[0], "9.0");
        assert_eq!(row[3], "1");
        assert_eq!(row[4], "1");
        assert_eq!(row[6], "1.5");
        assert_eq!(row[15], "12.25");
    }

    #[test]
    fn empty_log_still_has_header() {
        let text = String::from_utf8(csv_bytes(&[]).unwrap()).unwrap();
        assert_eq!(text.trim_end(), HEADER.join(","));
    }
}
