use super::CalibrationRecord;
use crate::error::{CalibrationError, SimulatorError, SimulatorResult};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};
use tracing::{info, instrument};

const STATUS: &str = "Status";
const CHARGE: &str = "my_charge";
const AMPLITUDE: &str = "A";
const TAU_RISE: &str = "Tau_rise";
const TAU_DEC: &str = "Tau_dec";

/// Column positions of the fields of [CalibrationRecord] in a calibration table.
struct Columns {
    status: usize,
    charge: usize,
    amplitude: usize,
    tau_rise: usize,
    tau_dec: usize,
    count: usize,
}

/// Header names may carry a type suffix (`A/D`) and be separated by `:`.
fn column_names(header: &str) -> Vec<String> {
    header
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(|name| name.split('/').next().unwrap_or(name).to_lowercase())
        .collect()
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, CalibrationError> {
        let names = column_names(header);
        let find = |name: &'static str, aliases: &[&str]| {
            names
                .iter()
                .position(|n| n == &name.to_lowercase() || aliases.contains(&n.as_str()))
                .ok_or(CalibrationError::MissingColumn(name))
        };
        Ok(Self {
            status: find(STATUS, &[])?,
            charge: find(CHARGE, &["charge"])?,
            amplitude: find(AMPLITUDE, &["amplitude"])?,
            tau_rise: find(TAU_RISE, &[])?,
            tau_dec: find(TAU_DEC, &[])?,
            count: names.len(),
        })
    }

    fn parse_record(
        &self,
        line: usize,
        text: &str,
    ) -> Result<CalibrationRecord, CalibrationError> {
        let values: Vec<&str> = text.split_whitespace().collect();
        if values.len() != self.count {
            return Err(CalibrationError::ColumnCount {
                line,
                expected: self.count,
                found: values.len(),
            });
        }
        let parse = |column: &'static str, index: usize| {
            let value = values.get(index).copied().unwrap_or_default();
            f64::from_str(value).map_err(|_| CalibrationError::Value {
                line,
                column,
                value: value.to_owned(),
            })
        };
        let status = parse(STATUS, self.status)?;
        if status.fract() != 0.0 {
            return Err(CalibrationError::Value {
                line,
                column: STATUS,
                value: status.to_string(),
            });
        }
        Ok(CalibrationRecord {
            status: status as i32,
            charge: parse(CHARGE, self.charge)?,
            amplitude: parse(AMPLITUDE, self.amplitude)?,
            tau_rise: parse(TAU_RISE, self.tau_rise)?,
            tau_dec: parse(TAU_DEC, self.tau_dec)?,
        })
    }
}

/// Parses a whitespace separated calibration table whose first line names the columns.
/// Blank lines and lines starting with `#` are skipped.
pub fn read_calibration<R: BufRead>(
    reader: R,
    path: &Path,
) -> SimulatorResult<Vec<CalibrationRecord>> {
    let calibration_error = |source| SimulatorError::Calibration {
        path: path.to_owned(),
        source,
    };

    let mut columns: Option<Columns> = None;
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SimulatorError::io(path, e))?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        if let Some(columns) = &columns {
            records.push(
                columns
                    .parse_record(index + 1, text)
                    .map_err(calibration_error)?,
            );
        } else {
            columns = Some(Columns::from_header(text).map_err(calibration_error)?);
        }
    }
    match columns {
        Some(_) => Ok(records),
        None => Err(calibration_error(CalibrationError::MissingHeader)),
    }
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_calibration(path: &Path) -> SimulatorResult<Vec<CalibrationRecord>> {
    let file = File::open(path).map_err(|e| SimulatorError::io(path, e))?;
    let records = read_calibration(BufReader::new(file), path)?;
    info!("Loaded {} calibration records", records.len());
    Ok(records)
}
