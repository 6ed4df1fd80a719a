use crate::simulation_engine::AccumulatorState;
use std::{env::VarError, path::PathBuf};
use thiserror::Error;
use waveform_common::{EventId, Side};

pub type SimulatorResult<T> = Result<T, SimulatorError>;

#[derive(Debug, strum::Display, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAxis {
    #[strum(to_string = "amplitude")]
    Amplitude,
    #[strum(to_string = "tau-rise")]
    TauRise,
    #[strum(to_string = "tau-dec")]
    TauDec,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot Parse Configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Cannot Extract Environment Variable {name}: {source}")]
    EnvVar { name: String, source: VarError },
    #[error("Histogram binning for {0} is not set")]
    MissingBinning(ParameterAxis),
    #[error("Histogram binning for {axis} must have a positive number of bins, got {bins}")]
    NonPositiveBins { axis: ParameterAxis, bins: i64 },
    #[error("Histogram range for {axis} is invalid: [{min}, {max})")]
    InvalidAxisRange {
        axis: ParameterAxis,
        min: f64,
        max: f64,
    },
    #[error("Charge cuts are invalid: [{min}, {max}]")]
    InvalidChargeCuts { min: f64, max: f64 },
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be non-negative and finite, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error(
        "bin-jitter-sigma {sigma} ns exceeds {limit} ns, too few sampling intervals would fall inside [0.5, 1.5] of nominal"
    )]
    JitterTooWide { sigma: f64, limit: f64 },
    #[error("{0} must be at least one")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration file has no header line")]
    MissingHeader,
    #[error("Calibration header is missing column {0}")]
    MissingColumn(&'static str),
    #[error("Line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Line {line}: cannot parse {column} value '{value}'")]
    Value {
        line: usize,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Calibration Error in {path}: {source}")]
    Calibration {
        path: PathBuf,
        source: CalibrationError,
    },
    #[error("Pulse parameter distribution is empty, no calibration record passed the cuts")]
    EmptyDistribution,
    #[error("Event {event}: {side} hit on channel {channel} is outside [0, {channels})")]
    ChannelOutOfRange {
        event: EventId,
        side: Side,
        channel: i64,
        channels: usize,
    },
    #[error("Cannot {operation} while accumulator is {state}")]
    InvalidState {
        operation: &'static str,
        state: AccumulatorState,
    },
    #[error("Time base jitter rejected {attempts} consecutive intervals")]
    JitterRejection { attempts: usize },
    #[error("IO Error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Hit source line {line}: {message}")]
    HitSource { line: usize, message: String },
}

impl SimulatorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors which drop a single hit rather than terminating the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChannelOutOfRange { .. })
    }
}
