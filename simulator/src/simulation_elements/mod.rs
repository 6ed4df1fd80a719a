mod calibration;
pub(crate) mod daq;
pub(crate) mod noise;
pub(crate) mod pulse;
pub(crate) mod pulse_parameters;
pub(crate) mod time_base;
pub(crate) mod utils;

pub use calibration::{load_calibration, read_calibration};
pub use daq::{DaqResponse, NoiseInjection};
pub use pulse::PulseParameters;
pub use pulse_parameters::{
    AxisBinning, Binning, CalibrationRecord, ParameterCuts, PulseParameterDistribution,
    PulseParameterSampler,
};
pub use time_base::{MAX_RELATIVE_JITTER_SIGMA, TimeBase, TimeBaseMode};
pub use utils::{Interval, TextConstant};
