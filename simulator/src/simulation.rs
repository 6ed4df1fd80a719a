use crate::{
    error::{ConfigError, SimulatorError, SimulatorResult},
    simulation_elements::{
        Binning, DaqResponse, ParameterCuts, PulseParameterDistribution, TextConstant,
        load_calibration,
    },
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};
use waveform_common::Time;

/// Description of the simulated photo-sensor. Carried into the run summary only.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Detector {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub type_no: Option<String>,
    /// Supply voltage in V.
    #[serde(default)]
    pub voltage: Option<f64>,
    /// Temperature in degrees Celsius.
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CalibrationConfig {
    pub path: TextConstant,
    pub charge_cuts: ParameterCuts,
    #[serde(default)]
    pub binning: Binning,
}

/// Seeds of the three independent random streams of a run.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Seeds {
    pub parameters: u64,
    pub jitter: u64,
    pub noise: u64,
}

impl Seeds {
    fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            parameters: rng.random(),
            jitter: rng.random(),
            noise: rng.random(),
        }
    }

    /// Expands a single master seed into three distinct stream seeds.
    pub fn from_master(seed: u64) -> Self {
        Self::draw(&mut StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::draw(&mut rand::rng())
    }

    /// Seeds of the run at `index` within a batch.
    ///
    /// The three base seeds and the index together seed a generator which hands
    /// out the run's stream seeds, so no stream of one run reappears in another
    /// run under a different role.
    pub fn for_run(self, index: u64) -> Self {
        let mut seed = <StdRng as SeedableRng>::Seed::default();
        for (chunk, word) in seed
            .chunks_exact_mut(8)
            .zip([self.parameters, self.jitter, self.noise, index])
        {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self::draw(&mut StdRng::from_seed(seed))
    }
}

///
/// This struct is created from the configuration JSON file.
///
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Simulation {
    #[serde(default)]
    pub detector: Detector,
    // Channels per detector side
    pub channels: usize,
    // Samples per channel
    pub samples: usize,
    // Added to every arrival time, in ns
    pub zero_time_offset: Time,
    pub daq: DaqResponse,
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub seeds: Option<Seeds>,
}

impl Simulation {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let simulation: Self = serde_json::from_str(json)?;
        simulation.validate()?;
        Ok(simulation)
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> SimulatorResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| SimulatorError::io(path, e))?;
        Ok(Self::from_json(&json)?)
    }

    /// Checks every setting which could otherwise only fail part way through a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::Empty("channels"));
        }
        if self.samples == 0 {
            return Err(ConfigError::Empty("samples"));
        }
        if !self.zero_time_offset.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "zero-time-offset",
                value: self.zero_time_offset,
            });
        }
        self.daq.validate()?;

        let cuts = &self.calibration.charge_cuts;
        if !(cuts.min.is_finite() && cuts.max.is_finite() && cuts.min <= cuts.max) {
            return Err(ConfigError::InvalidChargeCuts {
                min: cuts.min,
                max: cuts.max,
            });
        }
        self.calibration.binning.validate()
    }

    pub fn calibration_path(&self) -> Result<PathBuf, ConfigError> {
        self.calibration.path.value().map(PathBuf::from)
    }

    /// Loads the calibration table and histograms the pulses passing the charge cuts.
    pub fn build_distribution(&self) -> SimulatorResult<PulseParameterDistribution> {
        let path = self.calibration_path()?;
        let records = load_calibration(&path)?;
        let distribution = PulseParameterDistribution::build(
            &records,
            &self.calibration.charge_cuts,
            &self.calibration.binning,
        )?;
        if distribution.entries() == 0 {
            return Err(SimulatorError::EmptyDistribution);
        }
        info!(
            "Pulse parameter distribution built from {} with {} entries",
            path.display(),
            distribution.entries()
        );
        Ok(distribution)
    }
}
