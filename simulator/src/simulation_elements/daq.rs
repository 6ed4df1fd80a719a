use super::{
    noise::GaussianNoise,
    time_base::{TimeBaseMode, validate_jitter_sigma},
};
use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;
use waveform_common::Sample;

/// Where Gaussian noise of `noise-sigma` is injected into a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NoiseInjection {
    /// Pedestal noise when the event opens.
    Baseline,
    /// Readout noise after the gain conversion.
    Finalize,
    #[default]
    Both,
    None,
}

impl NoiseInjection {
    pub fn at_baseline(self) -> bool {
        matches!(self, Self::Baseline | Self::Both)
    }

    pub fn at_finalize(self) -> bool {
        matches!(self, Self::Finalize | Self::Both)
    }
}

/// Digitiser emulation settings, immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DaqResponse {
    /// Samples per ns.
    pub sampling_speed: f64,
    /// Sampling speed the calibration templates were recorded at (informational).
    #[serde(default)]
    pub sampling_speed_template: Option<f64>,
    /// Simulated gain in dB.
    pub gain: f64,
    /// Gain in dB the calibration templates were recorded at.
    pub gain_template: f64,
    #[serde(default)]
    pub r_shaper_template: Option<f64>,
    pub bin_size_constant: bool,
    #[serde(default)]
    pub bin_jitter_sigma: f64,
    #[serde(default)]
    pub is_shaping: bool,
    #[serde(default)]
    pub tau_shaping: f64,
    pub noise_sigma: f64,
    #[serde(default)]
    pub noise_injection: NoiseInjection,
}

impl DaqResponse {
    /// Decibel to linear conversion between the template gain and the simulated gain.
    pub fn gain_conversion_factor(&self) -> f64 {
        f64::powf(10.0, (self.gain - self.gain_template) / 20.0)
    }

    pub fn time_base_mode(&self) -> TimeBaseMode {
        if self.bin_size_constant {
            TimeBaseMode::Constant
        } else {
            TimeBaseMode::Jittered {
                sigma: self.bin_jitter_sigma,
            }
        }
    }

    pub(crate) fn baseline_noise(&self) -> Result<GaussianNoise, ConfigError> {
        if self.noise_injection.at_baseline() {
            GaussianNoise::new("noise-sigma", self.noise_sigma)
        } else {
            Ok(GaussianNoise::silent())
        }
    }

    pub(crate) fn finalize_noise(&self) -> Result<GaussianNoise, ConfigError> {
        if self.noise_injection.at_finalize() {
            GaussianNoise::new("noise-sigma", self.noise_sigma)
        } else {
            Ok(GaussianNoise::silent())
        }
    }

    /// Standard deviation of a trace with no hits, given the configured injection points.
    pub fn pedestal_sigma(&self) -> f64 {
        let k = self.gain_conversion_factor();
        let baseline = if self.noise_injection.at_baseline() {
            k * self.noise_sigma
        } else {
            0.0
        };
        let finalize = if self.noise_injection.at_finalize() {
            self.noise_sigma
        } else {
            0.0
        };
        baseline.hypot(finalize)
    }

    /// Applies `k * raw + N(0, noise-sigma)` to every sample, in place.
    ///
    /// Shaping is not applied even when `is-shaping` is set, see [Self::validate].
    pub fn finalize<R: Rng + ?Sized>(
        &self,
        samples: &mut [Sample],
        rng: &mut R,
    ) -> Result<(), ConfigError> {
        let k = self.gain_conversion_factor();
        let noise = self.finalize_noise()?;
        for value in samples.iter_mut() {
            *value = k * *value + noise.sample(rng);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sampling_speed.is_finite() && self.sampling_speed > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "sampling-speed",
                value: self.sampling_speed,
            });
        }
        if !self.bin_size_constant {
            validate_jitter_sigma(self.bin_jitter_sigma, self.sampling_speed)?;
        }
        for (field, value) in [("gain", self.gain), ("gain-template", self.gain_template)] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
        }
        for (field, value) in [
            ("bin-jitter-sigma", self.bin_jitter_sigma),
            ("noise-sigma", self.noise_sigma),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if self.is_shaping {
            warn!(
                "Shaping with tau {} ns requested, no shaping transform is implemented so traces are unshaped",
                self.tau_shaping
            );
        }
        Ok(())
    }
}
