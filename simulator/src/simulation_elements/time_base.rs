use crate::error::{ConfigError, SimulatorError, SimulatorResult};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::instrument;
use waveform_common::Time;

/// Maximum consecutive rejected intervals before a jittered time base is abandoned.
const MAX_JITTER_ATTEMPTS: usize = 10_000;

/// Accepted sampling intervals, as multiples of the nominal interval.
const MIN_INTERVAL_RATIO: f64 = 0.5;
const MAX_INTERVAL_RATIO: f64 = 1.5;

/// Widest accepted jitter sigma, as a multiple of the nominal interval.
/// At this width roughly one draw in 250 is accepted.
pub const MAX_RELATIVE_JITTER_SIGMA: f64 = 100.0;

/// Checks `sigma` is usable for a jittered time base at `sampling_speed`.
pub(crate) fn validate_jitter_sigma(sigma: f64, sampling_speed: f64) -> Result<(), ConfigError> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(ConfigError::Negative {
            field: "bin-jitter-sigma",
            value: sigma,
        });
    }
    let limit = MAX_RELATIVE_JITTER_SIGMA / sampling_speed;
    if sigma > limit {
        return Err(ConfigError::JitterTooWide { sigma, limit });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeBaseMode {
    /// Every channel is sampled at `i / sampling_speed`.
    Constant,
    /// Each channel's interval is drawn from N(1/sampling_speed, sigma), restricted to
    /// `[0.5, 1.5] / sampling_speed`.
    Jittered { sigma: f64 },
}

/// Per channel sample timestamps of one detector side, stored contiguously.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBase {
    channels: usize,
    samples: usize,
    timestamps: Vec<Time>,
}

impl TimeBase {
    #[instrument(skip(rng), level = "debug")]
    pub fn generate<R: Rng + ?Sized>(
        samples: usize,
        channels: usize,
        sampling_speed: f64,
        mode: TimeBaseMode,
        rng: &mut R,
    ) -> SimulatorResult<Self> {
        if !(sampling_speed.is_finite() && sampling_speed > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "sampling-speed",
                value: sampling_speed,
            }
            .into());
        }
        let interval = 1.0 / sampling_speed;
        let timestamps = match mode {
            TimeBaseMode::Constant => (0..channels)
                .flat_map(|_| (0..samples).map(|i| i as Time / sampling_speed))
                .collect(),
            TimeBaseMode::Jittered { sigma } => {
                validate_jitter_sigma(sigma, sampling_speed)?;
                let normal = Normal::new(interval, sigma).map_err(|_| ConfigError::Negative {
                    field: "bin-jitter-sigma",
                    value: sigma,
                })?;
                let mut timestamps = Vec::with_capacity(channels * samples);
                for _ in 0..channels {
                    // The walk is kept as a drift from the nominal grid, so a zero sigma
                    // reproduces the constant time base exactly.
                    let mut drift = Time::default();
                    for i in 0..samples {
                        if i > 0 {
                            drift += draw_interval(&normal, interval, rng)? - interval;
                        }
                        timestamps.push(i as Time / sampling_speed + drift);
                    }
                }
                timestamps
            }
        };
        Ok(Self {
            channels,
            samples,
            timestamps,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Timestamps of `channel`, empty if out of range.
    pub fn channel(&self, channel: usize) -> &[Time] {
        self.timestamps
            .get(channel * self.samples..(channel + 1) * self.samples)
            .unwrap_or_default()
    }

    pub fn iter_channels(&self) -> impl Iterator<Item = &[Time]> {
        self.timestamps.chunks_exact(self.samples.max(1))
    }
}

fn draw_interval<R: Rng + ?Sized>(normal: &Normal<f64>, interval: f64, rng: &mut R) -> SimulatorResult<f64> {
    let bounds = (interval * MIN_INTERVAL_RATIO)..=(interval * MAX_INTERVAL_RATIO);
    (0..MAX_JITTER_ATTEMPTS)
        .map(|_| normal.sample(rng))
        .find(|step| bounds.contains(step))
        .ok_or(SimulatorError::JitterRejection {
            attempts: MAX_JITTER_ATTEMPTS,
        })
}
