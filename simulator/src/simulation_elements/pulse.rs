use serde::{Deserialize, Serialize};
use waveform_common::{Sample, Time};

/// Shape parameters of a single photoelectron response.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PulseParameters {
    pub amplitude: f64,
    pub tau_rise: f64,
    pub tau_dec: f64,
}

/// Returns `exp(-elapsed/tau)`, or zero whenever the result would leave the
/// range of normal positive doubles.
fn decaying_exponential(elapsed: Time, tau: f64) -> f64 {
    let value = f64::exp(-elapsed / tau);
    if value.is_finite() && value >= f64::MIN_POSITIVE {
        value
    } else {
        f64::default()
    }
}

impl PulseParameters {
    pub fn new(amplitude: f64, tau_rise: f64, tau_dec: f64) -> Self {
        Self {
            amplitude,
            tau_rise,
            tau_dec,
        }
    }

    /// Bi-exponential response at `time` of a photoelectron arriving at `start`.
    ///
    /// f(t) = A(e^{-(t - t0)/r} - e^{-(t - t0)/d}) for t > t0, and zero otherwise.
    /// With r < d this is a negative-going pulse, which is the polarity of the
    /// calibration templates. Both detector sides use this function unchanged.
    pub fn value_at(&self, time: Time, start: Time) -> Sample {
        if time <= start {
            return Sample::default();
        }
        let elapsed = time - start;
        let exp_rise = decaying_exponential(elapsed, self.tau_rise);
        let exp_dec = decaying_exponential(elapsed, self.tau_dec);
        let value = self.amplitude * (exp_rise - exp_dec);
        if value.is_finite() {
            value
        } else {
            Sample::default()
        }
    }
}
