use super::{Interval, PulseParameters};
use crate::error::{ConfigError, ParameterAxis, SimulatorError, SimulatorResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// One fitted single-photoelectron pulse from the calibration dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    /// Fit status, zero when the fit converged.
    pub status: i32,
    pub charge: f64,
    pub amplitude: f64,
    pub tau_rise: f64,
    pub tau_dec: f64,
}

impl CalibrationRecord {
    pub fn is_converged(&self) -> bool {
        self.status == 0
    }
}

/// Acceptance window on the measured charge, inclusive at both ends.
pub type ParameterCuts = Interval<f64>;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct AxisBinning {
    pub bins: i64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Binning {
    #[serde(default)]
    pub amplitude: Option<AxisBinning>,
    #[serde(default)]
    pub tau_rise: Option<AxisBinning>,
    #[serde(default)]
    pub tau_dec: Option<AxisBinning>,
}

impl Binning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Axis::new(ParameterAxis::Amplitude, self.amplitude.as_ref())?;
        Axis::new(ParameterAxis::TauRise, self.tau_rise.as_ref())?;
        Axis::new(ParameterAxis::TauDec, self.tau_dec.as_ref())?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Axis {
    bins: usize,
    min: f64,
    width: f64,
}

impl Axis {
    fn new(axis: ParameterAxis, binning: Option<&AxisBinning>) -> Result<Self, ConfigError> {
        let binning = binning.ok_or(ConfigError::MissingBinning(axis))?;
        let bins = usize::try_from(binning.bins)
            .ok()
            .filter(|&bins| bins > 0)
            .ok_or(ConfigError::NonPositiveBins {
                axis,
                bins: binning.bins,
            })?;
        if !(binning.min.is_finite() && binning.max.is_finite() && binning.min < binning.max) {
            return Err(ConfigError::InvalidAxisRange {
                axis,
                min: binning.min,
                max: binning.max,
            });
        }
        Ok(Self {
            bins,
            min: binning.min,
            width: (binning.max - binning.min) / bins as f64,
        })
    }

    /// Bins are half-open, `[low, high)`, values outside the axis have no bin.
    fn bin_of(&self, value: f64) -> Option<usize> {
        let position = (value - self.min) / self.width;
        (position >= 0.0 && position < self.bins as f64)
            .then(|| (position as usize).min(self.bins - 1))
    }

    fn sample_in_bin<R: Rng + ?Sized>(&self, bin: usize, rng: &mut R) -> f64 {
        self.min + (bin as f64 + rng.random::<f64>()) * self.width
    }
}

/// Anything which yields single-photoelectron shape parameters.
pub trait PulseParameterSampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulatorResult<PulseParameters>;
}

/// A point distribution, every draw returns the same parameters.
impl PulseParameterSampler for PulseParameters {
    fn sample<R: Rng + ?Sized>(&self, _rng: &mut R) -> SimulatorResult<PulseParameters> {
        Ok(*self)
    }
}

/// Joint 3-D histogram over (A, tau_rise, tau_dec) of the calibration pulses.
///
/// Sampling first picks a bin with probability proportional to its count,
/// then a uniform point inside that bin, so correlations between the three
/// parameters survive up to the bin resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseParameterDistribution {
    axes: [Axis; 3],
    counts: Vec<u64>,
    cumulative: Vec<u64>,
}

impl PulseParameterDistribution {
    #[instrument(skip_all, fields(charge_min = cuts.min, charge_max = cuts.max))]
    pub fn build<'a, I>(
        records: I,
        cuts: &ParameterCuts,
        binning: &Binning,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a CalibrationRecord>,
    {
        if !(cuts.min <= cuts.max) {
            return Err(ConfigError::InvalidChargeCuts {
                min: cuts.min,
                max: cuts.max,
            });
        }
        let axes = [
            Axis::new(ParameterAxis::Amplitude, binning.amplitude.as_ref())?,
            Axis::new(ParameterAxis::TauRise, binning.tau_rise.as_ref())?,
            Axis::new(ParameterAxis::TauDec, binning.tau_dec.as_ref())?,
        ];
        let mut counts = vec![0u64; axes.iter().map(|axis| axis.bins).product()];

        let mut accepted = 0usize;
        let mut outside_range = 0usize;
        let mut rejected = 0usize;
        for record in records {
            if !(record.is_converged() && cuts.is_in(record.charge)) {
                rejected += 1;
                continue;
            }
            accepted += 1;
            let bin = axes[0]
                .bin_of(record.amplitude)
                .zip(axes[1].bin_of(record.tau_rise))
                .zip(axes[2].bin_of(record.tau_dec))
                .map(|((a, r), d)| (a * axes[1].bins + r) * axes[2].bins + d);
            match bin.and_then(|bin| counts.get_mut(bin)) {
                Some(count) => *count += 1,
                None => outside_range += 1,
            }
        }
        debug!(rejected, outside_range, "Calibration records not binned");
        info!(
            "Distribution set with {accepted} entries with charge in [{}, {}]",
            cuts.min, cuts.max
        );

        let cumulative = counts
            .iter()
            .scan(0u64, |total, &count| {
                *total += count;
                Some(*total)
            })
            .collect();
        Ok(Self {
            axes,
            counts,
            cumulative,
        })
    }

    /// Number of entries inside the histogram range.
    pub fn entries(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or_default()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    fn unravel(&self, index: usize) -> [usize; 3] {
        let [_, rise, dec] = &self.axes;
        [
            index / (rise.bins * dec.bins),
            (index / dec.bins) % rise.bins,
            index % dec.bins,
        ]
    }
}

impl PulseParameterSampler for PulseParameterDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulatorResult<PulseParameters> {
        let total = self.entries();
        if total == 0 {
            return Err(SimulatorError::EmptyDistribution);
        }
        let target = rng.random_range(0..total);
        let index = self.cumulative.partition_point(|&c| c <= target);
        let [a, r, d] = self.unravel(index);
        let [amplitude, tau_rise, tau_dec] = &self.axes;
        Ok(PulseParameters {
            amplitude: amplitude.sample_in_bin(a, rng),
            tau_rise: tau_rise.sample_in_bin(r, rng),
            tau_dec: tau_dec.sample_in_bin(d, rng),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn binning(bins: i64) -> Binning {
        Binning {
            amplitude: Some(AxisBinning {
                bins,
                min: 0.0,
                max: 1.0,
            }),
            tau_rise: Some(AxisBinning {
                bins,
                min: 0.0,
                max: 2.0,
            }),
            tau_dec: Some(AxisBinning {
                bins,
                min: 0.0,
                max: 10.0,
            }),
        }
    }

    fn record(charge: f64, amplitude: f64, tau_rise: f64, tau_dec: f64) -> CalibrationRecord {
        CalibrationRecord {
            status: 0,
            charge,
            amplitude,
            tau_rise,
            tau_dec,
        }
    }

    const CUTS: ParameterCuts = Interval { min: 1.0, max: 2.0 };

    /// Two clusters, (low A, fast, short) and (high A, slow, long).
    fn correlated_records(rng: &mut StdRng, n: usize) -> Vec<CalibrationRecord> {
        (0..n)
            .map(|i| {
                let jitter = rng.random::<f64>() * 0.05;
                if i % 4 == 0 {
                    record(1.5, 0.82 + jitter, 1.52 + jitter, 8.2 + jitter)
                } else {
                    record(1.5, 0.12 + jitter, 0.22 + jitter, 2.2 + jitter)
                }
            })
            .collect()
    }

    #[test]
    fn missing_binning_is_config_error() {
        let mut binning = binning(10);
        binning.tau_rise = None;
        assert!(matches!(
            PulseParameterDistribution::build(&[], &CUTS, &binning),
            Err(ConfigError::MissingBinning(ParameterAxis::TauRise))
        ));
    }

    #[test]
    fn non_positive_bins_is_config_error() {
        for bins in [0, -3] {
            assert!(matches!(
                PulseParameterDistribution::build(&[], &CUTS, &binning(bins)),
                Err(ConfigError::NonPositiveBins { .. })
            ));
        }
    }

    #[test]
    fn inverted_range_is_config_error() {
        let mut binning = binning(10);
        binning.tau_dec = Some(AxisBinning {
            bins: 10,
            min: 5.0,
            max: 5.0,
        });
        assert!(matches!(
            PulseParameterDistribution::build(&[], &CUTS, &binning),
            Err(ConfigError::InvalidAxisRange {
                axis: ParameterAxis::TauDec,
                ..
            })
        ));
    }

    #[test]
    fn filtered_out_records_give_empty_distribution() {
        let mut records = vec![
            record(0.5, 0.5, 1.0, 5.0),
            record(2.5, 0.5, 1.0, 5.0),
            record(f64::NAN, 0.5, 1.0, 5.0),
        ];
        records.push(CalibrationRecord {
            status: 4,
            ..record(1.5, 0.5, 1.0, 5.0)
        });
        let distribution =
            PulseParameterDistribution::build(&records, &CUTS, &binning(10)).unwrap();
        assert_eq!(distribution.entries(), 0);
        assert!(distribution.counts().iter().all(|&c| c == 0));

        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            distribution.sample(&mut rng),
            Err(SimulatorError::EmptyDistribution)
        ));
    }

    #[test]
    fn charge_cuts_are_inclusive() {
        let records = [record(1.0, 0.5, 1.0, 5.0), record(2.0, 0.5, 1.0, 5.0)];
        let distribution =
            PulseParameterDistribution::build(&records, &CUTS, &binning(10)).unwrap();
        assert_eq!(distribution.entries(), 2);
    }

    #[test]
    fn upper_edge_is_outside_histogram() {
        let records = [record(1.5, 1.0, 1.0, 5.0), record(1.5, 0.999, 1.0, 5.0)];
        let distribution =
            PulseParameterDistribution::build(&records, &CUTS, &binning(10)).unwrap();
        assert_eq!(distribution.entries(), 1);
    }

    #[test]
    fn build_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        let records = correlated_records(&mut rng, 1000);
        let first = PulseParameterDistribution::build(&records, &CUTS, &binning(20)).unwrap();
        let second = PulseParameterDistribution::build(&records, &CUTS, &binning(20)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.entries(), 1000);
    }

    #[test]
    fn samples_stay_within_occupied_bins() {
        let mut rng = StdRng::seed_from_u64(11);
        let records = correlated_records(&mut rng, 400);
        let distribution =
            PulseParameterDistribution::build(&records, &CUTS, &binning(10)).unwrap();

        for _ in 0..5000 {
            let p = distribution.sample(&mut rng).unwrap();
            // Each draw must belong to one of the two clusters on all three axes.
            let fast = p.amplitude < 0.25 && p.tau_rise < 0.45 && p.tau_dec < 3.05;
            let slow = p.amplitude > 0.75 && p.tau_rise > 1.35 && p.tau_dec > 7.95;
            assert!(fast || slow, "{p:?} mixes the two clusters");
        }
    }

    #[test]
    fn marginals_follow_input() {
        let mut rng = StdRng::seed_from_u64(3);
        let records = correlated_records(&mut rng, 4000);
        let distribution =
            PulseParameterDistribution::build(&records, &CUTS, &binning(10)).unwrap();

        const DRAWS: usize = 40_000;
        let high_amplitude = (0..DRAWS)
            .map(|_| distribution.sample(&mut rng).unwrap())
            .filter(|p| p.amplitude > 0.5)
            .count();
        let fraction = high_amplitude as f64 / DRAWS as f64;
        // A quarter of the input sits in the high amplitude cluster.
        assert!((fraction - 0.25).abs() < 0.015, "fraction was {fraction}");
    }

    #[test]
    fn same_seed_same_samples() {
        let mut rng = StdRng::seed_from_u64(5);
        let records = correlated_records(&mut rng, 100);
        let distribution =
            PulseParameterDistribution::build(&records, &CUTS, &binning(10)).unwrap();
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| distribution.sample(&mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(99), draw(99));
    }
}
