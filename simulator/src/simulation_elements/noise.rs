use crate::error::ConfigError;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use waveform_common::Sample;

/// Zero mean white Gaussian noise. A zero sigma yields a silent source which
/// leaves samples untouched and draws nothing from the generator.
#[derive(Clone, Debug)]
pub(crate) struct GaussianNoise {
    normal: Option<Normal<f64>>,
}

impl GaussianNoise {
    pub(crate) fn new(field: &'static str, sigma: f64) -> Result<Self, ConfigError> {
        if sigma == 0.0 {
            return Ok(Self::silent());
        }
        let invalid = || ConfigError::Negative { field, value: sigma };
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(invalid());
        }
        let normal = Normal::new(0.0, sigma).map_err(|_| invalid())?;
        Ok(Self {
            normal: Some(normal),
        })
    }

    pub(crate) fn silent() -> Self {
        Self { normal: None }
    }

    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Sample {
        self.normal
            .as_ref()
            .map(|normal| normal.sample(rng))
            .unwrap_or_default()
    }

    pub(crate) fn noisify<R: Rng + ?Sized>(&self, samples: &mut [Sample], rng: &mut R) {
        if let Some(normal) = &self.normal {
            for value in samples {
                *value += normal.sample(rng);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn silent_leaves_samples() {
        let mut rng = StdRng::seed_from_u64(0);
        let noise = GaussianNoise::new("noise-sigma", 0.0).unwrap();
        let mut samples = vec![1.5; 32];
        noise.noisify(&mut samples, &mut rng);
        assert!(samples.iter().all(|&v| v == 1.5));
        assert_eq!(noise.sample(&mut rng), 0.0);
    }

    #[test]
    fn moments() {
        let mut rng = StdRng::seed_from_u64(1);
        let noise = GaussianNoise::new("noise-sigma", 2.0).unwrap();
        let mut samples = vec![0.0; 100_000];
        noise.noisify(&mut samples, &mut rng);
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert_approx_eq!(mean, 0.0, 0.03);
        assert_approx_eq!(variance.sqrt(), 2.0, 0.03);
    }

    #[test]
    fn invalid_sigma() {
        for sigma in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(GaussianNoise::new("noise-sigma", sigma).is_err());
        }
    }
}
