use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::features::{FeatureVector, FEATURE_LEN};

/// Per-feature standardization fit once on training data.
///
/// A zero standard deviation is stored as 1 so constant features map to 0
/// instead of dividing by zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Scaler {
    /// Fit mean and standard deviation per feature over `samples`.
    pub fn fit(samples: &[FeatureVector]) -> Result<Self> {
        if samples.is_empty() {
            return Err(anyhow!("cannot fit scaler on an empty sample set"));
        }
        let n = samples.len() as f64;
        let mut mean = vec![0.0; FEATURE_LEN];
        for sample in samples {
            for (m, v) in mean.iter_mut().zip(sample.as_slice()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut std = vec![0.0; FEATURE_LEN];
        for sample in samples {
            for ((s, v), m) in std.iter_mut().zip(sample.as_slice()).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n).sqrt();
            if *s == 0.0 || !s.is_finite() {
                *s = 1.0;
            }
        }

        Ok(Self { mean, std })
    }

    pub fn transform(&self, sample: &FeatureVector) -> [f64; FEATURE_LEN] {
        let mut out = [0.0; FEATURE_LEN];
        for (i, v) in sample.as_slice().iter().enumerate() {
            out[i] = (v - self.mean[i]) / self.std[i];
        }
        out
    }

    pub fn transform_all(&self, samples: &[FeatureVector]) -> Vec<[f64; FEATURE_LEN]> {
        samples.iter().map(|s| self.transform(s)).collect()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    /// Structural check for deserialized state.
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != FEATURE_LEN || self.std.len() != FEATURE_LEN {
            return Err(anyhow!(
                "scaler holds {}/{} parameters, expected {}",
                self.mean.len(),
                self.std.len(),
                FEATURE_LEN
            ));
        }
        if self.std.iter().any(|s| *s <= 0.0 || !s.is_finite())
            || self.mean.iter().any(|m| !m.is_finite())
        {
            return Err(anyhow!("scaler parameters are not finite and positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(seed: f64) -> FeatureVector {
        let mut values = [0.0; FEATURE_LEN];
        for (i, v) in values.iter_mut().enumerate() {
            *v = seed * (i as f64 + 1.0) + (i % 3) as f64;
        }
        // Slot 49 stays constant across samples.
        values[49] = 7.0;
        FeatureVector::from_array(values)
    }

    #[test]
    fn transform_standardizes_training_data() {
        let samples: Vec<_> = (0..40).map(|i| vector(i as f64 * 0.37)).collect();
        let scaler = Scaler::fit(&samples).unwrap();
        let scaled = scaler.transform_all(&samples);

        for feature in 0..FEATURE_LEN - 1 {
            let column: Vec<f64> = scaled.iter().map(|row| row[feature]).collect();
            let mean = column.iter().sum::<f64>() / column.len() as f64;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / column.len() as f64;
            assert!(mean.abs() < 1e-9, "feature {feature} mean {mean}");
            assert!((var - 1.0).abs() < 1e-9, "feature {feature} var {var}");
        }
    }

    #[test]
    fn constant_feature_uses_unit_std() {
        let samples: Vec<_> = (0..5).map(|i| vector(i as f64)).collect();
        let scaler = Scaler::fit(&samples).unwrap();
        assert_eq!(scaler.std()[49], 1.0);
        assert!(scaler.transform(&samples[0])[49].abs() < 1e-12);
        scaler.validate().unwrap();
    }

    #[test]
    fn fit_rejects_empty_input() {
        assert!(Scaler::fit(&[]).is_err());
    }
}
