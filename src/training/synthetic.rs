use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::{Label, TrainingDataSource, TrainingSample};
use crate::features::{slot, FeatureVector, FEATURE_LEN};

/// `(mean, std)` of the normal distribution each slot is drawn from.
type SlotProfile = [(f64, f64); FEATURE_LEN];

/// Class-conditioned random feature vectors.
///
/// Violent samples sit higher on motion, gradient, texture, contour and
/// color-variance slots; safe samples are lower and flatter. Draws are
/// folded to non-negative values with `abs`.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    per_class: usize,
    seed: Option<u64>,
}

impl SyntheticSource {
    pub fn new(per_class: usize) -> Self {
        Self {
            per_class,
            seed: None,
        }
    }

    /// Fix the generator seed. Without one every load draws fresh data.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn per_class(&self) -> usize {
        self.per_class
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl TrainingDataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn load(&self) -> Result<Vec<TrainingSample>> {
        if self.per_class == 0 {
            return Err(anyhow!("synthetic source needs at least one sample per class"));
        }
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut samples = Vec::with_capacity(self.per_class * 2);
        for label in [Label::Violent, Label::Safe] {
            let distributions = distributions(&profile(label))?;
            for _ in 0..self.per_class {
                let mut values = [0.0; FEATURE_LEN];
                for (value, dist) in values.iter_mut().zip(&distributions) {
                    *value = dist.sample(&mut rng).abs();
                }
                samples.push(TrainingSample::new(FeatureVector::from_array(values), label));
            }
        }
        Ok(samples)
    }
}

fn distributions(profile: &SlotProfile) -> Result<Vec<Normal<f64>>> {
    profile
        .iter()
        .map(|&(mean, std)| {
            Normal::new(mean, std).map_err(|err| anyhow!("normal({mean}, {std}): {err}"))
        })
        .collect()
}

fn profile(label: Label) -> SlotProfile {
    match label {
        Label::Violent => build_profile(
            [
                (15.0, 5.0),
                (8.0, 3.0),
                (5.0, 2.0),
                (0.2, 0.05),
                (0.25, 0.1),
                (120.0, 30.0),
                (50.0, 15.0),
                (40.0, 10.0),
                (30.0, 8.0),
                (25.0, 8.0),
                (20.0, 6.0),
                (80.0, 20.0),
                (500.0, 200.0),
                (100.0, 50.0),
                (30.0, 10.0),
                (25.0, 8.0),
                (150.0, 50.0),
            ],
            (0.06, 0.02),
            [(800.0, 200.0), (900.0, 250.0), (700.0, 180.0)],
            (10.0, 3.0),
        ),
        Label::Safe => build_profile(
            [
                (2.0, 1.0),
                (1.5, 0.5),
                (1.0, 0.5),
                (0.05, 0.02),
                (0.05, 0.03),
                (110.0, 15.0),
                (20.0, 5.0),
                (15.0, 5.0),
                (10.0, 3.0),
                (8.0, 3.0),
                (6.0, 2.0),
                (20.0, 8.0),
                (200.0, 80.0),
                (40.0, 15.0),
                (5.0, 2.0),
                (4.0, 1.5),
                (30.0, 10.0),
            ],
            (0.062, 0.01),
            [(300.0, 100.0), (350.0, 120.0), (280.0, 90.0)],
            (3.0, 1.0),
        ),
    }
}

fn build_profile(
    scalars: [(f64, f64); slot::HISTOGRAM.start],
    histogram: (f64, f64),
    color_variance: [(f64, f64); 3],
    reserved: (f64, f64),
) -> SlotProfile {
    let mut out = [(0.0, 0.0); FEATURE_LEN];
    out[..slot::HISTOGRAM.start].copy_from_slice(&scalars);
    out[slot::HISTOGRAM].fill(histogram);
    out[slot::COLOR_VARIANCE].copy_from_slice(&color_variance);
    out[slot::RESERVED].fill(reserved);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_mean(samples: &[TrainingSample], label: Label, idx: usize) -> f64 {
        let values: Vec<f64> = samples
            .iter()
            .filter(|s| s.label == label)
            .map(|s| s.features[idx])
            .collect();
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[test]
    fn balanced_and_non_negative() {
        let samples = SyntheticSource::new(250).with_seed(11).load().unwrap();
        assert_eq!(samples.len(), 500);
        assert_eq!(samples.iter().filter(|s| s.label == Label::Violent).count(), 250);
        assert!(samples
            .iter()
            .all(|s| s.features.as_slice().iter().all(|v| *v >= 0.0)));
    }

    #[test]
    fn violent_class_has_more_motion_and_texture() {
        let samples = SyntheticSource::new(400).with_seed(5).load().unwrap();
        for idx in [
            slot::MOTION_MAGNITUDE,
            slot::GRADIENT_MEAN,
            slot::TEXTURE_MEAN,
            slot::CONTOUR_COUNT,
            slot::COLOR_VARIANCE.start,
        ] {
            assert!(
                class_mean(&samples, Label::Violent, idx) > class_mean(&samples, Label::Safe, idx),
                "slot {idx}"
            );
        }
        let motion = class_mean(&samples, Label::Violent, slot::MOTION_MAGNITUDE);
        assert!((motion - 15.0).abs() < 1.5, "violent motion mean {motion}");
    }

    #[test]
    fn seeded_loads_repeat() {
        let a = SyntheticSource::new(10).with_seed(9).load().unwrap();
        let b = SyntheticSource::new(10).with_seed(9).load().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn profiles_cover_every_slot() {
        for label in [Label::Violent, Label::Safe] {
            assert!(profile(label).iter().all(|(_, std)| *std > 0.0));
        }
        assert_eq!(profile(Label::Violent)[slot::RESERVED.start], (10.0, 3.0));
        assert_eq!(profile(Label::Safe)[slot::HISTOGRAM.end - 1], (0.062, 0.01));
    }
}
