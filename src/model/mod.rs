//! Standardization + classification stage.
//!
//! `train` fits a `Scaler` on the full feature matrix, standardizes it and
//! fits a class-balanced `RandomForest` on the result. `TrainedModel::infer`
//! standardizes one vector with the already-fit scaler and returns the
//! violent-class probability. A trained model is read-only; retraining
//! builds a new one.

pub mod forest;
pub mod scaler;
pub mod store;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::sync::{Arc, RwLock};

use crate::features::FeatureVector;
use crate::training::{Label, TrainingSample};

pub use forest::{DecisionTree, ForestParams, RandomForest};
pub use scaler::Scaler;
pub use store::ModelStore;

/// Fitted scaler and classifier pair.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainedModel {
    scaler: Scaler,
    classifier: RandomForest,
}

/// Summary of one training run.
#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub source: String,
    pub samples: usize,
    pub violent_samples: usize,
    pub safe_samples: usize,
    /// Accuracy on the training set itself.
    pub accuracy: f64,
}

impl TrainedModel {
    pub fn new(scaler: Scaler, classifier: RandomForest) -> Result<Self> {
        scaler.validate().context("invalid scaler state")?;
        classifier.validate().context("invalid classifier state")?;
        Ok(Self { scaler, classifier })
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &RandomForest {
        &self.classifier
    }

    /// Violent-class probability in [0, 1].
    pub fn infer(&self, features: &FeatureVector) -> f32 {
        let scaled = self.scaler.transform(features);
        self.classifier.predict_proba(&scaled) as f32
    }
}

/// Shared slot holding the model every session infers with.
///
/// Readers clone the inner `Arc` and drop the lock before inference, so a
/// retrain swaps the whole pair at once and in-flight calls finish on the
/// model they started with.
#[derive(Clone, Debug)]
pub struct SharedModel {
    slot: Arc<RwLock<Arc<TrainedModel>>>,
}

impl SharedModel {
    pub fn new(model: TrainedModel) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::new(model))),
        }
    }

    pub fn current(&self) -> Arc<TrainedModel> {
        let guard = self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, model: TrainedModel) {
        let mut guard = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(model);
    }
}

/// Fit scaler and classifier on `samples`.
pub fn train(
    samples: &[TrainingSample],
    params: &ForestParams,
    source: &str,
) -> Result<(TrainedModel, TrainingReport)> {
    if samples.is_empty() {
        return Err(anyhow!("no training samples"));
    }
    let features: Vec<FeatureVector> = samples.iter().map(|s| s.features).collect();
    let labels: Vec<u8> = samples.iter().map(|s| s.label.as_u8()).collect();

    let scaler = Scaler::fit(&features)?;
    let scaled = scaler.transform_all(&features);
    let classifier = RandomForest::fit(&scaled, &labels, params).context("fit classifier")?;
    let accuracy = classifier.score(&scaled, &labels);

    let violent_samples = samples.iter().filter(|s| s.label == Label::Violent).count();
    let report = TrainingReport {
        source: source.to_string(),
        samples: samples.len(),
        violent_samples,
        safe_samples: samples.len() - violent_samples,
        accuracy,
    };
    log::info!(
        "trained {} trees on {} {} samples ({} violent / {} safe), training accuracy {:.3}",
        params.n_trees,
        report.samples,
        report.source,
        report.violent_samples,
        report.safe_samples,
        report.accuracy
    );

    Ok((TrainedModel::new(scaler, classifier)?, report))
}
