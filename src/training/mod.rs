//! Labeled training data.
//!
//! Training consumes `TrainingSample`s from a `TrainingDataSource`. Two
//! sources exist: `SyntheticSource` draws class-conditioned random vectors,
//! and `CorpusSource` extracts features from a directory of labeled videos.

pub mod corpus;
pub mod synthetic;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

pub use corpus::CorpusSource;
pub use synthetic::SyntheticSource;

/// Accepted names for the violent class directory, checked in order.
pub const VIOLENT_DIRS: [&str; 6] = [
    "violence", "violent", "fight", "Violence", "Violent", "Fight",
];

/// Accepted names for the non-violent class directory, checked in order.
pub const SAFE_DIRS: [&str; 6] = [
    "non-violence",
    "non-violent",
    "normal",
    "NonViolence",
    "Non-Violent",
    "Normal",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Safe = 0,
    Violent = 1,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Safe => "safe",
            Label::Violent => "violent",
        }
    }

    /// Directory names accepted for this class.
    pub fn dir_aliases(self) -> &'static [&'static str] {
        match self {
            Label::Safe => &SAFE_DIRS,
            Label::Violent => &VIOLENT_DIRS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub label: Label,
}

impl TrainingSample {
    pub fn new(features: FeatureVector, label: Label) -> Self {
        Self { features, label }
    }
}

/// Producer of labeled feature vectors.
pub trait TrainingDataSource {
    /// Short name used in logs and training reports.
    fn name(&self) -> &str;

    fn load(&self) -> Result<Vec<TrainingSample>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_class_ids() {
        assert_eq!(Label::Safe.as_u8(), 0);
        assert_eq!(Label::Violent.as_u8(), 1);
        assert_eq!(Label::Violent.dir_aliases()[0], "violence");
        assert_eq!(Label::Safe.dir_aliases()[5], "Normal");
    }
}
