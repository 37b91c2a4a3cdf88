//! Violence Detector
//!
//! Classifies camera frames and video clips as violent or safe from a
//! fixed set of handcrafted visual features.
//!
//! # Architecture
//!
//! Frames flow through one pipeline:
//!
//! 1. **Extract**: a 50-slot `FeatureVector` (motion, edges, red ratio,
//!    intensity, gradient, texture, contours, frame difference, histogram,
//!    color variance) computed against a short per-stream `FrameHistory`.
//! 2. **Standardize**: a `Scaler` fit once on the training set.
//! 3. **Classify**: a class-balanced random forest returns the violent-class
//!    probability; confidence above 0.3 is a violent verdict.
//!
//! Clips are sampled every tenth frame and rolled into a `VideoReport`.
//!
//! # Module Structure
//!
//! - `frame`: RGB frames and the bounded frame history
//! - `features`: feature extraction and raster primitives
//! - `training`: synthetic and corpus-derived labeled samples
//! - `model`: scaler, forest, training entry point and artifact store
//! - `ingest`: video frame sources (image sequences, FFmpeg)
//! - `detect`: sessions, clip aggregation and the `ViolenceDetector` service
//! - `config`: file + environment configuration
//! - `ui`: terminal progress for the binaries

pub mod config;
pub mod detect;
pub mod features;
pub mod frame;
pub mod ingest;
pub mod model;
pub mod training;
pub mod ui;

pub use config::DetectorConfig;
pub use detect::{
    DetectionSession, FrameResult, Verdict, VideoAggregator, VideoReport, ViolenceDetector,
    DECISION_THRESHOLD,
};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_LEN};
pub use frame::{Frame, FrameHistory, HISTORY_CAPACITY};
pub use ingest::{open_video, FrameSource, VideoError};
pub use model::{ModelStore, TrainedModel, TrainingReport};
pub use training::{CorpusSource, Label, SyntheticSource, TrainingDataSource, TrainingSample};
