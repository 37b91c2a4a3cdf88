use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use super::result::{LiveResult, Verdict};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::frame::{Frame, FrameHistory};
use crate::model::SharedModel;

/// Results kept per live session.
pub const RESULT_BUFFER: usize = 100;

/// One detection stream (a camera feed or a clip).
///
/// A session owns its frame history and result buffer; it is not meant to
/// be shared between streams. The model is shared and read-only.
pub struct DetectionSession {
    model: SharedModel,
    extractor: FeatureExtractor,
    history: FrameHistory,
    threshold: f32,
    results: VecDeque<LiveResult>,
}

impl DetectionSession {
    pub fn new(model: SharedModel, threshold: f32) -> Self {
        Self {
            model,
            extractor: FeatureExtractor::default(),
            history: FrameHistory::new(),
            threshold,
            results: VecDeque::with_capacity(RESULT_BUFFER),
        }
    }

    /// Classify `frame` against the current history, then append it.
    ///
    /// An empty frame yields a non-violent zero-confidence verdict and leaves
    /// the session untouched.
    pub fn detect(&mut self, frame: &Frame) -> Verdict {
        if frame.is_empty() {
            return Verdict::default();
        }
        let features = self.extractor.extract(Some(frame), &self.history);
        let verdict = self.classify(&features);
        self.history.push(frame.clone());
        self.record(verdict);
        verdict
    }

    /// Features the next `detect` call would see for `frame`.
    pub fn features(&self, frame: &Frame) -> FeatureVector {
        self.extractor.extract(Some(frame), &self.history)
    }

    fn classify(&self, features: &FeatureVector) -> Verdict {
        let confidence = self.model.current().infer(features);
        Verdict::from_confidence(confidence, self.threshold)
    }

    fn record(&mut self, verdict: Verdict) {
        if self.results.len() == RESULT_BUFFER {
            self.results.pop_front();
        }
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.results.push_back(LiveResult {
            timestamp,
            is_violent: verdict.is_violent,
            confidence: verdict.confidence,
        });
    }

    /// Last `n` results, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LiveResult> {
        let skip = self.results.len().saturating_sub(n);
        self.results.iter().skip(skip).copied().collect()
    }

    /// Violent results currently in the buffer.
    pub fn violent_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_violent).count()
    }

    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Drop history and results before a new run.
    pub fn reset(&mut self) {
        self.history.clear();
        self.results.clear();
    }
}
