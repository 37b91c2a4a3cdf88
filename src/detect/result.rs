use serde::Serialize;

/// Confidence above which a frame is called violent.
pub const DECISION_THRESHOLD: f32 = 0.3;

/// Verdict for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Verdict {
    pub is_violent: bool,
    /// Violent-class probability in [0, 1].
    pub confidence: f32,
}

impl Verdict {
    pub fn from_confidence(confidence: f32, threshold: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            is_violent: confidence > threshold,
            confidence,
        }
    }
}

/// One entry of a live session's rolling result buffer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LiveResult {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub is_violent: bool,
    pub confidence: f32,
}

/// Per-sample record of a video analysis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrameResult {
    /// 0-based index of the decoded frame.
    pub frame_index: u64,
    /// `frame_index / fps`, in seconds.
    pub timestamp: f64,
    pub is_violent: bool,
    pub confidence: f32,
}

/// Clip-level verdict.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VideoReport {
    pub total_frames: u64,
    pub analyzed_frames: u64,
    pub violent_frames: u64,
    pub violence_percentage: f64,
    pub is_violent_video: bool,
    /// Most recent sample records, oldest first.
    pub frame_results: Vec<FrameResult>,
}
