//! Clip-level aggregation.
//!
//! Every `sample_stride`-th decoded frame (0-based) runs through the
//! per-frame pipeline with a history private to the clip. The clip is
//! violent when the share of violent samples exceeds `violent_percentage`.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::Path;

use super::result::{FrameResult, Verdict, VideoReport};
use crate::config::VideoConfig;
use crate::features::FeatureExtractor;
use crate::frame::FrameHistory;
use crate::ingest::{self, FrameSource};
use crate::model::TrainedModel;

#[derive(Clone, Debug)]
pub struct VideoAggregator {
    extractor: FeatureExtractor,
    threshold: f32,
    sample_stride: u64,
    violent_percentage: f64,
    report_tail: usize,
    sequence_fps: f64,
}

impl VideoAggregator {
    pub fn new(config: &VideoConfig, threshold: f32) -> Self {
        Self {
            extractor: FeatureExtractor::default(),
            threshold,
            sample_stride: config.sample_stride.max(1),
            violent_percentage: config.violent_percentage,
            report_tail: config.report_tail,
            sequence_fps: config.sequence_fps,
        }
    }

    /// Open `path` and analyze it. Open failures surface as
    /// `ingest::VideoError`.
    pub fn analyze(&self, model: &TrainedModel, path: &Path) -> Result<VideoReport> {
        let mut source = ingest::open_video(path, self.sequence_fps)?;
        let report = self
            .analyze_source(model, &mut *source)
            .with_context(|| format!("analyze {}", path.display()))?;
        log::info!(
            "{}: {}/{} sampled frames violent ({:.1}%), video violent: {}",
            path.display(),
            report.violent_frames,
            report.analyzed_frames,
            report.violence_percentage,
            report.is_violent_video
        );
        Ok(report)
    }

    pub fn analyze_source(
        &self,
        model: &TrainedModel,
        source: &mut dyn FrameSource,
    ) -> Result<VideoReport> {
        self.analyze_with_progress(model, source, |_| {})
    }

    /// Like `analyze_source`, calling `progress` with the number of frames
    /// decoded so far.
    pub fn analyze_with_progress<F>(
        &self,
        model: &TrainedModel,
        source: &mut dyn FrameSource,
        mut progress: F,
    ) -> Result<VideoReport>
    where
        F: FnMut(u64),
    {
        let fps = source.fps();
        let mut history = FrameHistory::new();
        let mut tail: VecDeque<FrameResult> = VecDeque::with_capacity(self.report_tail);
        let mut total_frames = 0u64;
        let mut analyzed_frames = 0u64;
        let mut violent_frames = 0u64;

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("decoding stopped after {total_frames} frames: {err:#}");
                    break;
                }
            };
            let index = total_frames;
            total_frames += 1;
            progress(total_frames);

            if index % self.sample_stride != 0 {
                continue;
            }

            let verdict = if frame.is_empty() {
                Verdict::default()
            } else {
                let features = self.extractor.extract(Some(&frame), &history);
                history.push(frame);
                Verdict::from_confidence(model.infer(&features), self.threshold)
            };

            analyzed_frames += 1;
            if verdict.is_violent {
                violent_frames += 1;
            }
            if self.report_tail > 0 {
                if tail.len() == self.report_tail {
                    tail.pop_front();
                }
                tail.push_back(FrameResult {
                    frame_index: index,
                    timestamp: if fps > 0.0 { index as f64 / fps } else { 0.0 },
                    is_violent: verdict.is_violent,
                    confidence: verdict.confidence,
                });
            }
        }

        let violence_percentage = if analyzed_frames > 0 {
            violent_frames as f64 / analyzed_frames as f64 * 100.0
        } else {
            0.0
        };
        Ok(VideoReport {
            total_frames,
            analyzed_frames,
            violent_frames,
            violence_percentage,
            is_violent_video: violence_percentage > self.violent_percentage,
            frame_results: tail.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DECISION_THRESHOLD;
    use crate::frame::Frame;
    use crate::ingest::SyntheticVideo;
    use crate::model::{train, ForestParams};
    use crate::training::{SyntheticSource, TrainingDataSource};

    fn model() -> TrainedModel {
        let samples = SyntheticSource::new(100).with_seed(8).load().unwrap();
        let params = ForestParams {
            n_trees: 10,
            max_depth: 6,
            ..ForestParams::standard()
        };
        train(&samples, &params, "synthetic").unwrap().0
    }

    fn aggregator() -> VideoAggregator {
        VideoAggregator::new(&VideoConfig::default(), DECISION_THRESHOLD)
    }

    #[test]
    fn samples_every_tenth_frame() {
        let mut video = SyntheticVideo::solid(32, 24, [90, 120, 90], 100, 25.0);
        let report = aggregator().analyze_source(&model(), &mut video).unwrap();

        assert_eq!(report.total_frames, 100);
        assert_eq!(report.analyzed_frames, 10);
        assert_eq!(report.frame_results.len(), 10);
        let indices: Vec<u64> = report.frame_results.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices, (0..100).step_by(10).collect::<Vec<u64>>());
        assert!((report.frame_results[3].timestamp - 1.2).abs() < 1e-9);
        assert_eq!(report.is_violent_video, report.violence_percentage > 30.0);
    }

    #[test]
    fn report_keeps_last_twenty_samples() {
        let mut video = SyntheticVideo::solid(8, 8, [30, 30, 30], 305, 30.0);
        let report = aggregator().analyze_source(&model(), &mut video).unwrap();
        assert_eq!(report.analyzed_frames, 31);
        assert_eq!(report.frame_results.len(), 20);
        assert_eq!(report.frame_results.first().map(|r| r.frame_index), Some(110));
        assert_eq!(report.frame_results.last().map(|r| r.frame_index), Some(300));
    }

    #[test]
    fn empty_clip_reports_zero_percentage() {
        let mut video = SyntheticVideo::from_frames(Vec::new(), 30.0);
        let report = aggregator().analyze_source(&model(), &mut video).unwrap();
        assert_eq!(report, VideoReport::default());
    }

    #[test]
    fn empty_frames_count_as_safe_samples() {
        let frames = vec![Frame::empty(); 20];
        let mut video = SyntheticVideo::from_frames(frames, 30.0);
        let report = aggregator().analyze_source(&model(), &mut video).unwrap();
        assert_eq!(report.analyzed_frames, 2);
        assert_eq!(report.violent_frames, 0);
    }
}
