//! Local video source.
//!
//! `VideoFile` resolves a local path to a decoding backend. It refuses URL
//! schemes so analysis never reaches out to the network.

use anyhow::Result;
use std::collections::VecDeque;
use std::path::Path;

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegVideo;
use super::sequence::ImageSequence;
use super::{FrameSource, VideoError};
use crate::frame::Frame;

/// Local video opened for decoding.
pub struct VideoFile {
    backend: VideoBackend,
}

enum VideoBackend {
    Sequence(ImageSequence),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegVideo),
}

impl VideoFile {
    pub fn open(path: &Path, sequence_fps: f64) -> Result<Self> {
        let display = path.display().to_string();
        if !is_local_path(&display) {
            return Err(VideoError::Open {
                path: display,
                reason: "only local paths are supported".to_string(),
            }
            .into());
        }
        if !path.exists() {
            return Err(VideoError::NotFound { path: display }.into());
        }
        if path.is_dir() {
            return Ok(Self {
                backend: VideoBackend::Sequence(ImageSequence::open(path, sequence_fps)?),
            });
        }

        #[cfg(feature = "video-ffmpeg")]
        {
            Ok(Self {
                backend: VideoBackend::Ffmpeg(FfmpegVideo::open(path)?),
            })
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(VideoError::Unsupported { path: display }.into())
        }
    }
}

impl FrameSource for VideoFile {
    fn fps(&self) -> f64 {
        match &self.backend {
            VideoBackend::Sequence(source) => source.fps(),
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.fps(),
        }
    }

    fn frame_count_hint(&self) -> Option<u64> {
        match &self.backend {
            VideoBackend::Sequence(source) => source.frame_count_hint(),
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.frame_count_hint(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            VideoBackend::Sequence(source) => source.next_frame(),
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source for tests and demos
// ----------------------------------------------------------------------------

/// In-memory clip.
#[derive(Clone, Debug)]
pub struct SyntheticVideo {
    frames: VecDeque<Frame>,
    total: u64,
    fps: f64,
}

impl SyntheticVideo {
    pub fn from_frames(frames: Vec<Frame>, fps: f64) -> Self {
        let total = frames.len() as u64;
        Self {
            frames: frames.into(),
            total,
            fps,
        }
    }

    /// `count` identical frames of one color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], count: usize, fps: f64) -> Self {
        let frame = Frame::solid(width, height, rgb);
        Self::from_frames(vec![frame; count], fps)
    }
}

impl FrameSource for SyntheticVideo {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

fn is_local_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
