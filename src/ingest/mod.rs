//! Video frame sources.
//!
//! Every source yields decoded RGB `Frame`s in presentation order through
//! the `FrameSource` trait:
//! - Image sequences (a directory of still images)
//! - Container files decoded with FFmpeg (feature: video-ffmpeg)
//! - In-memory synthetic clips (testing)
//!
//! Only local paths are accepted. Decoded frames are handed to the caller
//! and never written back to disk.

pub mod file;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod sequence;

use anyhow::Result;
use std::path::Path;
use thiserror::Error;

use crate::frame::Frame;

pub use file::{SyntheticVideo, VideoFile};
pub use sequence::ImageSequence;

/// File extensions treated as video containers (compared case-insensitively).
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "avi", "mov", "mkv", "flv", "wmv"];

/// A decoded stream of frames.
pub trait FrameSource {
    /// Frames per second used to turn frame indices into timestamps.
    fn fps(&self) -> f64;

    /// Total frame count when the container reports one.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }

    /// Next decoded frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (**self).frame_count_hint()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// Failure to open a video for decoding.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("video not found: {path}")]
    NotFound { path: String },
    #[error("could not open video {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("no video track in {path}")]
    NoVideoTrack { path: String },
    #[error("no decoder available for {path} (build with the video-ffmpeg feature)")]
    Unsupported { path: String },
}

/// Open `path` with the backend that fits it.
///
/// Directories are read as image sequences played at `sequence_fps`; regular
/// files go through FFmpeg.
pub fn open_video(path: &Path, sequence_fps: f64) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoFile::open(path, sequence_fps)?))
}

/// Whether `path` carries one of the recognized video extensions.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_extensions_match_case_insensitively() {
        assert!(is_video_file(Path::new("clips/a.mp4")));
        assert!(is_video_file(Path::new("clips/B.AVI")));
        assert!(is_video_file(Path::new("x.MkV")));
        assert!(!is_video_file(Path::new("notes.txt")));
        assert!(!is_video_file(Path::new("mp4")));
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = match open_video(Path::new("/definitely/not/here.mp4"), 30.0) {
            Ok(_) => panic!("expected open failure"),
            Err(err) => err,
        };
        assert!(matches!(
            err.downcast_ref::<VideoError>(),
            Some(VideoError::NotFound { .. })
        ));
    }
}
