//! Directory of still images played back as a clip.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, VideoError};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const DEFAULT_FPS: f64 = 30.0;

/// Image files of one directory, ordered by file name.
#[derive(Debug)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    position: usize,
    fps: f64,
}

impl ImageSequence {
    pub fn open(dir: &Path, fps: f64) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|err| VideoError::Open {
            path: dir.display().to_string(),
            reason: err.to_string(),
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("read directory entry in {}", dir.display()))?
                .path();
            if path.is_file() && is_image_file(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(VideoError::NoVideoTrack {
                path: dir.display().to_string(),
            }
            .into());
        }
        paths.sort();

        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_FPS
        };
        log::debug!(
            "ImageSequence: {} frames from {} at {fps} fps",
            paths.len(),
            dir.display()
        );
        Ok(Self {
            paths,
            position: 0,
            fps,
        })
    }
}

impl FrameSource for ImageSequence {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.paths.len() as u64)
    }

    /// Undecodable images come back as empty frames so frame indices stay
    /// aligned with the directory listing.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        match image::open(path) {
            Ok(img) => Ok(Some(Frame::from_dynamic(img))),
            Err(err) => {
                log::warn!("ImageSequence: cannot decode {}: {err}", path.display());
                Ok(Some(Frame::empty()))
            }
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
