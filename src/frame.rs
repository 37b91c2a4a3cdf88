//! Frames and the per-session frame history.
//!
//! - `Frame`: immutable 3-channel RGB raster. Cloning shares the pixel buffer.
//! - `FrameHistory`: bounded FIFO of the most recent frames, used for the
//!   motion and frame-difference features.
//!
//! A `FrameHistory` belongs to exactly one detection stream. It is mutated on
//! every detect call and must not be shared between concurrent streams.

use anyhow::{anyhow, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use std::collections::VecDeque;
use std::sync::Arc;

/// Maximum number of frames a history keeps.
pub const HISTORY_CAPACITY: usize = 10;

// ----------------------------------------------------------------------------
// Frame: immutable RGB raster
// ----------------------------------------------------------------------------

/// Immutable RGB frame. Dimensions vary by source; a 0x0 frame is "empty"
/// and stands in for a missing or undecodable capture.
#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbImage>,
}

impl Frame {
    /// Wrap packed RGB24 bytes. Fails when the buffer does not match the
    /// dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("invalid frame buffer"))?;
        Ok(Self::from_rgb_image(image))
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::from_rgb_image(image.into_rgb8())
    }

    /// The empty (0x0) frame.
    pub fn empty() -> Self {
        Self::from_rgb_image(RgbImage::new(0, 0))
    }

    /// Single-color frame.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from_rgb_image(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.image
    }

    /// Packed RGB24 bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Luma conversion with BT.601 weights, rounded to nearest.
    pub fn to_gray(&self) -> GrayImage {
        let gray: Vec<u8> = self
            .image
            .as_raw()
            .chunks_exact(3)
            .map(|rgb| {
                let val = rgb[0] as u32 * 299 + rgb[1] as u32 * 587 + rgb[2] as u32 * 114;
                ((val + 500) / 1000) as u8
            })
            .collect();
        GrayImage::from_raw(self.width(), self.height(), gray)
            .unwrap_or_else(|| GrayImage::new(0, 0))
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width() == other.width() && self.height() == other.height()
    }
}

// ----------------------------------------------------------------------------
// FrameHistory: bounded FIFO of recent frames
// ----------------------------------------------------------------------------

/// Bounded FIFO of the most recent frames. The oldest frame is evicted first.
#[derive(Clone, Debug)]
pub struct FrameHistory {
    frames: VecDeque<Frame>,
    max_frames: usize,
}

impl FrameHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// History holding at most `max_frames` frames (minimum 1).
    pub fn with_capacity(max_frames: usize) -> Self {
        let max_frames = max_frames.max(1);
        Self {
            frames: VecDeque::with_capacity(max_frames),
            max_frames,
        }
    }

    /// Push a frame, evicting the oldest frames when at capacity.
    pub fn push(&mut self, frame: Frame) {
        while self.frames.len() >= self.max_frames {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Most recent frame.
    pub fn latest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Frames from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 10], 2, 2).is_err());
        let frame = Frame::new(vec![7u8; 12], 2, 2).unwrap();
        assert_eq!(frame.pixel_count(), 4);
        assert!(!frame.is_empty());
    }

    #[test]
    fn empty_frame_has_no_pixels() {
        let frame = Frame::empty();
        assert!(frame.is_empty());
        assert_eq!(frame.to_gray().len(), 0);
    }

    #[test]
    fn gray_uses_bt601_weights() {
        let red = Frame::solid(2, 2, [255, 0, 0]);
        assert!(red.to_gray().pixels().all(|p| p.0[0] == 76));

        let white = Frame::solid(2, 2, [255, 255, 255]);
        assert!(white.to_gray().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = FrameHistory::new();
        for i in 0..15u8 {
            history.push(Frame::solid(1, 1, [i, 0, 0]));
            assert!(history.len() <= HISTORY_CAPACITY);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        let first = history.iter().next().unwrap();
        assert_eq!(first.as_raw()[0], 5);
        assert_eq!(history.latest().unwrap().as_raw()[0], 14);
    }

    #[test]
    fn history_capacity_is_at_least_one() {
        let mut history = FrameHistory::with_capacity(0);
        history.push(Frame::solid(1, 1, [1, 1, 1]));
        history.push(Frame::solid(1, 1, [2, 2, 2]));
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().as_raw()[0], 2);

        history.clear();
        assert!(history.is_empty());
    }
}
