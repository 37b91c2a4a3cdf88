//! Per-frame feature vector.
//!
//! `FeatureExtractor::extract` turns one frame plus the session's
//! `FrameHistory` into a fixed 50-slot `FeatureVector`:
//!
//! | Slots  | Feature                                          |
//! |--------|--------------------------------------------------|
//! | 0..3   | motion magnitude, variance, contour count        |
//! | 3      | edge density                                     |
//! | 4      | red-color ratio                                  |
//! | 5..7   | intensity mean, std                              |
//! | 7..9   | gradient mean, std                               |
//! | 9..11  | texture mean, std                                |
//! | 11..14 | edge contour count, max area, mean area          |
//! | 14..17 | frame-difference mean, std, max                  |
//! | 17..33 | 16-bin normalized grayscale histogram            |
//! | 33..36 | per-channel (R, G, B) pixel variance             |
//! | 36..50 | reserved, always zero                            |
//!
//! Extraction never fails from the caller's point of view: any internal
//! error yields the all-zero vector. The history is read, never modified.

pub mod imgproc;

use anyhow::{anyhow, Result};
use std::ops::{Index, Range};

use crate::frame::{Frame, FrameHistory};

/// Number of slots in a feature vector.
pub const FEATURE_LEN: usize = 50;

/// Number of grayscale histogram bins.
pub const HISTOGRAM_BINS: usize = 16;

/// Slot layout of the feature vector.
pub mod slot {
    use std::ops::Range;

    pub const MOTION_MAGNITUDE: usize = 0;
    pub const MOTION_VARIANCE: usize = 1;
    pub const MOTION_CONTOURS: usize = 2;
    pub const EDGE_DENSITY: usize = 3;
    pub const RED_RATIO: usize = 4;
    pub const INTENSITY_MEAN: usize = 5;
    pub const INTENSITY_STD: usize = 6;
    pub const GRADIENT_MEAN: usize = 7;
    pub const GRADIENT_STD: usize = 8;
    pub const TEXTURE_MEAN: usize = 9;
    pub const TEXTURE_STD: usize = 10;
    pub const CONTOUR_COUNT: usize = 11;
    pub const CONTOUR_MAX_AREA: usize = 12;
    pub const CONTOUR_MEAN_AREA: usize = 13;
    pub const DIFF_MEAN: usize = 14;
    pub const DIFF_STD: usize = 15;
    pub const DIFF_MAX: usize = 16;
    pub const HISTOGRAM: Range<usize> = 17..33;
    pub const COLOR_VARIANCE: Range<usize> = 33..36;
    pub const RESERVED: Range<usize> = 36..50;
}

/// Fixed-length numeric summary of one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureVector([f64; FEATURE_LEN]);

impl FeatureVector {
    pub fn zeros() -> Self {
        Self([0.0; FEATURE_LEN])
    }

    pub fn from_array(values: [f64; FEATURE_LEN]) -> Self {
        Self(values)
    }

    /// Build from a slice; fails unless it holds exactly `FEATURE_LEN` values.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let array: [f64; FEATURE_LEN] = values.try_into().map_err(|_| {
            anyhow!(
                "feature vector needs {} values, got {}",
                FEATURE_LEN,
                values.len()
            )
        })?;
        Ok(Self(array))
    }

    pub fn len(&self) -> usize {
        FEATURE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn values(&self) -> &[f64; FEATURE_LEN] {
        &self.0
    }

    pub fn range(&self, range: Range<usize>) -> &[f64] {
        &self.0[range]
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

/// Handcrafted feature extractor.
#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    /// Canny hysteresis thresholds.
    pub edge_low: f32,
    pub edge_high: f32,
    /// Frame-difference level counted as motion.
    pub motion_threshold: u8,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            edge_low: 50.0,
            edge_high: 150.0,
            motion_threshold: 25,
        }
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the feature vector for `frame` against `history`.
    ///
    /// A missing frame, an empty frame or any internal failure produces the
    /// zero vector; the condition is logged.
    pub fn extract(&self, frame: Option<&Frame>, history: &FrameHistory) -> FeatureVector {
        let Some(frame) = frame else {
            log::warn!("feature extraction skipped: no frame");
            return FeatureVector::zeros();
        };
        match self.try_extract(frame, history) {
            Ok(features) => features,
            Err(e) => {
                log::warn!("feature extraction failed: {e:#}");
                FeatureVector::zeros()
            }
        }
    }

    fn try_extract(&self, frame: &Frame, history: &FrameHistory) -> Result<FeatureVector> {
        if frame.is_empty() {
            return Err(anyhow!("empty frame"));
        }

        let mut out = [0.0f64; FEATURE_LEN];
        let gray = frame.to_gray();
        let pixels = frame.pixel_count() as f64;

        if let Some(previous) = history.latest() {
            if !previous.same_dimensions(frame) {
                return Err(anyhow!(
                    "frame is {}x{} but history frame is {}x{}",
                    frame.width(),
                    frame.height(),
                    previous.width(),
                    previous.height()
                ));
            }
            let diff = imgproc::abs_diff(&previous.to_gray(), &gray);
            let (mean, std) = imgproc::mean_std(diff.as_raw().iter().map(|&v| v as f64));
            let moving = imgproc::binary_threshold(&diff, self.motion_threshold);
            let max = diff.as_raw().iter().copied().max().unwrap_or(0);

            out[slot::MOTION_MAGNITUDE] = mean;
            out[slot::MOTION_VARIANCE] = std;
            out[slot::MOTION_CONTOURS] = imgproc::external_contours(&moving).len() as f64;
            out[slot::DIFF_MEAN] = mean;
            out[slot::DIFF_STD] = std;
            out[slot::DIFF_MAX] = max as f64;
        }

        let edges = imgproc::edges(&gray, self.edge_low, self.edge_high);
        let edge_pixels = edges.as_raw().iter().filter(|&&v| v > 0).count();
        out[slot::EDGE_DENSITY] = edge_pixels as f64 / pixels;

        out[slot::RED_RATIO] = imgproc::red_ratio(frame.rgb());

        let (mean, std) = imgproc::mean_std(gray.as_raw().iter().map(|&v| v as f64));
        out[slot::INTENSITY_MEAN] = mean;
        out[slot::INTENSITY_STD] = std;

        let (mean, std) = imgproc::mean_std(imgproc::gradient_magnitudes(&gray));
        out[slot::GRADIENT_MEAN] = mean;
        out[slot::GRADIENT_STD] = std;

        let texture = imgproc::high_pass(&gray);
        let (mean, std) = imgproc::mean_std(texture.as_raw().iter().map(|&v| v as f64));
        out[slot::TEXTURE_MEAN] = mean;
        out[slot::TEXTURE_STD] = std;

        let areas: Vec<f64> = imgproc::external_contours(&edges)
            .iter()
            .map(|c| imgproc::contour_area(c))
            .collect();
        out[slot::CONTOUR_COUNT] = areas.len() as f64;
        if !areas.is_empty() {
            out[slot::CONTOUR_MAX_AREA] = areas.iter().copied().fold(0.0, f64::max);
            out[slot::CONTOUR_MEAN_AREA] = areas.iter().sum::<f64>() / areas.len() as f64;
        }

        let hist = imgproc::normalized_histogram::<HISTOGRAM_BINS>(&gray);
        out[slot::HISTOGRAM].copy_from_slice(&hist);

        let variances = imgproc::channel_variances(frame.rgb());
        out[slot::COLOR_VARIANCE].copy_from_slice(&variances);

        if out.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("non-finite feature value"));
        }

        Ok(FeatureVector(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn checkerboard(size: u32, cell: u32) -> Frame {
        let img = RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([230, 230, 230])
            } else {
                Rgb([20, 20, 20])
            }
        });
        Frame::from_rgb_image(img)
    }

    #[test]
    fn missing_or_empty_frame_yields_zero_vector() {
        let extractor = FeatureExtractor::new();
        let history = FrameHistory::new();

        let none = extractor.extract(None, &history);
        assert_eq!(none.len(), FEATURE_LEN);
        assert!(none.is_zero());

        let empty = extractor.extract(Some(&Frame::empty()), &history);
        assert!(empty.is_zero());
    }

    #[test]
    fn solid_frame_without_history_has_flat_statistics() {
        let extractor = FeatureExtractor::new();
        let history = FrameHistory::new();
        let frame = Frame::solid(32, 24, [100, 100, 100]);

        let f = extractor.extract(Some(&frame), &history);
        assert_eq!(f[slot::MOTION_MAGNITUDE], 0.0);
        assert_eq!(f[slot::MOTION_CONTOURS], 0.0);
        assert_eq!(f[slot::EDGE_DENSITY], 0.0);
        assert_eq!(f[slot::RED_RATIO], 0.0);
        assert!((f[slot::INTENSITY_MEAN] - 100.0).abs() < 1e-9);
        assert_eq!(f[slot::INTENSITY_STD], 0.0);
        assert_eq!(f[slot::GRADIENT_MEAN], 0.0);
        assert_eq!(f[slot::TEXTURE_STD], 0.0);
        assert_eq!(f[slot::CONTOUR_COUNT], 0.0);
        assert_eq!(f[slot::CONTOUR_MEAN_AREA], 0.0);
        assert!(f.range(slot::COLOR_VARIANCE).iter().all(|v| *v == 0.0));
        assert!(f.range(slot::RESERVED).iter().all(|v| *v == 0.0));

        // 100 falls in bin 6 (96..112).
        let hist = f.range(slot::HISTOGRAM);
        assert!((hist[6] - 1.0).abs() < 1e-9);
        assert!((hist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn motion_terms_follow_latest_history_frame() {
        let extractor = FeatureExtractor::new();
        let mut history = FrameHistory::new();
        history.push(Frame::solid(16, 16, [0, 0, 0]));

        let f = extractor.extract(Some(&Frame::solid(16, 16, [200, 200, 200])), &history);
        assert!((f[slot::MOTION_MAGNITUDE] - 200.0).abs() < 1e-9);
        assert_eq!(f[slot::MOTION_VARIANCE], 0.0);
        assert_eq!(f[slot::MOTION_CONTOURS], 1.0);
        assert!((f[slot::DIFF_MEAN] - 200.0).abs() < 1e-9);
        assert_eq!(f[slot::DIFF_MAX], 200.0);

        // Extraction leaves the history untouched.
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn edge_running_into_the_border_is_counted() {
        let extractor = FeatureExtractor::new();
        let img = RgbImage::from_fn(32, 32, |x, _| {
            if x < 16 {
                Rgb([10, 10, 10])
            } else {
                Rgb([240, 240, 240])
            }
        });
        let f = extractor.extract(Some(&Frame::from_rgb_image(img)), &FrameHistory::new());
        assert!(f[slot::EDGE_DENSITY] > 0.0);
        assert!(f[slot::CONTOUR_COUNT] >= 1.0);
        assert!(f[slot::CONTOUR_MAX_AREA] >= f[slot::CONTOUR_MEAN_AREA]);
    }

    #[test]
    fn textured_frame_has_edges_and_contours() {
        let extractor = FeatureExtractor::new();
        let f = extractor.extract(Some(&checkerboard(64, 8)), &FrameHistory::new());
        assert!(f[slot::EDGE_DENSITY] > 0.0);
        assert!(f[slot::GRADIENT_MEAN] > 0.0);
        assert!(f[slot::TEXTURE_STD] > 0.0);
        assert!(f[slot::CONTOUR_COUNT] >= 1.0);
        assert!(f[slot::INTENSITY_STD] > 50.0);
        assert!(f.as_slice().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn red_frame_sets_red_ratio() {
        let extractor = FeatureExtractor::new();
        let f = extractor.extract(Some(&Frame::solid(8, 8, [220, 10, 10])), &FrameHistory::new());
        assert!((f[slot::RED_RATIO] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_history_dimensions_yield_zero_vector() {
        let extractor = FeatureExtractor::new();
        let mut history = FrameHistory::new();
        history.push(Frame::solid(8, 8, [1, 2, 3]));
        let f = extractor.extract(Some(&Frame::solid(4, 4, [1, 2, 3])), &history);
        assert!(f.is_zero());
    }

    #[test]
    fn from_slice_enforces_length() {
        assert!(FeatureVector::from_slice(&[0.0; 49]).is_err());
        let v = FeatureVector::from_slice(&[1.0; FEATURE_LEN]).unwrap();
        assert_eq!(v[49], 1.0);
    }
}
