//! Raster primitives behind the feature vector.
//!
//! Edge detection, Sobel derivatives and contour tracing come from
//! `imageproc`. The remaining operations are small per-pixel passes that
//! follow the 8-bit conventions of common vision libraries (0-180 hue scale,
//! reflect-101 borders, saturating filters).

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::find_contours;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::point::Point;

/// Population mean and standard deviation.
pub fn mean_std<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for v in values {
        count += 1;
        sum += v;
        sum_sq += v * v;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

/// Per-pixel `|a - b|`. Both images must share dimensions.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let data = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.abs_diff(y))
        .collect();
    GrayImage::from_raw(a.width(), a.height(), data).unwrap_or_else(|| GrayImage::new(0, 0))
}

/// Binary threshold: pixels strictly above `thresh` become 255, others 0.
pub fn binary_threshold(image: &GrayImage, thresh: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > thresh { 255 } else { 0 };
    }
    out
}

/// Outer borders of top-level connected components.
///
/// The map is traced inside a one-pixel zero frame so components touching
/// the image border still come back as outer borders.
pub fn external_contours(binary: &GrayImage) -> Vec<Vec<Point<i32>>> {
    let mut padded = GrayImage::new(binary.width() + 2, binary.height() + 2);
    image::imageops::replace(&mut padded, binary, 1, 1);
    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect()
        })
        .collect()
}

/// Polygon area of a traced contour (shoelace formula).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

/// Canny edge map (edges are 255).
pub fn edges(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    imageproc::edges::canny(gray, low, high)
}

/// Sobel gradient magnitudes `sqrt(gx^2 + gy^2)`, row-major.
pub fn gradient_magnitudes(gray: &GrayImage) -> Vec<f64> {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    gx.as_raw()
        .iter()
        .zip(gy.as_raw())
        .map(|(&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (x * x + y * y).sqrt()
        })
        .collect()
}

/// 3x3 high-pass kernel `[-1 -1 -1; -1 8 -1; -1 -1 -1]`, saturated to 0..=255.
pub fn high_pass(gray: &GrayImage) -> GrayImage {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0i32;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let sx = reflect_101(x + dx, w);
                    let sy = reflect_101(y + dy, h);
                    let v = gray.get_pixel(sx, sy).0[0] as i32;
                    acc += if dx == 0 && dy == 0 { 8 * v } else { -v };
                }
            }
            out.put_pixel(x as u32, y as u32, Luma([acc.clamp(0, 255) as u8]));
        }
    }
    out
}

fn reflect_101(i: i64, len: i64) -> u32 {
    if len <= 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * len - 2 - i;
    }
    i.clamp(0, len - 1) as u32
}

/// RGB to HSV with hue on 0..180 and saturation/value on 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;
    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    ((h / 2.0).round() as u8, s.round() as u8, v as u8)
}

/// Fraction of pixels whose hue falls in either red band (red wraps the
/// hue circle) with enough saturation and brightness.
pub fn red_ratio(rgb: &RgbImage) -> f64 {
    let total = rgb.width() as usize * rgb.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let red = rgb
        .pixels()
        .filter(|p| {
            let (h, s, v) = rgb_to_hsv(p.0[0], p.0[1], p.0[2]);
            let saturated = s >= 50 && v >= 50;
            saturated && (h <= 10 || (170..=180).contains(&h))
        })
        .count();
    red as f64 / total as f64
}

/// L1-normalized intensity histogram with `N` equal-width bins over 0..256.
pub fn normalized_histogram<const N: usize>(gray: &GrayImage) -> [f64; N] {
    let mut hist = [0.0f64; N];
    let bin_width = 256 / N;
    for p in gray.pixels() {
        let idx = (p.0[0] as usize / bin_width).min(N - 1);
        hist[idx] += 1.0;
    }
    let total: f64 = hist.iter().sum();
    if total > 0.0 {
        for bin in hist.iter_mut() {
            *bin /= total;
        }
    }
    hist
}

/// Population variance of each RGB channel.
pub fn channel_variances(rgb: &RgbImage) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (channel, slot) in out.iter_mut().enumerate() {
        let (_, std) = mean_std(rgb.pixels().map(|p| p.0[channel] as f64));
        *slot = std * std;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_std_matches_population_formula() {
        let (mean, std) = mean_std([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-9);
        assert!((std - 2.0).abs() < 1e-9);
        assert_eq!(mean_std(std::iter::empty()), (0.0, 0.0));
    }

    #[test]
    fn hsv_red_wraps_hue_circle() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        let (h, _, _) = rgb_to_hsv(255, 0, 40);
        assert!(h >= 170);
        let (h, _, _) = rgb_to_hsv(0, 255, 0);
        assert_eq!(h, 60);
    }

    #[test]
    fn red_ratio_counts_both_bands() {
        let mut img = RgbImage::from_pixel(4, 1, image::Rgb([0, 0, 255]));
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([255, 0, 40]));
        assert!((red_ratio(&img) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn high_pass_is_zero_on_flat_image() {
        let flat = GrayImage::from_pixel(5, 5, Luma([90]));
        assert!(high_pass(&flat).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn single_blob_yields_one_external_contour() {
        let mut img = GrayImage::new(10, 10);
        for y in 2..6 {
            for x in 2..6 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        assert!((contour_area(&contours[0]) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn blob_touching_the_corner_is_still_external() {
        let mut img = GrayImage::new(10, 10);
        for y in 0..4 {
            for x in 0..4 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        assert!((contour_area(&contours[0]) - 9.0).abs() < 1e-9);
        assert!(contours[0].iter().all(|p| p.x >= 0 && p.y >= 0));
    }

    #[test]
    fn full_frame_component_counts_once() {
        for side in [4, 16, 64] {
            let img = GrayImage::from_pixel(side, side, Luma([255]));
            let contours = external_contours(&img);
            assert_eq!(contours.len(), 1, "side {side}");
            let expected = ((side - 1) * (side - 1)) as f64;
            assert!((contour_area(&contours[0]) - expected).abs() < 1e-9);
        }
        assert!(external_contours(&GrayImage::new(8, 8)).is_empty());
    }

    #[test]
    fn histogram_is_l1_normalized() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([0]));
        img.put_pixel(0, 0, Luma([255]));
        let hist = normalized_histogram::<16>(&img);
        assert!((hist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((hist[15] - 1.0 / 16.0).abs() < 1e-9);
    }
}
