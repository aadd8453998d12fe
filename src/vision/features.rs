//! Feature extraction shared by live frames and digit templates.
//!
//! A raster is reduced to two representations:
//! - a binary colour mask isolating the yellow cooldown digits (HSV threshold
//!   with a brightness floor adapted to the region's own median value)
//! - a Sobel gradient-magnitude map with its mean and norm precomputed for
//!   normalized cross-correlation

use image::{GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};

/// Mask value for digit ink.
pub const INK: u8 = 0;
/// Mask value for background.
pub const BACKGROUND: u8 = 255;

/// Hue window of the in-game digit colour, in degrees.
const HUE_MIN: f32 = 40.0;
const HUE_MAX: f32 = 75.0;
const SATURATION_MIN: f32 = 0.4;

/// Bounds of the adaptive brightness floor.
const VALUE_FLOOR_MIN: f32 = 0.45;
const VALUE_FLOOR_MAX: f32 = 0.65;
const VALUE_FLOOR_FACTOR: f32 = 0.9;
/// Target number of samples for the median brightness estimate.
const MEDIAN_SAMPLES: u32 = 400;
const MEDIAN_FALLBACK: f32 = 0.6;

/// Minimum ink cells (of 9) for the majority filter to keep a pixel as ink.
const MAJORITY_MIN: u32 = 4;

/// A raster reduced to its matching features.
///
/// `color_mask` and `edge_map` always describe the same `width` x `height` grid.
#[derive(Clone, Debug)]
pub struct FeatureRep {
    pub width: u32,
    pub height: u32,
    pub color_mask: GrayImage,
    pub edge_map: Vec<f32>,
    pub edge_mean: f32,
    pub edge_norm: f32,
}

impl FeatureRep {
    /// Runs the full pipeline on an RGBA raster.
    pub fn from_image(img: &RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let color_mask = yellow_mask(img);
        let gray = to_gray(img);
        let edge_map = sobel_magnitude(&gray);
        let (edge_mean, edge_norm) = mean_and_norm(&edge_map);
        Self {
            width,
            height,
            color_mask,
            edge_map,
            edge_mean,
            edge_norm,
        }
    }

    /// Number of ink pixels in the colour mask.
    pub fn ink_count(&self) -> usize {
        self.color_mask.pixels().filter(|p| p[0] == INK).count()
    }
}

/// Converts RGB (0-255) to HSV with hue in degrees and saturation/value in 0.0-1.0.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let s = if max == 0.0 { 0.0 } else { d / max };
    let mut h = 0.0;
    if d != 0.0 {
        h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        h /= 6.0;
    }
    (h * 360.0, s, max)
}

/// Brightness floor for ink classification, derived from the median HSV value
/// of a strided sample of the raster.
pub fn adaptive_value_floor(img: &RgbaImage) -> f32 {
    let pixel_count = img.width() * img.height();
    let step = (pixel_count / MEDIAN_SAMPLES).max(1) as usize;

    let mut values: Vec<f32> = img
        .pixels()
        .step_by(step)
        .map(|p| rgb_to_hsv(p[0], p[1], p[2]).2)
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));

    let median = values
        .get(values.len() / 2)
        .copied()
        .unwrap_or(MEDIAN_FALLBACK);
    (median * VALUE_FLOOR_FACTOR).clamp(VALUE_FLOOR_MIN, VALUE_FLOOR_MAX)
}

/// Converts image to binary by keeping only yellow digit pixels.
///
/// Ink becomes black (0), everything else white (255). A 3x3 majority pass
/// then removes isolated pixels left over from anti-aliased edges.
pub fn yellow_mask(img: &RgbaImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let value_floor = adaptive_value_floor(img);

    let raw: GrayImage = ImageBuffer::from_fn(width, height, |x, y| {
        let p = img.get_pixel(x, y);
        let (h, s, v) = rgb_to_hsv(p[0], p[1], p[2]);
        let is_ink = (HUE_MIN..=HUE_MAX).contains(&h) && s >= SATURATION_MIN && v >= value_floor;
        Luma([if is_ink { INK } else { BACKGROUND }])
    });

    majority_denoise(&raw)
}

/// 3x3 majority filter on interior pixels. Border pixels keep their value.
pub fn majority_denoise(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = mask.clone();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut ink = 0;
            for yy in y - 1..=y + 1 {
                for xx in x - 1..=x + 1 {
                    if mask.get_pixel(xx, yy)[0] == INK {
                        ink += 1;
                    }
                }
            }
            let value = if ink >= MAJORITY_MIN { INK } else { BACKGROUND };
            out.put_pixel(x, y, Luma([value]));
        }
    }
    out
}

/// Rec. 709 luma, rounded to the nearest integer.
pub fn to_gray(img: &RgbaImage) -> GrayImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let p: &Rgba<u8> = img.get_pixel(x, y);
        let luma = 0.2126 * p[0] as f32 + 0.7152 * p[1] as f32 + 0.0722 * p[2] as f32;
        Luma([luma.round() as u8])
    })
}

/// Sobel gradient magnitude, row-major. Border cells are zero.
pub fn sobel_magnitude(gray: &GrayImage) -> Vec<f32> {
    const GX: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
    const GY: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

    let (width, height) = gray.dimensions();
    let mut out = vec![0.0f32; (width * height) as usize];
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut gx = 0.0;
            let mut gy = 0.0;
            let mut k = 0;
            for yy in y - 1..=y + 1 {
                for xx in x - 1..=x + 1 {
                    let v = gray.get_pixel(xx, yy)[0] as f32;
                    gx += v * GX[k];
                    gy += v * GY[k];
                    k += 1;
                }
            }
            out[(y * width + x) as usize] = gx.hypot(gy);
        }
    }
    out
}

/// Mean and L2 norm of the mean-subtracted vector.
pub fn mean_and_norm(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let sq: f32 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (mean, sq.sqrt())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const YELLOW: Rgba<u8> = Rgba([255, 220, 40, 255]);
    pub(crate) const DARK: Rgba<u8> = Rgba([20, 24, 30, 255]);

    /// Renders a blocky synthetic "digit": yellow strokes on a dark background.
    /// `seed` changes the stroke layout so different values look different.
    pub(crate) fn synthetic_digit(size: u32, seed: u32) -> RgbaImage {
        let third = size / 3;
        ImageBuffer::from_fn(size, size, |x, y| {
            let in_margin = x < 4 || y < 4 || x >= size - 4 || y >= size - 4;
            if in_margin {
                return DARK;
            }
            let vertical_bar = (x / 4 + seed) % 3 == 0;
            let horizontal_bar = (y / third + seed / 3) % 2 == 0 && (y % third) < 4;
            if vertical_bar || horizontal_bar {
                YELLOW
            } else {
                DARK
            }
        })
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));

        let (h, _, _) = rgb_to_hsv(0, 255, 0);
        assert!((h - 120.0).abs() < 1e-3);

        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert!((h - 240.0).abs() < 1e-3);

        let (h, s, v) = rgb_to_hsv(0, 0, 0);
        assert_eq!((h, s, v), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_yellow_is_inside_hue_window() {
        let (h, s, v) = rgb_to_hsv(YELLOW[0], YELLOW[1], YELLOW[2]);
        assert!((HUE_MIN..=HUE_MAX).contains(&h), "hue {}", h);
        assert!(s >= SATURATION_MIN);
        assert!(v >= VALUE_FLOOR_MAX);
    }

    #[test]
    fn test_value_floor_is_clamped() {
        let black: RgbaImage = ImageBuffer::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        assert_eq!(adaptive_value_floor(&black), VALUE_FLOOR_MIN);

        let white: RgbaImage = ImageBuffer::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        assert_eq!(adaptive_value_floor(&white), VALUE_FLOOR_MAX);

        // Mid grey: v = 128/255 ~ 0.502, * 0.9 ~ 0.452 -> just above the floor
        let grey: RgbaImage = ImageBuffer::from_pixel(10, 10, Rgba([128, 128, 128, 255]));
        let floor = adaptive_value_floor(&grey);
        assert!(floor > VALUE_FLOOR_MIN && floor < VALUE_FLOOR_MAX);
    }

    #[test]
    fn test_yellow_mask_isolates_digit_colour() {
        let mut img: RgbaImage = ImageBuffer::from_pixel(9, 9, DARK);
        for y in 2..7 {
            for x in 2..7 {
                img.put_pixel(x, y, YELLOW);
            }
        }
        // A white pixel is bright but unsaturated: never ink
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));

        let mask = yellow_mask(&img);
        assert_eq!(mask.get_pixel(4, 4)[0], INK);
        assert_eq!(mask.get_pixel(0, 0)[0], BACKGROUND);
        assert_eq!(mask.get_pixel(8, 8)[0], BACKGROUND);
    }

    #[test]
    fn test_majority_denoise_removes_isolated_pixel() {
        let mut mask: GrayImage = ImageBuffer::from_pixel(5, 5, Luma([BACKGROUND]));
        mask.put_pixel(2, 2, Luma([INK]));
        let out = majority_denoise(&mask);
        assert_eq!(out.get_pixel(2, 2)[0], BACKGROUND);
    }

    #[test]
    fn test_majority_denoise_fills_from_neighbours() {
        let mut mask: GrayImage = ImageBuffer::from_pixel(5, 5, Luma([BACKGROUND]));
        for (x, y) in [(1, 1), (2, 1), (3, 1), (1, 2)] {
            mask.put_pixel(x, y, Luma([INK]));
        }
        let out = majority_denoise(&mask);
        // (2,2) has 4 ink neighbours and becomes ink
        assert_eq!(out.get_pixel(2, 2)[0], INK);
        // (1,1) only sees 3 ink cells in its window
        assert_eq!(out.get_pixel(1, 1)[0], BACKGROUND);
        // Border pixels are untouched
        assert_eq!(out.get_pixel(0, 0)[0], BACKGROUND);
    }

    #[test]
    fn test_sobel_flat_image_has_no_edges() {
        let gray: GrayImage = ImageBuffer::from_pixel(6, 6, Luma([90]));
        assert!(sobel_magnitude(&gray).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_sobel_vertical_step() {
        let gray: GrayImage =
            ImageBuffer::from_fn(6, 6, |x, _| Luma([if x < 3 { 0 } else { 100 }]));
        let edges = sobel_magnitude(&gray);
        // Columns 2 and 3 straddle the step: |gx| = (1 + 2 + 1) * 100
        assert_eq!(edges[(2 * 6 + 2) as usize], 400.0);
        assert_eq!(edges[(2 * 6 + 3) as usize], 400.0);
        assert_eq!(edges[(2 * 6 + 1) as usize], 0.0);
        // Border row stays zero
        assert_eq!(edges[2], 0.0);
    }

    #[test]
    fn test_mean_and_norm() {
        let (mean, norm) = mean_and_norm(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert!((norm - 2.0f32.sqrt()).abs() < 1e-6);
        assert_eq!(mean_and_norm(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_feature_rep_shapes_match_source() {
        let img = synthetic_digit(40, 7);
        let rep = FeatureRep::from_image(&img);
        assert_eq!((rep.width, rep.height), (40, 40));
        assert_eq!(rep.color_mask.dimensions(), (40, 40));
        assert_eq!(rep.edge_map.len(), 40 * 40);
        assert!(rep.ink_count() > 0);
        assert!(rep.edge_norm > 0.0);
    }

    #[test]
    fn test_tiny_raster_is_safe() {
        let img: RgbaImage = ImageBuffer::from_pixel(2, 1, YELLOW);
        let rep = FeatureRep::from_image(&img);
        assert_eq!(rep.edge_map, vec![0.0, 0.0]);
        assert_eq!(rep.edge_norm, 0.0);
    }
}
