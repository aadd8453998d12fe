//! Frame sampling.
//!
//! Reads the mapped source rectangle out of a captured frame at crop-box
//! resolution (nearest neighbour, no smoothing). To tolerate a few pixels of
//! operator misalignment the rectangle is sampled at every ±1 source-pixel
//! offset and the best-matching sample is kept.

use image::{ImageBuffer, RgbaImage};

use crate::region::SourceRect;
use crate::vision::features::FeatureRep;
use crate::vision::matcher::{best_match, MatchResult};
use crate::vision::templates::TemplateSet;

/// Offsets searched around the nominal rectangle, in source pixels.
const SEARCH_OFFSETS: [f32; 3] = [-1.0, 0.0, 1.0];

/// Best sample of one tick.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Crop-box sized raster that produced the best match
    pub snapshot: RgbaImage,
    pub result: MatchResult,
}

/// Resamples `src` out of `frame` to `out_width` x `out_height`.
///
/// Coordinates that fall outside the frame are clamped to its edge.
pub fn extract_region(frame: &RgbaImage, src: &SourceRect, out_width: u32, out_height: u32) -> RgbaImage {
    let (frame_w, frame_h) = frame.dimensions();
    let step_x = src.width / out_width as f32;
    let step_y = src.height / out_height as f32;

    ImageBuffer::from_fn(out_width, out_height, |x, y| {
        let sx = (src.x + (x as f32 + 0.5) * step_x).floor();
        let sy = (src.y + (y as f32 + 0.5) * step_y).floor();
        let sx = (sx.max(0.0) as u32).min(frame_w.saturating_sub(1));
        let sy = (sy.max(0.0) as u32).min(frame_h.saturating_sub(1));
        *frame.get_pixel(sx, sy)
    })
}

/// Samples the 3x3 neighbourhood of `src` and returns the best-scoring sample.
///
/// Returns `None` if the frame is empty or the template set has nothing to match.
pub fn search_neighbourhood(
    frame: &RgbaImage,
    src: &SourceRect,
    box_width: u32,
    box_height: u32,
    templates: &TemplateSet,
) -> Option<Sample> {
    if frame.width() == 0 || frame.height() == 0 || templates.is_empty() {
        return None;
    }

    let mut best: Option<Sample> = None;
    for dy in SEARCH_OFFSETS {
        for dx in SEARCH_OFFSETS {
            let snapshot = extract_region(frame, &src.offset(dx, dy), box_width, box_height);
            let rep = FeatureRep::from_image(&snapshot);
            let Some(result) = best_match(&rep, templates) else {
                continue;
            };
            let better = best
                .as_ref()
                .is_none_or(|current| result.score > current.result.score);
            if better {
                best = Some(Sample { snapshot, result });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::features::tests::{synthetic_digit, DARK};

    /// A 1280x720 frame with `digit` drawn at 2x with its top-left at (x0, y0).
    fn frame_with_digit(digit: &RgbaImage, x0: u32, y0: u32) -> RgbaImage {
        let mut frame: RgbaImage = ImageBuffer::from_pixel(1280, 720, DARK);
        for (x, y, p) in digit.enumerate_pixels() {
            for dy in 0..2 {
                for dx in 0..2 {
                    frame.put_pixel(x0 + 2 * x + dx, y0 + 2 * y + dy, *p);
                }
            }
        }
        frame
    }

    fn templates() -> TemplateSet {
        TemplateSet::from_images(
            vec![
                (6, synthetic_digit(40, 0)),
                (17, synthetic_digit(40, 1)),
                (52, synthetic_digit(40, 5)),
            ],
            40,
            40,
            &[0.9, 1.0, 1.1],
        )
    }

    fn nominal() -> SourceRect {
        SourceRect {
            x: 200.0,
            y: 200.0,
            width: 80.0,
            height: 80.0,
        }
    }

    #[test]
    fn test_extract_region_downsamples_exactly() {
        let digit = synthetic_digit(40, 5);
        let frame = frame_with_digit(&digit, 200, 200);
        let out = extract_region(&frame, &nominal(), 40, 40);
        assert_eq!(out, digit);
    }

    #[test]
    fn test_extract_region_clamps_at_frame_edge() {
        let frame: RgbaImage = ImageBuffer::from_fn(10, 10, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let src = SourceRect {
            x: -1.0,
            y: -1.0,
            width: 10.0,
            height: 10.0,
        };
        let out = extract_region(&frame, &src, 10, 10);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(9, 9)[0], 8);
    }

    #[test]
    fn test_search_finds_digit_in_region() {
        let frame = frame_with_digit(&synthetic_digit(40, 5), 200, 200);
        let sample = search_neighbourhood(&frame, &nominal(), 40, 40, &templates()).unwrap();
        assert_eq!(sample.result.value, 52);
        assert!(sample.result.score > 0.29);
        assert_eq!(sample.snapshot.dimensions(), (40, 40));
    }

    #[test]
    fn test_search_recovers_one_pixel_misalignment() {
        // Operator cropped one source pixel too far left and up
        let frame = frame_with_digit(&synthetic_digit(40, 5), 201, 201);
        let aligned = search_neighbourhood(&frame, &nominal().offset(1.0, 1.0), 40, 40, &templates())
            .unwrap();
        let searched = search_neighbourhood(&frame, &nominal(), 40, 40, &templates()).unwrap();
        assert_eq!(searched.result.value, 52);
        assert!((searched.result.score - aligned.result.score).abs() < 1e-6);
    }

    #[test]
    fn test_search_with_empty_templates_is_none() {
        let frame = frame_with_digit(&synthetic_digit(40, 5), 200, 200);
        assert!(search_neighbourhood(&frame, &nominal(), 40, 40, &TemplateSet::default()).is_none());
    }
}
