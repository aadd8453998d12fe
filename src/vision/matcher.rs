//! Template matching.
//!
//! Score per template variant: `0.4 * IoU(mask) + 0.6 * max(0, NCC(edges))`.
//! The best variant represents its digit; the best digit wins.

use crate::vision::features::{FeatureRep, INK};
use crate::vision::templates::TemplateSet;

const MASK_WEIGHT: f32 = 0.4;
const EDGE_WEIGHT: f32 = 0.6;

/// Best matching digit for one sampled frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchResult {
    /// Cooldown number of the best template
    pub value: u32,
    /// Combined score of the best template
    pub score: f32,
    /// Gap to the runner-up digit (diagnostics only)
    pub delta: f32,
}

/// Intersection-over-union of the ink pixels of two masks.
///
/// Mismatched sizes and masks without any ink score 0.
pub fn mask_iou(a: &FeatureRep, b: &FeatureRep) -> f32 {
    if a.color_mask.dimensions() != b.color_mask.dimensions() {
        return 0.0;
    }
    let mut intersection = 0u32;
    let mut union = 0u32;
    for (pa, pb) in a.color_mask.pixels().zip(b.color_mask.pixels()) {
        let ia = pa[0] == INK;
        let ib = pb[0] == INK;
        intersection += (ia && ib) as u32;
        union += (ia || ib) as u32;
    }
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Normalized cross-correlation of two edge maps using their precomputed
/// means and norms. Mismatched sizes and flat maps score 0.
pub fn edge_ncc(a: &FeatureRep, b: &FeatureRep) -> f32 {
    if a.edge_map.len() != b.edge_map.len() || a.edge_norm == 0.0 || b.edge_norm == 0.0 {
        return 0.0;
    }
    let acc: f32 = a
        .edge_map
        .iter()
        .zip(&b.edge_map)
        .map(|(va, vb)| (va - a.edge_mean) * (vb - b.edge_mean))
        .sum();
    acc / (a.edge_norm * b.edge_norm)
}

/// Combined similarity of a frame against one template variant.
pub fn combined_score(frame: &FeatureRep, template: &FeatureRep) -> f32 {
    MASK_WEIGHT * mask_iou(frame, template) + EDGE_WEIGHT * edge_ncc(frame, template).max(0.0)
}

/// Finds the best matching digit.
///
/// Returns `None` when the set has no templates; callers treat that as
/// "still loading".
pub fn best_match(frame: &FeatureRep, templates: &TemplateSet) -> Option<MatchResult> {
    let mut best: Option<(u32, f32)> = None;
    let mut second = f32::NEG_INFINITY;

    for (value, reps) in templates.iter() {
        let local = reps
            .iter()
            .map(|rep| combined_score(frame, rep))
            .fold(f32::NEG_INFINITY, f32::max);

        match best {
            Some((_, best_score)) if local <= best_score => {
                if local > second {
                    second = local;
                }
            }
            Some((_, best_score)) => {
                second = best_score;
                best = Some((value, local));
            }
            None => best = Some((value, local)),
        }
    }

    let (value, score) = best?;
    let runner_up = if second == f32::NEG_INFINITY { -1.0 } else { second };
    Some(MatchResult {
        value,
        score,
        delta: score - runner_up,
    })
}
