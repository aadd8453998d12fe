//! Digit recognition for the cooldown crop box.
//!
//! This module provides:
//! - Feature extraction (`features`): yellow HSV mask + Sobel edge map
//! - Template baking and background loading (`templates`)
//! - Template matching (`matcher`)
//! - Frame sampling with a 3x3 neighbourhood search (`sampler`)

pub mod features;
pub mod matcher;
pub mod sampler;
pub mod templates;

pub use features::FeatureRep;
pub use matcher::{best_match, MatchResult};
pub use sampler::{extract_region, search_neighbourhood, Sample};
pub use templates::{TemplateSet, TemplateSpec, TemplateStore};
