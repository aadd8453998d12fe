//! Digit template loading and multi-scale baking.
//!
//! Templates are read once from `{template_dir}/{n}.png`, drawn at each
//! configured scale centred on a crop-box sized canvas, and reduced to
//! `FeatureRep`s so runtime matching never re-processes reference images.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread;

use crate::vision::features::FeatureRep;

/// Everything needed to bake a template set.
#[derive(Clone, Debug)]
pub struct TemplateSpec {
    pub dir: PathBuf,
    pub digits: RangeInclusive<u32>,
    pub box_width: u32,
    pub box_height: u32,
    pub scales: Vec<f32>,
}

/// Digit value -> feature representations at each baked scale.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    reps: BTreeMap<u32, Vec<FeatureRep>>,
    /// Directory the set was loaded from, if any.
    source_dir: Option<PathBuf>,
}

impl TemplateSet {
    /// Bakes a set from already decoded images.
    pub fn from_images<I>(images: I, box_width: u32, box_height: u32, scales: &[f32]) -> Self
    where
        I: IntoIterator<Item = (u32, RgbaImage)>,
    {
        let mut reps = BTreeMap::new();
        for (value, img) in images {
            let baked: Vec<FeatureRep> = scales
                .iter()
                .map(|&scale| bake_template(&img, box_width, box_height, scale))
                .collect();
            if !baked.is_empty() {
                reps.insert(value, baked);
            }
        }
        Self {
            reps,
            source_dir: None,
        }
    }

    /// Loads `{n}.png` for every digit in the spec. Missing or unreadable
    /// files are logged and skipped.
    pub fn load(spec: &TemplateSpec) -> Self {
        let mut images = Vec::new();
        for value in spec.digits.clone() {
            let path = spec.dir.join(format!("{}.png", value));
            match load_rgba(&path) {
                Ok(img) => images.push((value, img)),
                Err(e) => log::warn!("Template {} skipped: {:#}", value, e),
            }
        }
        let mut set = Self::from_images(images, spec.box_width, spec.box_height, &spec.scales);
        set.source_dir = Some(spec.dir.clone());
        log::info!(
            "Baked {} templates x {} scales from {}",
            set.len(),
            spec.scales.len(),
            spec.dir.display()
        );
        set
    }

    /// Number of digit values with at least one baked scale.
    pub fn len(&self) -> usize {
        self.reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// Iterates digit values with their scale variants, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[FeatureRep])> {
        self.reps.iter().map(|(value, reps)| (*value, reps.as_slice()))
    }
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(img.to_rgba8())
}

/// Draws `img` scaled by `scale` centred on a transparent box and extracts its features.
///
/// The result always has the box dimensions, whatever the scale.
pub fn bake_template(img: &RgbaImage, box_width: u32, box_height: u32, scale: f32) -> FeatureRep {
    let w = ((box_width as f32 * scale).round() as u32).max(1);
    let h = ((box_height as f32 * scale).round() as u32).max(1);
    let scaled = imageops::resize(img, w, h, FilterType::Nearest);

    let mut canvas = RgbaImage::new(box_width, box_height);
    let x = (box_width as i64 - w as i64).div_euclid(2);
    let y = (box_height as i64 - h as i64).div_euclid(2);
    imageops::overlay(&mut canvas, &scaled, x, y);

    FeatureRep::from_image(&canvas)
}

/// Template set published by a background loader.
///
/// Cloning shares the same slot; readers see `None` until loading finishes.
#[derive(Clone, Default)]
pub struct TemplateStore {
    slot: Arc<OnceLock<TemplateSet>>,
}

impl TemplateStore {
    /// Starts loading on a background thread and returns immediately.
    pub fn spawn_load(spec: TemplateSpec) -> Self {
        let store = Self::default();
        let slot = Arc::clone(&store.slot);
        let spawned = thread::Builder::new()
            .name("template-loader".to_string())
            .spawn(move || {
                let _ = slot.set(TemplateSet::load(&spec));
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn template loader: {}", e);
        }
        store
    }

    /// A store that is already populated.
    pub fn ready(set: TemplateSet) -> Self {
        let store = Self::default();
        let _ = store.slot.set(set);
        store
    }

    /// The loaded set, or `None` while loading is still in progress.
    pub fn get(&self) -> Option<&TemplateSet> {
        self.slot.get()
    }
}
