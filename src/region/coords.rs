//! Coordinate conversion utilities.
//!
//! Converts a crop box selected on the displayed live view into source-frame
//! pixel coordinates. X and Y scale independently since the view may stretch
//! the captured frame.

/// Rectangle of the displayed live view, in host (GUI) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// True if the point lies within the rectangle, edges included.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Crop box in display pixels, relative to the top-left of the live view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Crop box mapped into source-frame pixels. May be fractional.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SourceRect {
    /// The same rectangle shifted by whole source pixels.
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Maps a crop box into source pixels using the display rectangle as it is *now*.
///
/// Returns `None` when the source has no decoded size yet, the view is
/// collapsed, or the mapped rectangle would read outside the frame.
pub fn map_to_source(
    crop: &CropRegion,
    display: &DisplayRect,
    source_width: u32,
    source_height: u32,
) -> Option<SourceRect> {
    if source_width == 0 || source_height == 0 || display.is_empty() {
        return None;
    }

    let scale_x = source_width as f32 / display.width;
    let scale_y = source_height as f32 / display.height;
    let rect = SourceRect {
        x: crop.x * scale_x,
        y: crop.y * scale_y,
        width: crop.width * scale_x,
        height: crop.height * scale_y,
    };

    let inside = rect.x >= 0.0
        && rect.y >= 0.0
        && rect.x + rect.width <= source_width as f32
        && rect.y + rect.height <= source_height as f32;
    inside.then_some(rect)
}
