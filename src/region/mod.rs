//! Crop region selection and display-to-source mapping.
//!
//! The operator picks a fixed-size box on the displayed live view; each tick
//! the box is mapped into captured-frame pixels using the view's current size.

pub mod coords;
pub mod selector;

pub use coords::{map_to_source, CropRegion, DisplayRect, SourceRect};
pub use selector::{RegionSelector, SelectionState};
