//! Crop box selection state.
//!
//! The operator arms selection mode, clicks the live view, and confirms.
//! The box is anchored at the click (top-left corner) and clamped so it
//! never extends past the displayed view.

use crate::region::coords::{CropRegion, DisplayRect};

/// Steps of the selection flow.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionState {
    /// No selection in progress and nothing confirmed.
    Inactive,
    /// Waiting for a click, or holding an unconfirmed box.
    Selecting { pending: Option<CropRegion> },
    /// Box frozen and in use by the detector.
    Confirmed(CropRegion),
}

impl SelectionState {
    /// Returns a human-readable description of the current step.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Inactive => "No region selected",
            Self::Selecting { pending: None } => "Click the cooldown number",
            Self::Selecting { pending: Some(_) } => "Confirm or click again",
            Self::Confirmed(_) => "Region confirmed",
        }
    }
}

/// Fixed-size crop box selector.
#[derive(Clone, Debug)]
pub struct RegionSelector {
    box_width: f32,
    box_height: f32,
    state: SelectionState,
}

impl RegionSelector {
    pub fn new(box_width: u32, box_height: u32) -> Self {
        Self {
            box_width: box_width as f32,
            box_height: box_height as f32,
            state: SelectionState::Inactive,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn box_size(&self) -> (f32, f32) {
        (self.box_width, self.box_height)
    }

    /// Arms the next click. Any unconfirmed or confirmed box is discarded.
    pub fn enter_selection_mode(&mut self) {
        self.state = SelectionState::Selecting { pending: None };
    }

    /// Records a click at host coordinates `(x, y)` against the view's current rectangle.
    ///
    /// Returns false if selection is not armed or the click is outside the view.
    pub fn on_click(&mut self, x: f32, y: f32, view: &DisplayRect) -> bool {
        let SelectionState::Selecting { pending } = &mut self.state else {
            return false;
        };
        if !view.contains(x, y) {
            return false;
        }

        let max_left = (view.width - self.box_width).floor();
        let max_top = (view.height - self.box_height).floor();
        let left = (x - view.left).min(max_left).max(0.0);
        let top = (y - view.top).min(max_top).max(0.0);

        *pending = Some(CropRegion {
            x: left,
            y: top,
            width: self.box_width,
            height: self.box_height,
        });
        true
    }

    /// Freezes the pending box. No-op unless armed with a registered click.
    pub fn confirm_selection(&mut self) -> Option<CropRegion> {
        if let SelectionState::Selecting {
            pending: Some(region),
        } = self.state
        {
            self.state = SelectionState::Confirmed(region);
            return Some(region);
        }
        None
    }

    /// Box to draw on the live view, confirmed or not.
    pub fn visible_region(&self) -> Option<CropRegion> {
        match self.state {
            SelectionState::Selecting { pending } => pending,
            SelectionState::Confirmed(region) => Some(region),
            SelectionState::Inactive => None,
        }
    }

    pub fn confirmed(&self) -> Option<CropRegion> {
        match self.state {
            SelectionState::Confirmed(region) => Some(region),
            _ => None,
        }
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, SelectionState::Selecting { .. })
    }

    pub fn reset(&mut self) {
        self.state = SelectionState::Inactive;
    }
}
