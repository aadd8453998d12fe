//! GUI module for the application.
//!
//! Hosts the detector in an egui/eframe window: live view, crop selection,
//! hunting controls, alarm settings and status. Only the input state is
//! platform independent; the window itself is Windows-only.

#[cfg(windows)]
mod app;
#[cfg(windows)]
pub mod render;
pub mod state;

#[cfg(windows)]
pub use app::{run_gui, GuiApp};
