//! Live frame acquisition.
//!
//! This module provides:
//! - The `FrameSource` / `CaptureBackend` seams the detector reads frames through
//! - `CaptureManager`, which owns the active source and makes start/stop idempotent
//! - A still-image backend (`still`) for replaying a saved screenshot
//! - The Windows Graphics Capture backend (`window`, `session`), Windows only

pub mod still;

#[cfg(windows)]
pub mod session;
#[cfg(windows)]
pub mod window;

use image::RgbaImage;
use thiserror::Error;

pub use still::{StillBackend, StillFeed};

#[cfg(windows)]
pub use session::WindowCaptureBackend;

/// Why a capture could not be started.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The target is missing or the platform refused access.
    #[error("capture denied: {0}")]
    Denied(String),
    /// The platform has no capture support.
    #[error("capture unsupported: {0}")]
    Unsupported(String),
}

/// A running stream of frames.
pub trait FrameSource {
    /// Count of frames the platform has delivered so far.
    ///
    /// `None` if the source cannot notify frame arrivals; the detector then
    /// samples on a fixed interval instead.
    fn frame_counter(&self) -> Option<u64>;

    /// The most recent decoded frame. `None` until the first frame decodes.
    fn latest_frame(&mut self) -> Option<&RgbaImage>;

    /// True once the stream ended outside our control (window closed, etc.).
    fn has_ended(&self) -> bool;

    /// Releases platform resources. Called at most once per source.
    fn stop(&mut self);
}

/// Opens frame sources.
pub trait CaptureBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Owns at most one active frame source.
pub struct CaptureManager {
    backend: Box<dyn CaptureBackend>,
    source: Option<Box<dyn FrameSource>>,
}

impl CaptureManager {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            source: None,
        }
    }

    /// Opens the backend. No-op if a source is already active.
    pub fn start_capture(&mut self) -> Result<(), CaptureError> {
        if self.source.is_some() {
            return Ok(());
        }
        let source = self.backend.open()?;
        log::info!(
            "Capture started ({})",
            if source.frame_counter().is_some() {
                "frame notifications"
            } else {
                "polled"
            }
        );
        self.source = Some(source);
        Ok(())
    }

    /// Stops and drops the active source. Idempotent.
    pub fn stop_capture(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            log::info!("Capture stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub fn has_ended(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.has_ended())
    }

    pub fn source(&self) -> Option<&dyn FrameSource> {
        self.source.as_deref()
    }

    pub fn source_mut(&mut self) -> Option<&mut (dyn FrameSource + 'static)> {
        self.source.as_deref_mut()
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.stop_capture();
    }
}
