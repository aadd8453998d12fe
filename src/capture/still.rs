//! Still-image frame source.
//!
//! Replays whatever frame was last pushed into a shared `StillFeed`. Used to
//! run the detector against a saved screenshot instead of the live game.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use image::RgbaImage;

use super::{CaptureBackend, CaptureError, FrameSource};

#[derive(Debug, Default)]
struct FeedState {
    frame: Option<RgbaImage>,
    counter: u64,
    ended: bool,
}

/// Shared handle frames are pushed through.
#[derive(Clone, Debug, Default)]
pub struct StillFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl StillFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed holding the image at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let frame = image::open(path)
            .with_context(|| format!("Failed to open replay image {}", path.display()))?
            .to_rgba8();
        let feed = Self::new();
        feed.push(frame);
        Ok(feed)
    }

    /// Publishes a new frame and counts it as an arrival.
    pub fn push(&self, frame: RgbaImage) {
        let mut state = self.lock();
        state.frame = Some(frame);
        state.counter += 1;
    }

    /// Marks the stream as ended, as if the captured window went away.
    pub fn end(&self) {
        self.lock().ended = true;
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        // A poisoned feed only means a test thread panicked mid-push
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Backend handing out sources over one feed.
#[derive(Debug)]
pub struct StillBackend {
    feed: StillFeed,
    notifies: bool,
}

impl StillBackend {
    pub fn new(feed: StillFeed) -> Self {
        Self {
            feed,
            notifies: true,
        }
    }

    /// Sources without frame notifications, to exercise interval sampling.
    pub fn without_notifications(mut self) -> Self {
        self.notifies = false;
        self
    }
}

impl CaptureBackend for StillBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        self.feed.lock().ended = false;
        Ok(Box::new(StillSource {
            feed: self.feed.clone(),
            notifies: self.notifies,
            current: None,
            current_counter: 0,
        }))
    }
}

struct StillSource {
    feed: StillFeed,
    notifies: bool,
    current: Option<RgbaImage>,
    current_counter: u64,
}

impl FrameSource for StillSource {
    fn frame_counter(&self) -> Option<u64> {
        self.notifies.then(|| self.feed.lock().counter)
    }

    fn latest_frame(&mut self) -> Option<&RgbaImage> {
        {
            let state = self.feed.lock();
            if state.counter != self.current_counter {
                self.current = state.frame.clone();
                self.current_counter = state.counter;
            }
        }
        self.current.as_ref()
    }

    fn has_ended(&self) -> bool {
        self.feed.lock().ended
    }

    fn stop(&mut self) {
        self.current = None;
    }
}
