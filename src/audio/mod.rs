//! Alarm sound output.
//!
//! The detector only talks to an `AlarmSink`; the rodio-backed player lives
//! on its own thread and is Windows only, like the rest of the desktop shell.

#[cfg(windows)]
pub mod player;

use std::path::PathBuf;

use crate::detection::AlarmCue;

#[cfg(windows)]
pub use player::AlarmPlayer;

/// Something that can play the two alarm cues.
pub trait AlarmSink {
    /// Replaces the sound file used for `cue`.
    fn set_source(&mut self, cue: AlarmCue, path: PathBuf);

    /// Plays `cue` once at `volume` (0.0..=1.0). Overlapping plays are allowed.
    fn play(&mut self, cue: AlarmCue, volume: f32);

    /// Silences everything currently playing.
    fn stop_all(&mut self);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq)]
    pub enum SinkCall {
        Source(AlarmCue, PathBuf),
        Play(AlarmCue, f32),
        StopAll,
    }

    /// Sink that records every call for later inspection.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub calls: Arc<Mutex<Vec<SinkCall>>>,
    }

    impl RecordingSink {
        pub fn plays(&self) -> Vec<(AlarmCue, f32)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    SinkCall::Play(cue, v) => Some((*cue, *v)),
                    _ => None,
                })
                .collect()
        }
    }

    impl AlarmSink for RecordingSink {
        fn set_source(&mut self, cue: AlarmCue, path: PathBuf) {
            self.calls.lock().unwrap().push(SinkCall::Source(cue, path));
        }

        fn play(&mut self, cue: AlarmCue, volume: f32) {
            self.calls.lock().unwrap().push(SinkCall::Play(cue, volume));
        }

        fn stop_all(&mut self) {
            self.calls.lock().unwrap().push(SinkCall::StopAll);
        }
    }
}
