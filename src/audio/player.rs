//! rodio alarm player.
//!
//! rodio's output stream is not `Send`, so a dedicated thread owns it and
//! receives commands over a channel. Every play gets its own `Sink` so an
//! alarm and a preview can overlap.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;

use anyhow::{anyhow, Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::AlarmSink;
use crate::detection::AlarmCue;

enum AudioCommand {
    Play { path: PathBuf, volume: f32 },
    StopAll,
}

/// Handle to the audio thread.
pub struct AlarmPlayer {
    tx: Option<Sender<AudioCommand>>,
    sources: [PathBuf; 2],
}

impl AlarmPlayer {
    pub fn new(first: PathBuf, second: PathBuf) -> Self {
        Self {
            tx: None,
            sources: [first, second],
        }
    }

    fn ensure_thread(&mut self) -> Result<Sender<AudioCommand>> {
        if let Some(tx) = &self.tx {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut sinks: Vec<Sink> = Vec::new();

                while let Ok(cmd) = rx.recv() {
                    sinks.retain(|s| !s.empty());
                    match cmd {
                        AudioCommand::Play { path, volume } => {
                            if output.is_none() {
                                match OutputStream::try_default() {
                                    Ok(pair) => output = Some(pair),
                                    Err(e) => {
                                        log::error!("Audio output unavailable: {}", e);
                                        continue;
                                    }
                                }
                            }
                            let Some((_, handle)) = &output else {
                                continue;
                            };
                            match start_playback(handle, &path, volume) {
                                Ok(sink) => sinks.push(sink),
                                Err(e) => log::error!("Alarm playback failed: {:#}", e),
                            }
                        }
                        AudioCommand::StopAll => {
                            for sink in sinks.drain(..) {
                                sink.stop();
                            }
                        }
                    }
                }
            })
            .context("Failed to spawn audio thread")?;

        self.tx = Some(tx.clone());
        Ok(tx)
    }

    fn send(&mut self, cmd: AudioCommand) {
        let result = self
            .ensure_thread()
            .and_then(|tx| tx.send(cmd).map_err(|_| anyhow!("audio thread exited")));
        if let Err(e) = result {
            log::error!("Audio command dropped: {:#}", e);
            self.tx = None;
        }
    }
}

fn start_playback(handle: &OutputStreamHandle, path: &Path, volume: f32) -> Result<Sink> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let source = Decoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let sink = Sink::try_new(handle).context("Failed to create audio sink")?;
    sink.set_volume(volume.clamp(0.0, 1.0));
    sink.append(source);
    Ok(sink)
}

impl AlarmSink for AlarmPlayer {
    fn set_source(&mut self, cue: AlarmCue, path: PathBuf) {
        log::info!("Alarm {:?} source: {}", cue, path.display());
        self.sources[cue.index()] = path;
    }

    fn play(&mut self, cue: AlarmCue, volume: f32) {
        let path = self.sources[cue.index()].clone();
        self.send(AudioCommand::Play { path, volume });
    }

    fn stop_all(&mut self) {
        if self.tx.is_some() {
            self.send(AudioCommand::StopAll);
        }
    }
}
