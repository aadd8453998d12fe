//! The detector façade the host drives.
//!
//! Owns capture, crop selection, templates, the state machine and the alarm
//! sink. Everything runs on the host's thread: the host calls `pump` from its
//! frame loop and the detector decides whether a sample is due.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use image::RgbaImage;

use crate::audio::AlarmSink;
use crate::capture::{CaptureError, CaptureManager};
use crate::detection::alarm::{AlarmCue, AlarmEvent};
use crate::detection::driver::{select_driver, FrameDriver};
use crate::detection::state::{DetectionMachine, Phase};
use crate::region::{map_to_source, CropRegion, DisplayRect, RegionSelector};
use crate::vision::{extract_region, search_neighbourhood, TemplateStore};

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_LOADING: &str = "Loading templates...";
pub const STATUS_CROP_OUTSIDE: &str = "Crop is outside the view; select the region again";

/// How long an alarm or safety-unlock message stays on the status line.
const EVENT_STATUS_HOLD: Duration = Duration::from_secs(3);

/// Read-only view of the detector for the host.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorStatus {
    pub is_screen_sharing: bool,
    pub is_click_mode: bool,
    pub crop_region: Option<CropRegion>,
    pub crop_confirmed: bool,
    pub is_hunting_active: bool,
    pub phase: Phase,
    pub status_text: String,
}

pub struct CooldownDetector {
    capture: CaptureManager,
    region: RegionSelector,
    templates: TemplateStore,
    machine: DetectionMachine,
    driver: Option<Box<dyn FrameDriver>>,
    sink: Box<dyn AlarmSink>,
    volumes: [f32; 2],
    box_width: u32,
    box_height: u32,
    status_text: String,
    /// Sample updates don't replace the status text before this instant.
    event_status_until: Option<Instant>,
    snapshot: Option<RgbaImage>,
}

impl CooldownDetector {
    pub fn new(
        capture: CaptureManager,
        templates: TemplateStore,
        sink: Box<dyn AlarmSink>,
        box_size: u32,
    ) -> Self {
        Self {
            capture,
            region: RegionSelector::new(box_size, box_size),
            templates,
            machine: DetectionMachine::new(),
            driver: None,
            sink,
            volumes: [1.0, 1.0],
            box_width: box_size,
            box_height: box_size,
            status_text: STATUS_IDLE.to_string(),
            event_status_until: None,
            snapshot: None,
        }
    }

    pub fn status(&self) -> DetectorStatus {
        DetectorStatus {
            is_screen_sharing: self.capture.is_active(),
            is_click_mode: self.region.is_selecting(),
            crop_region: self.region.visible_region(),
            crop_confirmed: self.region.confirmed().is_some(),
            is_hunting_active: self.is_hunting(),
            phase: self.machine.phase(),
            status_text: self.status_text.clone(),
        }
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn is_hunting(&self) -> bool {
        self.driver.is_some()
    }

    /// Crop-box sized raster of the last sample, for preview.
    pub fn snapshot(&self) -> Option<&RgbaImage> {
        self.snapshot.as_ref()
    }

    /// Latest captured frame, for the live view.
    pub fn current_frame(&mut self) -> Option<&RgbaImage> {
        self.capture.source_mut()?.latest_frame()
    }

    pub fn recent_values(&self) -> impl Iterator<Item = u32> + '_ {
        self.machine.state().recent_values.iter().copied()
    }

    pub fn toggle_screen_share(&mut self) -> Result<(), CaptureError> {
        if self.capture.is_active() {
            self.stop_screen_share();
            return Ok(());
        }
        match self.capture.start_capture() {
            Ok(()) => {
                self.status_text = "Screen share started".to_string();
                Ok(())
            }
            Err(e) => {
                log::error!("Screen share failed: {}", e);
                self.status_text = format!("Screen share failed: {}", e);
                Err(e)
            }
        }
    }

    /// Full teardown: hunt, capture and crop. Idempotent.
    pub fn stop_screen_share(&mut self) {
        self.stop_hunting();
        self.capture.stop_capture();
        self.region.reset();
        self.snapshot = None;
        self.status_text = STATUS_IDLE.to_string();
    }

    /// Arms crop selection. An active hunt is stopped first.
    pub fn enter_crop_mode(&mut self) {
        if self.is_hunting() {
            self.stop_hunting();
        }
        self.region.enter_selection_mode();
        self.status_text = self.region.state().description().to_string();
    }

    pub fn on_region_click(&mut self, x: f32, y: f32, view: &DisplayRect) -> bool {
        let accepted = self.region.on_click(x, y, view);
        if accepted {
            self.status_text = self.region.state().description().to_string();
        }
        accepted
    }

    /// Freezes the crop box. Detection state starts fresh for the new box.
    pub fn confirm_crop(&mut self) -> bool {
        let Some(region) = self.region.confirm_selection() else {
            return false;
        };
        log::info!(
            "Crop confirmed at ({:.0}, {:.0}) size {:.0}x{:.0}",
            region.x,
            region.y,
            region.width,
            region.height
        );
        self.machine.teardown();
        self.status_text = self.region.state().description().to_string();
        true
    }

    pub fn toggle_hunting(&mut self) -> Result<()> {
        if self.is_hunting() {
            self.stop_hunting();
            return Ok(());
        }
        if self.region.confirmed().is_none() {
            bail!("Select and confirm a region first");
        }
        let Some(source) = self.capture.source() else {
            bail!("Start screen share first");
        };

        self.machine.teardown();
        let driver = select_driver(source.frame_counter().is_some());
        log::info!("Hunting started ({} driver)", driver.name());
        self.driver = Some(driver);
        self.status_text = "Hunting started".to_string();
        Ok(())
    }

    /// Stops sampling and cancels every pending alarm. Idempotent.
    pub fn stop_hunting(&mut self) {
        let was_hunting = self.driver.take().is_some();
        self.machine.teardown();
        self.event_status_until = None;
        if was_hunting {
            self.sink.stop_all();
            log::info!("Hunting stopped");
        }
        self.status_text = STATUS_IDLE.to_string();
    }

    pub fn set_volume(&mut self, cue: AlarmCue, volume: f32) {
        self.volumes[cue.index()] = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self, cue: AlarmCue) -> f32 {
        self.volumes[cue.index()]
    }

    pub fn set_alarm_source(&mut self, cue: AlarmCue, path: PathBuf) {
        self.sink.set_source(cue, path);
    }

    pub fn preview_alarm(&mut self, cue: AlarmCue) {
        let volume = self.volume(cue);
        self.sink.play(cue, volume);
    }

    /// Advances the detector. Call once per host frame.
    pub fn pump(&mut self, now: Instant, view: &DisplayRect) {
        if self.capture.has_ended() {
            log::warn!("Capture ended externally");
            self.stop_screen_share();
            return;
        }
        if !self.is_hunting() {
            return;
        }

        if let Some(event) = self.machine.poll_timers(now) {
            match event {
                AlarmEvent::Alarm(cue) => {
                    log::info!("Alarm fired ({:?})", cue);
                    let volume = self.volume(cue);
                    self.sink.play(cue, volume);
                }
                AlarmEvent::SafetyUnlock => log::warn!("Safety unlock"),
            }
            self.status_text = event.to_string();
            self.event_status_until = Some(now + EVENT_STATUS_HOLD);
        }

        let counter = self.capture.source().and_then(|s| s.frame_counter());
        let due = self
            .driver
            .as_mut()
            .is_some_and(|driver| driver.poll(now, counter));
        if due {
            self.tick(now, view);
        }
    }

    fn tick(&mut self, now: Instant, view: &DisplayRect) {
        let Some(crop) = self.region.confirmed() else {
            return;
        };
        let Some(frame) = self.capture.source_mut().and_then(|s| s.latest_frame()) else {
            return;
        };
        let Some(src) = map_to_source(&crop, view, frame.width(), frame.height()) else {
            // The view changed size after the crop was confirmed
            self.snapshot = None;
            self.show_status(now, STATUS_CROP_OUTSIDE.to_string());
            return;
        };

        if self.machine.is_locked() {
            let text = self.machine.lock_status(now);
            self.show_status(now, text);
            return;
        }

        let templates = match self.templates.get() {
            Some(set) if !set.is_empty() => set,
            loaded => {
                let text = match loaded.and_then(|set| set.source_dir()) {
                    Some(dir) => format!("No templates found in {}", dir.display()),
                    None if loaded.is_some() => "No templates loaded".to_string(),
                    None => STATUS_LOADING.to_string(),
                };
                self.snapshot = Some(extract_region(frame, &src, self.box_width, self.box_height));
                self.show_status(now, text);
                return;
            }
        };

        let Some(sample) =
            search_neighbourhood(frame, &src, self.box_width, self.box_height, templates)
        else {
            return;
        };

        let transition = self.machine.observe(&sample.result, now);
        if transition.is_lock_start() {
            log::info!(
                "Lock started on {} (score {:.2}, delta {:.2})",
                sample.result.value,
                sample.result.score,
                sample.result.delta
            );
        } else {
            log::debug!("{} value={}", transition, sample.result.value);
        }
        self.snapshot = Some(sample.snapshot);
        if transition.is_lock_start() {
            self.event_status_until = None;
        }
        self.show_status(now, transition.to_string());
    }

    /// Replaces the status text unless an alarm message is still on hold.
    fn show_status(&mut self, now: Instant, text: String) {
        if self.event_status_until.is_some_and(|until| now < until) {
            return;
        }
        self.event_status_until = None;
        self.status_text = text;
    }
}

impl Drop for CooldownDetector {
    fn drop(&mut self) {
        self.stop_screen_share();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::{RecordingSink, SinkCall};
    use crate::capture::{StillBackend, StillFeed};
    use crate::vision::features::tests::{synthetic_digit, DARK};
    use crate::vision::{TemplateSet, TemplateSpec};
    use image::ImageBuffer;
    use std::time::Duration;

    /// 1280x720 frame with `digit` at 2x, top-left at (200, 200).
    fn frame_with_digit(digit: &RgbaImage) -> RgbaImage {
        let mut frame: RgbaImage = ImageBuffer::from_pixel(1280, 720, DARK);
        for (x, y, p) in digit.enumerate_pixels() {
            for dy in 0..2 {
                for dx in 0..2 {
                    frame.put_pixel(200 + 2 * x + dx, 200 + 2 * y + dy, *p);
                }
            }
        }
        frame
    }

    fn blank_frame() -> RgbaImage {
        ImageBuffer::from_pixel(1280, 720, DARK)
    }

    fn view() -> DisplayRect {
        DisplayRect::new(0.0, 0.0, 640.0, 360.0)
    }

    fn templates() -> TemplateStore {
        TemplateStore::ready(TemplateSet::from_images(
            vec![
                (6, synthetic_digit(40, 0)),
                (17, synthetic_digit(40, 1)),
                (52, synthetic_digit(40, 5)),
            ],
            40,
            40,
            &[0.9, 1.0, 1.1],
        ))
    }

    struct Harness {
        detector: CooldownDetector,
        feed: StillFeed,
        sink: RecordingSink,
    }

    fn harness(store: TemplateStore) -> Harness {
        let feed = StillFeed::new();
        let sink = RecordingSink::default();
        let capture = CaptureManager::new(Box::new(StillBackend::new(feed.clone())));
        let detector = CooldownDetector::new(capture, store, Box::new(sink.clone()), 40);
        Harness {
            detector,
            feed,
            sink,
        }
    }

    /// Shares the screen, crops around (200, 200) source px and starts hunting.
    fn hunting(store: TemplateStore) -> Harness {
        let mut h = harness(store);
        h.detector.toggle_screen_share().unwrap();
        h.detector.enter_crop_mode();
        assert!(h.detector.on_region_click(100.0, 100.0, &view()));
        assert!(h.detector.confirm_crop());
        h.detector.toggle_hunting().unwrap();
        h
    }

    /// Pushes `frame` and pumps once at `now`.
    fn step(h: &mut Harness, frame: &RgbaImage, now: Instant) {
        h.feed.push(frame.clone());
        h.detector.pump(now, &view());
    }

    #[test]
    fn test_end_to_end_52_raises_one_alarm() {
        let mut h = hunting(templates());
        let frame = frame_with_digit(&synthetic_digit(40, 5));
        let start = Instant::now();

        for i in 0..3 {
            step(&mut h, &frame, start + Duration::from_millis(i * 16));
        }
        let status = h.detector.status();
        assert_eq!(status.phase, Phase::Locked);
        assert!(status.status_text.starts_with("Detected!"));
        assert_eq!(h.detector.recent_values().last(), Some(52));
        assert_eq!(h.detector.snapshot().unwrap().dimensions(), (40, 40));

        // Frames keep arriving while locked: countdown only
        step(&mut h, &frame, start + Duration::from_secs(10));
        assert!(h.detector.status_text().starts_with("Locked:"));
        assert!(h.sink.plays().is_empty());

        step(&mut h, &frame, start + Duration::from_secs(53));
        assert_eq!(h.sink.plays(), vec![(AlarmCue::First, 1.0)]);
        assert_eq!(h.detector.status().phase, Phase::Idle);

        // Still showing 52: no second lock, no second alarm
        for i in 0..20 {
            step(&mut h, &frame, start + Duration::from_secs(54 + i));
        }
        assert_eq!(h.detector.status().phase, Phase::Idle);
        assert_eq!(h.sink.plays().len(), 1);
    }

    #[test]
    fn test_blank_frames_never_lock() {
        let mut h = hunting(templates());
        let frame = blank_frame();
        let start = Instant::now();
        for i in 0..30 {
            step(&mut h, &frame, start + Duration::from_millis(i * 16));
        }
        assert_eq!(h.detector.status().phase, Phase::Idle);
        assert!(h.detector.status_text().starts_with("Waiting..."));
    }

    #[test]
    fn test_no_new_frame_means_no_sample() {
        let mut h = hunting(templates());
        let frame = frame_with_digit(&synthetic_digit(40, 5));
        let start = Instant::now();
        step(&mut h, &frame, start);
        for i in 1..10 {
            h.detector.pump(start + Duration::from_millis(i * 16), &view());
        }
        assert_ne!(h.detector.status().phase, Phase::Locked);
        assert_eq!(h.detector.machine.state().score_history.len(), 1);
    }

    #[test]
    fn test_interval_driver_without_frame_notifications() {
        let feed = StillFeed::new();
        let capture = CaptureManager::new(Box::new(
            StillBackend::new(feed.clone()).without_notifications(),
        ));
        let mut detector =
            CooldownDetector::new(capture, templates(), Box::new(RecordingSink::default()), 40);
        detector.toggle_screen_share().unwrap();
        detector.enter_crop_mode();
        detector.on_region_click(100.0, 100.0, &view());
        detector.confirm_crop();
        detector.toggle_hunting().unwrap();

        feed.push(frame_with_digit(&synthetic_digit(40, 5)));
        let start = Instant::now();
        for i in 0..=3 {
            detector.pump(start + Duration::from_millis(i * 100), &view());
        }
        assert_eq!(detector.status().phase, Phase::Locked);
    }

    #[test]
    fn test_templates_not_loaded_shows_loading() {
        let mut h = hunting(TemplateStore::default());
        step(&mut h, &frame_with_digit(&synthetic_digit(40, 5)), Instant::now());
        assert_eq!(h.detector.status_text(), STATUS_LOADING);
        assert!(h.detector.snapshot().is_some());
        assert_eq!(h.detector.status().phase, Phase::Idle);
    }

    #[test]
    fn test_empty_template_set_is_reported() {
        let mut h = hunting(TemplateStore::ready(TemplateSet::default()));
        step(&mut h, &blank_frame(), Instant::now());
        assert_eq!(h.detector.status_text(), "No templates loaded");

        let dir = tempfile::tempdir().unwrap();
        let set = TemplateSet::load(&TemplateSpec {
            dir: dir.path().to_path_buf(),
            digits: 6..=54,
            box_width: 40,
            box_height: 40,
            scales: vec![1.0],
        });
        let mut h = hunting(TemplateStore::ready(set));
        step(&mut h, &blank_frame(), Instant::now());
        let expected = format!("No templates found in {}", dir.path().display());
        assert_eq!(h.detector.status_text(), expected);
        assert_eq!(h.detector.status().phase, Phase::Idle);
    }

    #[test]
    fn test_crop_outside_resized_view_is_reported() {
        let mut h = harness(templates());
        let large = DisplayRect::new(0.0, 0.0, 1366.0, 768.0);
        h.detector.toggle_screen_share().unwrap();
        h.detector.enter_crop_mode();
        assert!(h.detector.on_region_click(1300.0, 700.0, &large));
        assert!(h.detector.confirm_crop());
        h.detector.toggle_hunting().unwrap();

        let small = DisplayRect::new(0.0, 0.0, 1280.0, 720.0);
        let frame = frame_with_digit(&synthetic_digit(40, 5));
        let start = Instant::now();
        for i in 0..5 {
            h.feed.push(frame.clone());
            h.detector.pump(start + Duration::from_millis(i * 16), &small);
        }
        assert_eq!(h.detector.status_text(), STATUS_CROP_OUTSIDE);
        assert!(h.detector.machine.state().score_history.is_empty());
        assert!(h.detector.snapshot().is_none());
    }

    #[test]
    fn test_alarm_message_outlives_following_samples() {
        let mut h = hunting(templates());
        let frame = frame_with_digit(&synthetic_digit(40, 5));
        let start = Instant::now();
        for i in 0..3 {
            step(&mut h, &frame, start + Duration::from_millis(i * 16));
        }

        step(&mut h, &frame, start + Duration::from_secs(53));
        assert!(h.detector.status_text().starts_with("Alarm:"));
        for ms in [100, 500, 1000, 2000] {
            step(&mut h, &frame, start + Duration::from_secs(53) + Duration::from_millis(ms));
            assert!(h.detector.status_text().starts_with("Alarm:"));
        }

        step(&mut h, &frame, start + Duration::from_secs(57));
        assert!(!h.detector.status_text().starts_with("Alarm:"));
    }

    #[test]
    fn test_safety_unlock_message_is_held() {
        let mut h = hunting(templates());
        let frame = frame_with_digit(&synthetic_digit(40, 5));
        let start = Instant::now();
        for i in 0..3 {
            step(&mut h, &frame, start + Duration::from_millis(i * 16));
        }

        // Host stalled past both deadlines: the safety unlock wins
        step(&mut h, &frame, start + Duration::from_secs(75));
        assert_eq!(h.detector.status_text(), AlarmEvent::SafetyUnlock.to_string());
        step(&mut h, &frame, start + Duration::from_secs(76));
        assert_eq!(h.detector.status_text(), AlarmEvent::SafetyUnlock.to_string());
        assert!(h.sink.plays().is_empty());
    }

    #[test]
    fn test_hunting_requires_confirmed_crop() {
        let mut h = harness(templates());
        h.detector.toggle_screen_share().unwrap();
        let err = h.detector.toggle_hunting().unwrap_err();
        assert_eq!(err.to_string(), "Select and confirm a region first");
        assert!(!h.detector.is_hunting());
    }

    #[test]
    fn test_recrop_stops_hunt() {
        let mut h = hunting(templates());
        h.detector.enter_crop_mode();
        let status = h.detector.status();
        assert!(!status.is_hunting_active);
        assert!(status.is_click_mode);
        assert!(!status.crop_confirmed);
    }

    #[test]
    fn test_stop_is_idempotent_and_cancels_alarms() {
        let mut h = hunting(templates());
        let frame = frame_with_digit(&synthetic_digit(40, 5));
        let start = Instant::now();
        for i in 0..3 {
            step(&mut h, &frame, start + Duration::from_millis(i * 16));
        }
        assert!(h.detector.machine.alarms_pending());

        h.detector.stop_screen_share();
        h.detector.stop_screen_share();
        h.detector.stop_hunting();
        assert!(!h.detector.machine.alarms_pending());

        let status = h.detector.status();
        assert!(!status.is_screen_sharing);
        assert!(!status.is_hunting_active);
        assert_eq!(status.crop_region, None);
        assert_eq!(status.status_text, STATUS_IDLE);

        // Past the alarm time: nothing plays
        h.detector.pump(start + Duration::from_secs(60), &view());
        assert!(h.sink.plays().is_empty());
        let stops = h
            .sink
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == SinkCall::StopAll)
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_toggle_twice_returns_to_idle() {
        let mut h = harness(templates());
        h.detector.toggle_screen_share().unwrap();
        assert!(h.detector.status().is_screen_sharing);
        h.detector.toggle_screen_share().unwrap();
        assert!(!h.detector.status().is_screen_sharing);
        assert_eq!(h.detector.status_text(), STATUS_IDLE);
    }

    #[test]
    fn test_window_closed_tears_down() {
        let mut h = hunting(templates());
        h.feed.end();
        h.detector.pump(Instant::now(), &view());
        let status = h.detector.status();
        assert!(!status.is_screen_sharing);
        assert!(!status.is_hunting_active);
        assert!(!status.crop_confirmed);
    }

    #[test]
    fn test_window_closed_drops_frame_and_snapshot() {
        let mut h = hunting(templates());
        step(&mut h, &frame_with_digit(&synthetic_digit(40, 5)), Instant::now());
        assert!(h.detector.snapshot().is_some());
        assert!(h.detector.current_frame().is_some());

        h.feed.end();
        h.detector.pump(Instant::now(), &view());
        assert!(h.detector.current_frame().is_none());
        assert!(h.detector.snapshot().is_none());
        assert_eq!(h.detector.status_text(), STATUS_IDLE);
    }

    #[test]
    fn test_preview_uses_cue_volume() {
        let mut h = harness(templates());
        h.detector.set_volume(AlarmCue::Second, 0.25);
        h.detector.preview_alarm(AlarmCue::Second);
        h.detector.set_alarm_source(AlarmCue::First, PathBuf::from("a.mp3"));
        assert_eq!(h.sink.plays(), vec![(AlarmCue::Second, 0.25)]);
        assert!(h
            .sink
            .calls
            .lock()
            .unwrap()
            .contains(&SinkCall::Source(AlarmCue::First, PathBuf::from("a.mp3"))));
    }
}
