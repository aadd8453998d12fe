//! The eframe application: owns the detector and drives it once per frame.

use std::time::{Duration, Instant};

use eframe::egui::{self, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;

use crate::config::DetectorConfig;
use crate::detection::{AlarmCue, CooldownDetector};
use crate::region::DisplayRect;

use super::render;
use super::state::{AlarmClicks, ControlClicks, GuiState};

/// Repaint period while a capture is running.
const LIVE_REPAINT: Duration = Duration::from_millis(16);

/// Main GUI application struct.
pub struct GuiApp {
    detector: CooldownDetector,
    state: GuiState,
    live_texture: Option<TextureHandle>,
    snapshot_texture: Option<TextureHandle>,
    /// Where the live view was drawn last frame.
    last_view: Option<DisplayRect>,
}

impl GuiApp {
    pub fn new(detector: CooldownDetector, config: &DetectorConfig) -> Self {
        let mut app = Self {
            detector,
            state: GuiState::from_config(config),
            live_texture: None,
            snapshot_texture: None,
            last_view: None,
        };
        for cue in [AlarmCue::First, AlarmCue::Second] {
            let volume = app.state.alarm(cue).volume;
            app.detector.set_volume(cue, volume);
        }
        app
    }

    fn handle_controls(&mut self, clicks: ControlClicks) {
        if clicks.toggle_share {
            match self.detector.toggle_screen_share() {
                Ok(()) => self.state.last_error = None,
                Err(e) => self.state.last_error = Some(e.to_string()),
            }
        }
        if clicks.enter_crop {
            self.detector.enter_crop_mode();
        }
        if clicks.confirm_crop {
            self.detector.confirm_crop();
        }
        if clicks.toggle_hunting {
            match self.detector.toggle_hunting() {
                Ok(()) => self.state.last_error = None,
                Err(e) => {
                    log::warn!("GUI: {}", e);
                    self.state.last_error = Some(e.to_string());
                }
            }
        }
    }

    fn handle_alarm_settings(&mut self, clicks: AlarmClicks) {
        if let Some(cue) = clicks.apply_source {
            let path = crate::paths::resolve(&self.state.alarm(cue).path);
            self.detector.set_alarm_source(cue, path);
        }
        if let Some(cue) = clicks.volume_changed {
            let volume = self.state.alarm(cue).volume;
            self.detector.set_volume(cue, volume);
        }
        if let Some(cue) = clicks.preview {
            self.detector.preview_alarm(cue);
        }
    }

    /// Uploads the latest frame and the last sample to the GPU.
    ///
    /// Textures follow the detector: once it has no frame or sample (share
    /// stopped, window closed) the stale image is dropped.
    fn refresh_textures(&mut self, ctx: &egui::Context) {
        match self.detector.current_frame() {
            Some(frame) => {
                let image = to_color_image(frame);
                upload(ctx, &mut self.live_texture, "live_view", image, TextureOptions::LINEAR);
            }
            None => self.live_texture = None,
        }
        match self.detector.snapshot() {
            Some(snapshot) => {
                let image = to_color_image(snapshot);
                upload(
                    ctx,
                    &mut self.snapshot_texture,
                    "snapshot",
                    image,
                    TextureOptions::NEAREST,
                );
            }
            None => self.snapshot_texture = None,
        }
    }
}

fn to_color_image(img: &RgbaImage) -> egui::ColorImage {
    let size = [img.width() as usize, img.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw())
}

fn upload(
    ctx: &egui::Context,
    slot: &mut Option<TextureHandle>,
    name: &str,
    image: egui::ColorImage,
    options: TextureOptions,
) {
    match slot {
        Some(texture) => texture.set(image, options),
        None => *slot = Some(ctx.load_texture(name, image, options)),
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.refresh_textures(ctx);

        let mut clicked_at = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            let status = self.detector.status();
            let clicks = render::render_controls(ui, &mut self.state, &status);
            ui.add_space(8.0);

            egui::ScrollArea::both().show(ui, |ui| {
                let (view, click) = render::render_live_view(
                    ui,
                    self.live_texture.as_ref(),
                    self.state.resolution,
                    &status,
                );
                self.last_view = Some(view);
                clicked_at = click;

                ui.add_space(8.0);
                let recent: Vec<u32> = self.detector.recent_values().collect();
                render::render_snapshot(ui, self.snapshot_texture.as_ref(), &recent);

                let alarm_clicks = render::render_alarm_settings(ui, &mut self.state);
                self.handle_alarm_settings(alarm_clicks);

                render::render_status(ui, &status, self.state.last_error.as_deref());
            });

            self.handle_controls(clicks);
        });

        if let Some(view) = self.last_view {
            if let Some(pos) = clicked_at {
                self.detector.on_region_click(pos.x, pos.y, &view);
            }
            self.detector.pump(Instant::now(), &view);
        }

        if self.detector.status().is_screen_sharing {
            ctx.request_repaint_after(LIVE_REPAINT);
        }
    }
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui(detector: CooldownDetector, config: DetectorConfig) -> eframe::Result<()> {
    let width = config.resolution.width as f32 + 40.0;
    let height = config.resolution.height as f32 + 320.0;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(width, height))
            .with_min_inner_size(Vec2::new(640.0, 480.0))
            .with_title("Cooldown Watch")
            // Disable drag-and-drop to avoid COM conflict with RoInitialize (multithreaded)
            .with_drag_and_drop(false),
        ..Default::default()
    };

    log::info!("GUI: Calling eframe::run_native...");

    eframe::run_native(
        "Cooldown Watch",
        options,
        Box::new(move |_cc| Ok(Box::new(GuiApp::new(detector, &config)))),
    )
}
