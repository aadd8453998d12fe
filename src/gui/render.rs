//! GUI rendering functions.
//!
//! Contains UI layout and component rendering logic.

use eframe::egui::{self, Color32, Pos2, Rect, RichText, Sense, Stroke, TextureHandle, Vec2};

use super::state::{AlarmClicks, ControlClicks, GuiState};
use crate::config::Resolution;
use crate::detection::{AlarmCue, DetectorStatus, Phase};
use crate::region::DisplayRect;

/// Snapshot preview magnification.
const SNAPSHOT_ZOOM: f32 = 4.0;

/// Render the resolution picker and the capture / crop / hunt buttons.
pub fn render_controls(
    ui: &mut egui::Ui,
    state: &mut GuiState,
    status: &DetectorStatus,
) -> ControlClicks {
    let mut clicks = ControlClicks::default();

    ui.horizontal(|ui| {
        // The crop box is in view coordinates, so the size is fixed while sharing
        ui.add_enabled_ui(!status.is_screen_sharing, |ui| {
            let mut picked = state.resolution;
            egui::ComboBox::from_label("View size")
                .selected_text(state.resolution.to_string())
                .show_ui(ui, |ui| {
                    for preset in Resolution::PRESETS {
                        ui.selectable_value(&mut picked, preset, preset.to_string());
                    }
                })
                .response
                .on_disabled_hover_text("Stop sharing to change the view size");
            state.select_resolution(picked, status.is_screen_sharing);
        });

        ui.add_space(20.0);

        let share_label = if status.is_screen_sharing {
            "⏹ Stop share"
        } else {
            "▶ Share screen"
        };
        if ui.button(RichText::new(share_label).size(16.0)).clicked() {
            clicks.toggle_share = true;
        }

        ui.add_enabled_ui(status.is_screen_sharing, |ui| {
            if ui.button("✂ Select region").clicked() {
                clicks.enter_crop = true;
            }
        });

        ui.add_enabled_ui(status.is_click_mode && status.crop_region.is_some(), |ui| {
            if ui.button("✔ Confirm").clicked() {
                clicks.confirm_crop = true;
            }
        });

        ui.add_enabled_ui(status.crop_confirmed || status.is_hunting_active, |ui| {
            let hunt_label = if status.is_hunting_active {
                "◼ Stop hunting"
            } else {
                "🔔 Start hunting"
            };
            if ui.button(RichText::new(hunt_label).size(16.0)).clicked() {
                clicks.toggle_hunting = true;
            }
        });
    });

    clicks
}

/// Render the live view at the chosen resolution with the crop box on top.
///
/// Returns the rectangle the view occupies and the click position, if any.
pub fn render_live_view(
    ui: &mut egui::Ui,
    texture: Option<&TextureHandle>,
    resolution: Resolution,
    status: &DetectorStatus,
) -> (DisplayRect, Option<Pos2>) {
    let size = Vec2::new(resolution.width as f32, resolution.height as f32);

    let response = match texture {
        Some(texture) => {
            ui.add(egui::Image::new((texture.id(), size)).sense(Sense::click()))
        }
        None => {
            let (rect, response) = ui.allocate_exact_size(size, Sense::click());
            ui.painter().rect_filled(rect, 4.0, Color32::from_gray(30));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No capture",
                egui::FontId::proportional(16.0),
                Color32::from_gray(120),
            );
            response
        }
    };

    let rect = response.rect;
    let view = DisplayRect::new(rect.left(), rect.top(), rect.width(), rect.height());

    if let Some(crop) = status.crop_region {
        let color = if status.crop_confirmed {
            Color32::from_rgb(0, 200, 0)
        } else {
            Color32::from_rgb(255, 200, 0)
        };
        let crop_rect = Rect::from_min_size(
            Pos2::new(rect.left() + crop.x, rect.top() + crop.y),
            Vec2::new(crop.width, crop.height),
        );
        ui.painter().rect_stroke(crop_rect, 0.0, Stroke::new(2.0, color));
    }

    let click = if response.clicked() {
        response.interact_pointer_pos()
    } else {
        None
    };
    (view, click)
}

/// Render the magnified last sample and the recently matched numbers.
pub fn render_snapshot(ui: &mut egui::Ui, texture: Option<&TextureHandle>, recent: &[u32]) {
    ui.horizontal(|ui| {
        if let Some(texture) = texture {
            ui.image((texture.id(), texture.size_vec2() * SNAPSHOT_ZOOM));
        }
        ui.vertical(|ui| {
            ui.label("Recent:");
            let values: Vec<String> = recent.iter().map(u32::to_string).collect();
            ui.label(RichText::new(values.join(" ")).monospace());
        });
    });
}

/// Render the sound file, volume and preview controls for both cues.
pub fn render_alarm_settings(ui: &mut egui::Ui, state: &mut GuiState) -> AlarmClicks {
    let mut clicks = AlarmClicks::default();

    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    for (cue, label) in [(AlarmCue::First, "Alarm 1"), (AlarmCue::Second, "Alarm 2")] {
        let settings = &mut state.alarms[cue.index()];
        ui.horizontal(|ui| {
            ui.label(RichText::new(label).strong());
            ui.add(egui::TextEdit::singleline(&mut settings.path).desired_width(260.0));
            if ui.button("Apply").clicked() {
                clicks.apply_source = Some(cue);
            }
            if ui
                .add(egui::Slider::new(&mut settings.volume, 0.0..=1.0).text("Volume"))
                .changed()
            {
                clicks.volume_changed = Some(cue);
            }
            if ui.button("🔊 Preview").clicked() {
                clicks.preview = Some(cue);
            }
        });
    }

    clicks
}

/// Render the status line.
pub fn render_status(ui: &mut egui::Ui, status: &DetectorStatus, last_error: Option<&str>) {
    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    ui.horizontal(|ui| {
        ui.label("Status:");

        let status_color = match status.phase {
            Phase::Idle if status.is_hunting_active => Color32::from_rgb(0, 120, 200),
            Phase::Idle => Color32::GRAY,
            Phase::Rising => Color32::from_rgb(200, 150, 0),
            Phase::Locked => Color32::from_rgb(0, 150, 0),
        };
        ui.label(RichText::new(&status.status_text).color(status_color));
    });

    if let Some(error) = last_error {
        ui.label(RichText::new(error).color(Color32::from_rgb(200, 0, 0)));
    }
}
