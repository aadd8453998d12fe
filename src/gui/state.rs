//! GUI application state.
//!
//! Tracks user input values that are not owned by the detector.

use crate::config::{DetectorConfig, Resolution};
use crate::detection::AlarmCue;

/// Editable settings for one alarm cue.
#[derive(Clone, Debug)]
pub struct AlarmSettings {
    /// Sound file path as typed by the user (relative paths resolve next to the exe).
    pub path: String,
    pub volume: f32,
}

/// Buttons pressed this frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlClicks {
    pub toggle_share: bool,
    pub enter_crop: bool,
    pub confirm_crop: bool,
    pub toggle_hunting: bool,
}

/// Alarm panel interactions this frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlarmClicks {
    pub apply_source: Option<AlarmCue>,
    pub preview: Option<AlarmCue>,
    pub volume_changed: Option<AlarmCue>,
}

#[derive(Debug)]
pub struct GuiState {
    /// Size the live view is drawn at.
    pub resolution: Resolution,
    /// Indexed by `AlarmCue::index`.
    pub alarms: [AlarmSettings; 2],
    /// Last failed action, shown until the next successful one.
    pub last_error: Option<String>,
}

impl GuiState {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            resolution: config.resolution,
            alarms: [
                AlarmSettings {
                    path: config.first_alarm_path.clone(),
                    volume: config.first_volume,
                },
                AlarmSettings {
                    path: config.second_alarm_path.clone(),
                    volume: config.second_volume,
                },
            ],
            last_error: None,
        }
    }

    pub fn alarm(&self, cue: AlarmCue) -> &AlarmSettings {
        &self.alarms[cue.index()]
    }

    /// Changes the live view size. Refused while sharing, since a confirmed
    /// crop would no longer line up with the view.
    pub fn select_resolution(&mut self, resolution: Resolution, sharing: bool) -> bool {
        if sharing || resolution == self.resolution {
            return false;
        }
        log::info!("View size set to {}", resolution);
        self.resolution = resolution;
        true
    }
}
