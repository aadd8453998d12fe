//! Configuration types.
//!
//! Loads settings from config.json at startup. Provides the capture target,
//! display resolution, crop box size, template location and alarm settings.
//! Detection thresholds and alarm timing are constants in `detection`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::paths;
use crate::vision::TemplateSpec;

/// Size of the live view the operator selects the crop box in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resolutions offered in the GUI picker.
    pub const PRESETS: [Resolution; 3] = [
        Resolution::new(1280, 720),
        Resolution::new(1366, 768),
        Resolution::new(1920, 1080),
    ];
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1366, 768)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid resolution \"{}\", expected WxH", s))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid resolution width \"{}\"", w))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid resolution height \"{}\"", h))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution must be non-zero, got {}", s));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Executable name of the game whose window is captured (case-insensitive)
    pub target_process: String,
    /// Size of the live view in the GUI
    pub resolution: Resolution,
    /// Width and height of the crop box, in display pixels
    pub box_size: u32,
    /// Smallest cooldown number that has a template
    pub digit_min: u32,
    /// Largest cooldown number that has a template
    pub digit_max: u32,
    /// Uniform scales each template is baked at
    pub template_scales: Vec<f32>,
    /// Directory holding `{n}.png` digit templates
    pub template_dir: String,
    /// Sound played on odd-numbered alarms
    pub first_alarm_path: String,
    /// Sound played on even-numbered alarms
    pub second_alarm_path: String,
    /// Volume of the first alarm (0.0-1.0)
    pub first_volume: f32,
    /// Volume of the second alarm (0.0-1.0)
    pub second_volume: f32,
    /// Saved screenshot to replay instead of capturing the game window
    pub replay_image: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            target_process: "MapleStory.exe".to_string(),
            resolution: Resolution::default(),
            box_size: 40,
            digit_min: 6,
            digit_max: 54,
            template_scales: vec![0.9, 1.0, 1.1],
            template_dir: "resources/templates".to_string(),
            first_alarm_path: "resources/sound/BikBik.mp3".to_string(),
            second_alarm_path: "resources/sound/dingdong.mp3".to_string(),
            first_volume: 1.0,
            second_volume: 1.0,
            replay_image: None,
        }
    }
}

impl DetectorConfig {
    /// What the template loader needs, with `template_dir` resolved next to the exe.
    pub fn template_spec(&self) -> TemplateSpec {
        TemplateSpec {
            dir: paths::resolve(&self.template_dir),
            digits: self.digit_min..=self.digit_max,
            box_width: self.box_size,
            box_height: self.box_size,
            scales: self.template_scales.clone(),
        }
    }

    /// Clamps values that would break the pipeline back into range.
    fn sanitized(mut self) -> Self {
        if self.box_size < 3 {
            log::warn!("box_size {} is too small, using 3", self.box_size);
            self.box_size = 3;
        }
        if self.digit_min > self.digit_max {
            std::mem::swap(&mut self.digit_min, &mut self.digit_max);
        }
        self.template_scales.retain(|s| s.is_finite() && *s > 0.0);
        if self.template_scales.is_empty() {
            self.template_scales = vec![1.0];
        }
        self.first_volume = self.first_volume.clamp(0.0, 1.0);
        self.second_volume = self.second_volume.clamp(0.0, 1.0);
        self
    }
}

/// Loads configuration from the given path or returns defaults.
pub fn load_config(config_path: &Path) -> DetectorConfig {
    log::info!("Looking for config at: {}", config_path.display());

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str::<DetectorConfig>(&contents) {
                Ok(config) => {
                    log::info!("Config loaded from {}", config_path.display());
                    return config.sanitized();
                }
                Err(e) => {
                    log::warn!("Failed to parse config.json: {}. Using defaults.", e);
                }
            },
            Err(e) => {
                log::warn!("Failed to read config.json: {}. Using defaults.", e);
            }
        }
    } else {
        log::info!("config.json not found. Using default config.");
    }

    DetectorConfig::default()
}
