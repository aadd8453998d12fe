//! Cooldown Watch
//!
//! Watches a cropped region of the MapleStory window for the yellow
//! rune/buff cooldown number, matches it against digit templates and raises an
//! audible alarm shortly before the cooldown expires.

pub mod audio;
pub mod capture;
pub mod config;
pub mod detection;
pub mod gui;
pub mod logging;
pub mod paths;
pub mod region;
pub mod vision;
