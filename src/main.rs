//! Cooldown Watch
//!
//! A Windows GUI application that shares the game window, watches the
//! operator-selected cooldown box and plays an alarm before it runs out.

// Hide console window on Windows for GUI mode
#![windows_subsystem = "windows"]

use anyhow::Result;

use cooldown_watch::config::{load_config, DetectorConfig};
use cooldown_watch::{logging, paths};

fn main() -> Result<()> {
    logging::install_panic_hook();

    // Logs directory must exist before the logger opens its file
    paths::ensure_directories()?;
    logging::init();

    let config = load_config(&paths::get_config_path());
    run(config)
}

#[cfg(windows)]
fn run(config: DetectorConfig) -> Result<()> {
    use anyhow::anyhow;
    use cooldown_watch::audio::AlarmPlayer;
    use cooldown_watch::capture::{
        CaptureBackend, CaptureManager, StillBackend, StillFeed, WindowCaptureBackend,
    };
    use cooldown_watch::detection::CooldownDetector;
    use cooldown_watch::gui;
    use cooldown_watch::vision::TemplateStore;

    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };

    let templates = TemplateStore::spawn_load(config.template_spec());

    let backend: Box<dyn CaptureBackend> = match &config.replay_image {
        Some(path) => {
            log::info!("Replaying {} instead of the game window", path);
            let feed = StillFeed::from_file(&paths::resolve(path))?;
            Box::new(StillBackend::new(feed).without_notifications())
        }
        None => Box::new(WindowCaptureBackend::new(config.target_process.clone())),
    };

    let player = AlarmPlayer::new(
        paths::resolve(&config.first_alarm_path),
        paths::resolve(&config.second_alarm_path),
    );
    let detector = CooldownDetector::new(
        CaptureManager::new(backend),
        templates,
        Box::new(player),
        config.box_size,
    );

    log::info!("Starting GUI application...");
    match gui::run_gui(detector, config) {
        Ok(()) => {
            log::info!("GUI application exited normally");
            Ok(())
        }
        Err(e) => {
            log::error!("GUI error: {}", e);
            Err(anyhow!("GUI error: {}", e))
        }
    }
}

#[cfg(not(windows))]
fn run(_config: DetectorConfig) -> Result<()> {
    log::error!("Window capture requires Windows Graphics Capture; nothing to run on this platform");
    anyhow::bail!("unsupported platform")
}
