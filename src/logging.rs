//! Logging setup.
//!
//! Every record is written to stdout and appended to `logs/cooldown_watch.log`
//! with a wall-clock timestamp. `RUST_LOG` overrides the default `info` filter.

use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::Level;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use crate::paths;

const LOG_FILE_NAME: &str = "cooldown_watch.log";

/// Writer that duplicates output to stdout and an optional log file.
///
/// Write errors on either side are swallowed: a GUI-subsystem process has no
/// console, and a locked log file must never take the detector down.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stdout().write_all(buf);
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stdout().flush();
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// Formats one log line: `[HH:MM:SS.mmm] message`, with the level tag
/// prepended for anything other than info.
fn format_line(level: Level, message: &str) -> String {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    match level {
        Level::Info => format!("[{}] {}", timestamp, message),
        _ => format!("[{}] [{}] {}", timestamp, level, message),
    }
}

/// Installs the global logger. Safe to call more than once.
pub fn init() {
    let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                format_line(record.level(), &record.args().to_string())
            )
        })
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init();
}

/// Logs panics through the logger so they land in the log file.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log::error!("[PANIC]{} {}", location, msg);
        eprintln!("[PANIC]{} {}", location, msg);
    }));
}
