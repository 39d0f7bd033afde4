//! Debug log file for nvim-bridge.
//!
//! Routes the `log` facade to `nvim_bridge_debug.log` in the system temp
//! directory, keeping diagnostics away from the UI's own terminal output.
//!
//! Level precedence: `RUST_LOG` (also mirrored to stderr), then the level
//! passed to [`init_log_bridge`], then off.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

struct FileLogger {
    level: LevelFilter,
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.write_all(line.as_bytes());
        }
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

static LOGGER: OnceLock<FileLogger> = OnceLock::new();

/// Location of the debug log file.
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("nvim_bridge_debug.log")
}

/// Resolve the effective level from `RUST_LOG` and the configured level.
///
/// Returns the level and whether it came from the environment.
pub fn resolve_level(env: Option<&str>, configured: Option<LevelFilter>) -> (LevelFilter, bool) {
    if let Some(level) = env.and_then(|value| LevelFilter::from_str(value.trim()).ok()) {
        return (level, true);
    }
    (configured.unwrap_or(LevelFilter::Off), false)
}

/// Install the file logger. Later calls are ignored.
pub fn init_log_bridge(configured: Option<LevelFilter>) {
    let env = std::env::var("RUST_LOG").ok();
    let (level, from_env) = resolve_level(env.as_deref(), configured);

    let logger = LOGGER.get_or_init(|| {
        let file = if level == LevelFilter::Off {
            None
        } else {
            // Logging must never take the bridge down; run without a file.
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .create(true)
                .open(log_path())
                .ok()
        };
        FileLogger {
            level,
            file: Mutex::new(file),
            mirror_stderr: from_env,
        }
    });

    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.level);
        log::info!(
            "nvim-bridge {} debug log started (level={})",
            crate::VERSION,
            logger.level
        );
    }
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}
