// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::config::project_dirs;
use crate::error::ConfigError;

const LOG_FILE: &str = "tubepull.log";

/// Default location of the diagnostic log file
pub fn log_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(".tubepull").join(LOG_FILE))
}

/// Install the global file logger.
///
/// When `enabled` is false the logger is installed but the maximum level is
/// `Off`, so nothing is formatted or written.
pub fn init_logger(path: &Path, enabled: bool) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::LoggingFailed(format!("{}: {}", parent.display(), e)))?;
    }

    let file = fern::log_file(path)
        .map_err(|e| ConfigError::LoggingFailed(format!("{}: {}", path.display(), e)))?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(file)
        .apply()
        .map_err(|e| ConfigError::LoggingFailed(e.to_string()))?;

    // fern sets the max level on apply; this decides what is actually kept.
    log::set_max_level(if enabled {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Off
    });

    Ok(())
}
