// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted settings, stored as TOML in the platform config directory

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};

use crate::download::DownloadSettings;
use crate::error::ConfigError;
use crate::retry::RetryPolicy;

const CONFIG_FILE: &str = "config.toml";

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tubepull", "tubepull")
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_download_directory() -> PathBuf {
    UserDirs::new()
        .map(|dirs| {
            dirs.download_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dirs.home_dir().join("Downloads"))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Backend program, looked up on PATH unless absolute
    pub ytdlp_path: PathBuf,
    /// Directory of the media post-processing tool, when not on PATH
    pub ffmpeg_path: Option<PathBuf>,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub download_directory: PathBuf,
    pub log_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: None,
            max_retries: policy.max_retries,
            retry_delay_secs: policy.delay.as_secs(),
            download_directory: default_download_directory(),
            log_enabled: false,
        }
    }
}

impl Config {
    /// Location of the settings file
    pub fn path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(".tubepull").join(CONFIG_FILE))
    }

    /// Load the settings file, falling back to defaults when it is missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write a commented settings file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_failed = |e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, self.render()).map_err(write_failed)
    }

    fn render(&self) -> String {
        let mut content = String::from("# tubepull configuration\n\n");

        content.push_str("# The yt-dlp program to run. A bare name is looked up on PATH.\n");
        content.push_str(&format!("ytdlp_path = {}\n\n", quoted(&self.ytdlp_path)));

        content.push_str("# Directory containing ffmpeg, used for merging and audio conversion.\n");
        match &self.ffmpeg_path {
            Some(path) => content.push_str(&format!("ffmpeg_path = {}\n\n", quoted(path))),
            None => content.push_str("# ffmpeg_path = \"/usr/local/bin\"\n\n"),
        }

        content.push_str("# How often a failed download is retried before giving up.\n");
        content.push_str(&format!("max_retries = {}\n\n", self.max_retries));

        content.push_str("# Seconds to wait between retries.\n");
        content.push_str(&format!("retry_delay_secs = {}\n\n", self.retry_delay_secs));

        content.push_str("# The directory where videos and audio will be downloaded.\n");
        content.push_str(&format!(
            "download_directory = {}\n\n",
            quoted(&self.download_directory)
        ));

        content.push_str("# Write a diagnostic log file.\n");
        content.push_str(&format!("log_enabled = {}\n", self.log_enabled));

        content
    }

    /// Check the tool location and download directory before any work starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.ffmpeg_path
            && !path.exists()
        {
            return Err(ConfigError::ToolNotFound(path.clone()));
        }

        if !self.download_directory.is_dir() {
            return Err(ConfigError::OutputDirectoryMissing(
                self.download_directory.clone(),
            ));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            policy: self.retry_policy(),
            tool_location: self.ffmpeg_path.clone(),
        }
    }
}

/// A path as a TOML string literal, escaped as needed
fn quoted(path: &Path) -> String {
    toml::Value::String(path.to_string_lossy().into_owned()).to_string()
}
