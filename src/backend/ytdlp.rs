// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use log::Level;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{
    Backend, BackendEvent, MediaInfo, ProgressSink, ProgressStage, ProgressUpdate, RetrieveOptions,
};
use crate::error::ExtractionError;

/// Prefix of the JSON progress lines requested through `--progress-template`
const DOWNLOAD_MARKER: &str = "[tubepull:download]";
const POSTPROCESS_MARKER: &str = "[tubepull:postprocess]";

/// Backend implementation driving the `yt-dlp` program
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.kill_on_drop(true).stdin(Stdio::null());
        cmd
    }

    /// Query the program version; fails if the program cannot be run
    pub async fn version(&self) -> Result<String, ExtractionError> {
        let output = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| ExtractionError::LaunchFailed {
                program: self.program_name(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::failed(error_message(
                &stderr,
                &self.program_name(),
                output.status,
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run the program in single-JSON mode and parse the record
    async fn dump_json(&self, url: &str, extra: &[&str]) -> Result<MediaInfo, ExtractionError> {
        let mut cmd = self.command();
        cmd.args(extra)
            .args(["-J", "--no-warnings", "--", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::debug!("Metadata command: {:?}", cmd);

        let output = cmd
            .output()
            .await
            .map_err(|e| ExtractionError::LaunchFailed {
                program: self.program_name(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::failed(error_message(
                &stderr,
                &self.program_name(),
                output.status,
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ExtractionError::InvalidMetadata {
            url: url.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl Backend for YtDlp {
    async fn probe_metadata(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        self.dump_json(url, &["--flat-playlist", "--playlist-items", "1"])
            .await
    }

    async fn fetch_single_metadata(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        self.dump_json(url, &["--no-playlist"]).await
    }

    async fn fetch_flat_listing(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        self.dump_json(url, &["--flat-playlist", "--yes-playlist"])
            .await
    }

    async fn retrieve(
        &self,
        url: &str,
        options: &RetrieveOptions,
        sink: ProgressSink<'_>,
    ) -> Result<(), ExtractionError> {
        let download_template = format!("download:{DOWNLOAD_MARKER}%(progress)j");
        let postprocess_template = format!("postprocess:{POSTPROCESS_MARKER}%(progress)j");

        let mut cmd = self.command();
        cmd.args(options.to_args())
            .args([
                "--no-playlist",
                "--newline",
                "--progress-template",
                download_template.as_str(),
                "--progress-template",
                postprocess_template.as_str(),
                "--",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::info!("Starting retrieval of {}", url);
        log::debug!("Retrieve command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| ExtractionError::LaunchFailed {
            program: self.program_name(),
            source: e,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| ExtractionError::OutputFailed {
            program: self.program_name(),
            source: std::io::Error::other("stdout not captured"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ExtractionError::OutputFailed {
            program: self.program_name(),
            source: std::io::Error::other("stderr not captured"),
        })?;

        // Titles and messages are not guaranteed to be UTF-8; both pipes are
        // read to EOF so the child never blocks on a full buffer.
        let read_stdout = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            while let Some(line) = next_lossy_line(&mut reader, &mut buf)
                .await
                .map_err(|e| ExtractionError::OutputFailed {
                    program: self.program_name(),
                    source: e,
                })?
            {
                if let Some(event) = parse_stdout_line(&line) {
                    sink(event);
                }
            }
            Ok::<(), ExtractionError>(())
        };

        let read_stderr = async {
            let mut collected = String::new();
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                match next_lossy_line(&mut reader, &mut buf).await {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_stderr_line(&line) {
                            sink(event);
                        }
                        collected.push_str(&line);
                        collected.push('\n');
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("Stopped reading {} stderr: {}", self.program_name(), e);
                        break;
                    }
                }
            }
            collected
        };

        let (stdout_result, stderr_text) = tokio::join!(read_stdout, read_stderr);
        stdout_result?;

        let status = child
            .wait()
            .await
            .map_err(|e| ExtractionError::OutputFailed {
                program: self.program_name(),
                source: e,
            })?;

        if !status.success() {
            return Err(ExtractionError::failed(error_message(
                &stderr_text,
                &self.program_name(),
                status,
            )));
        }

        Ok(())
    }
}

/// Read one line, replacing invalid UTF-8; `None` at EOF
async fn next_lossy_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Interpret one stdout line of a running retrieval.
///
/// Progress records that fail to parse are dropped.
fn parse_stdout_line(line: &str) -> Option<BackendEvent> {
    let line = line.trim_end();

    let (stage, json) = if let Some(json) = line.strip_prefix(DOWNLOAD_MARKER) {
        (ProgressStage::Download, json)
    } else if let Some(json) = line.strip_prefix(POSTPROCESS_MARKER) {
        (ProgressStage::PostProcess, json)
    } else {
        if line.is_empty() || line.starts_with("[debug] ") {
            return None;
        }
        return Some(BackendEvent::Message {
            level: Level::Info,
            text: line.to_string(),
        });
    };

    match serde_json::from_str::<ProgressUpdate>(json) {
        Ok(mut update) => {
            update.stage = stage;
            Some(BackendEvent::Progress(update))
        }
        Err(e) => {
            log::debug!("Ignoring malformed progress record ({}): {}", e, json);
            None
        }
    }
}

fn parse_stderr_line(line: &str) -> Option<BackendEvent> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with("[debug] ") {
        return None;
    }

    let (level, text) = if let Some(rest) = line.strip_prefix("WARNING:") {
        (Level::Warn, rest.trim())
    } else if let Some(rest) = line.strip_prefix("ERROR:") {
        (Level::Error, rest.trim())
    } else {
        (Level::Info, line)
    };

    Some(BackendEvent::Message {
        level,
        text: text.to_string(),
    })
}

/// Pick the most useful failure message out of the program's stderr
fn error_message(stderr: &str, program: &str, status: ExitStatus) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(error) = lines.iter().rev().find_map(|l| l.strip_prefix("ERROR:")) {
        return error.trim().to_string();
    }

    lines
        .last()
        .map(|l| l.to_string())
        .unwrap_or_else(|| format!("{} exited with {}", program, status))
}
