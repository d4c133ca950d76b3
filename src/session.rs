// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orchestration state shared by every operation the caller starts.
//!
//! A [`Session`] runs each analysis or download batch on its own tokio task
//! and guarantees the start actions are re-enabled afterwards, whether the
//! work succeeded, failed or panicked.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::analysis::{
    AnalysisResult, CaptionTracks, CollectionEntry, analyze, fetch_entry_captions,
};
use crate::backend::Backend;
use crate::download::{
    Batch, BatchSummary, DownloadJob, DownloadSettings, MediaSelection, download_batch,
};
use crate::error::{ConfigError, FailureKind, StartError};
use crate::events::{Event, SharedReporter, UiState};

/// Longest URL accepted; longer input is truncated
pub const MAX_URL_LENGTH: usize = 2048;

/// Trim a URL and cut it to [`MAX_URL_LENGTH`] characters
pub fn normalize_url(url: &str) -> Result<String, StartError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(StartError::EmptyUrl);
    }
    Ok(url.chars().take(MAX_URL_LENGTH).collect())
}

/// Marks an operation kind as in flight until dropped
struct InFlight {
    flag: Arc<AtomicBool>,
    reporter: SharedReporter,
}

impl InFlight {
    fn acquire(
        flag: &Arc<AtomicBool>,
        name: &'static str,
        reporter: &SharedReporter,
    ) -> Result<Self, StartError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StartError::Busy(name))?;

        reporter.report(Event::UiState(UiState::Disabled));
        Ok(Self {
            flag: flag.clone(),
            reporter: reporter.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.reporter.report(Event::UiState(UiState::Enabled));
    }
}

/// Orchestration state: backend, retry settings, output directory and the
/// in-flight flags.
pub struct Session<B> {
    backend: Arc<B>,
    settings: DownloadSettings,
    output_directory: Option<PathBuf>,
    reporter: SharedReporter,
    analysis_active: Arc<AtomicBool>,
    download_active: Arc<AtomicBool>,
}

impl<B: Backend + 'static> Session<B> {
    /// Create a session without an output directory.
    ///
    /// A tool location override, if set, must exist. Analysis works right
    /// away; downloads need [`Session::with_output_directory`].
    pub fn new(
        backend: B,
        settings: DownloadSettings,
        reporter: SharedReporter,
    ) -> Result<Self, ConfigError> {
        if let Some(tool) = &settings.tool_location
            && !tool.exists()
        {
            return Err(ConfigError::ToolNotFound(tool.clone()));
        }

        Ok(Self {
            backend: Arc::new(backend),
            settings,
            output_directory: None,
            reporter,
            analysis_active: Arc::new(AtomicBool::new(false)),
            download_active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Write downloads into `dir`, which must exist; stored as an absolute path
    pub fn with_output_directory(mut self, dir: &Path) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::OutputDirectoryMissing(dir.to_path_buf()));
        }
        let dir = std::fs::canonicalize(dir)
            .map_err(|_| ConfigError::OutputDirectoryMissing(dir.to_path_buf()))?;

        self.output_directory = Some(dir);
        Ok(self)
    }

    pub fn output_directory(&self) -> Option<&Path> {
        self.output_directory.as_deref()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analysis_active.load(Ordering::Acquire)
    }

    pub fn is_downloading(&self) -> bool {
        self.download_active.load(Ordering::Acquire)
    }

    /// Start analyzing `url` in the background.
    ///
    /// The task yields the result, or `None` once the failure has been
    /// reported as an error event.
    pub fn start_analysis(
        &self,
        url: &str,
    ) -> Result<JoinHandle<Option<AnalysisResult>>, StartError> {
        let url = self.checked_url(url)?;
        let guard = InFlight::acquire(&self.analysis_active, "analysis", &self.reporter)?;
        self.reporter.report(Event::status("Analyzing..."));

        let backend = self.backend.clone();
        let reporter = self.reporter.clone();
        let work = async move {
            match analyze(backend.as_ref(), &url, &reporter).await {
                Ok(result) => Some(result),
                Err(e) => {
                    reporter.report(Event::Error(format!(
                        "Analysis error: {}",
                        e.backend_message()
                    )));
                    reporter.report(Event::status("Analysis failed"));
                    None
                }
            }
        };

        Ok(self.spawn_guarded(guard, work))
    }

    /// Look up the caption tracks of one collection entry in the background
    pub fn start_entry_details(
        &self,
        entry: CollectionEntry,
    ) -> Result<JoinHandle<Option<CaptionTracks>>, StartError> {
        let guard = InFlight::acquire(&self.analysis_active, "analysis", &self.reporter)?;

        let backend = self.backend.clone();
        let reporter = self.reporter.clone();
        let work =
            async move { Some(fetch_entry_captions(backend.as_ref(), &entry, &reporter).await) };

        Ok(self.spawn_guarded(guard, work))
    }

    /// Start a download batch in the background.
    ///
    /// The task yields the batch summary, or `None` when a single-item batch
    /// failed and the failure has been reported.
    pub fn start_download(
        &self,
        batch: Batch,
    ) -> Result<JoinHandle<Option<BatchSummary>>, StartError> {
        if batch.is_empty() {
            return Err(StartError::NothingSelected);
        }
        let guard = InFlight::acquire(&self.download_active, "download", &self.reporter)?;

        let backend = self.backend.clone();
        let reporter = self.reporter.clone();
        let settings = self.settings.clone();
        let work = async move {
            match download_batch(backend.as_ref(), &batch, &settings, &reporter).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    reporter.report(Event::Error(format!("Download failed: {}", e)));
                    reporter.report(Event::status("Download failed"));
                    None
                }
            }
        };

        Ok(self.spawn_guarded(guard, work))
    }

    /// A single-item batch writing into this session's output directory
    pub fn single_batch(
        &self,
        url: &str,
        title: &str,
        selection: MediaSelection,
        caption_code: Option<&str>,
    ) -> Result<Batch, StartError> {
        Ok(Batch::single(DownloadJob {
            target_url: normalize_url(url)?,
            title: title.to_string(),
            selection,
            caption_code: caption_code.map(String::from),
            output_directory: self.require_output_directory()?.to_path_buf(),
        }))
    }

    /// A collection batch of the selected entries writing into this
    /// session's output directory
    pub fn collection_batch(
        &self,
        entries: &[CollectionEntry],
        selected: &[usize],
        caption_code: Option<&str>,
    ) -> Result<Batch, StartError> {
        let dir = self.require_output_directory()?;
        Batch::collection(entries, selected, caption_code, dir)
    }

    fn require_output_directory(&self) -> Result<&Path, StartError> {
        self.output_directory().ok_or(StartError::NoOutputDirectory)
    }

    /// [`normalize_url`], warning when the input had to be truncated
    fn checked_url(&self, url: &str) -> Result<String, StartError> {
        let normalized = normalize_url(url)?;
        if normalized.len() < url.trim().len() {
            self.reporter.report(Event::warning(format!(
                "URL is longer than {} characters and was truncated",
                MAX_URL_LENGTH
            )));
        }
        Ok(normalized)
    }

    /// Run `work` on its own task; a panic becomes an error event and the
    /// guard is released either way.
    fn spawn_guarded<T, F>(&self, guard: InFlight, work: F) -> JoinHandle<Option<T>>
    where
        T: Send + 'static,
        F: Future<Output = Option<T>> + Send + 'static,
    {
        let reporter = self.reporter.clone();

        tokio::spawn(async move {
            let outcome = match tokio::spawn(work).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("{:?} in background task: {}", FailureKind::Unexpected, e);
                    reporter.report(Event::Error(format!("Unexpected failure: {}", e)));
                    None
                }
            };
            drop(guard);
            outcome
        })
    }
}
