// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::backend::{Backend, BackendEvent};
use crate::error::{DownloadError, ExtractionError, FailureKind};
use crate::events::{Event, SharedReporter};
use crate::progress::{BatchProgress, ItemProgress};
use crate::retry::{RetryPolicy, run_with_retry};

use super::job::{Batch, BatchKind, DownloadJob};
use super::naming::truncate_title;

/// Options for running a download batch
#[derive(Debug, Clone, Default)]
pub struct DownloadSettings {
    /// Retry policy applied to every job
    pub policy: RetryPolicy,
    /// Directory holding the media post-processing tool, if not on PATH
    pub tool_location: Option<PathBuf>,
}

/// A job that failed after all retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub title: String,
    pub error: String,
}

/// Result of a download batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of jobs retrieved successfully
    pub success_count: usize,
    /// Number of jobs that failed after all retries
    pub failure_count: usize,
    /// Number of jobs in the batch
    pub total: usize,
    /// Details of failed jobs, in batch order
    pub failed_items: Vec<FailedItem>,
}

/// Run every job of a batch in order.
///
/// A failing job of a [`BatchKind::Single`] batch ends the run with an error
/// and no summary. Collection batches count failures and keep going; their
/// summary is always emitted.
pub async fn download_batch<B: Backend + ?Sized>(
    backend: &B,
    batch: &Batch,
    settings: &DownloadSettings,
    reporter: &SharedReporter,
) -> Result<BatchSummary, DownloadError> {
    reporter.report(Event::ItemProgress(0.0));
    reporter.report(Event::OverallProgress(0.0));

    match batch.kind {
        BatchKind::Single => download_single(backend, &batch.jobs, settings, reporter).await,
        BatchKind::Collection => {
            Ok(download_collection(backend, &batch.jobs, settings, reporter).await)
        }
    }
}

async fn download_single<B: Backend + ?Sized>(
    backend: &B,
    jobs: &[DownloadJob],
    settings: &DownloadSettings,
    reporter: &SharedReporter,
) -> Result<BatchSummary, DownloadError> {
    let mut summary = BatchSummary {
        success_count: 0,
        failure_count: 0,
        total: jobs.len(),
        failed_items: Vec::new(),
    };

    for job in jobs {
        match job.rendition() {
            Some(rendition) => {
                reporter.report(Event::info(format!(
                    "Starting download of {} ({})...",
                    rendition.resolution_label, rendition.video_codec
                )));
                reporter.report(Event::status("Downloading video..."));
            }
            None if job.selection.is_audio_only() => {
                reporter.report(Event::info("Starting audio download as MP3..."));
                reporter.report(Event::status("Downloading audio..."));
            }
            None => {
                reporter.report(Event::info(format!("Starting download of {}...", job.title)));
                reporter.report(Event::status("Downloading video..."));
            }
        }

        run_job(backend, job, settings, reporter).await?;

        summary.success_count += 1;
        reporter.report(Event::info(format!("Download finished: {}", job.title)));
    }

    reporter.report(Event::OverallProgress(100.0));
    finish(&summary, "Download completed successfully".to_string(), reporter);
    Ok(summary)
}

async fn download_collection<B: Backend + ?Sized>(
    backend: &B,
    jobs: &[DownloadJob],
    settings: &DownloadSettings,
    reporter: &SharedReporter,
) -> BatchSummary {
    let total = jobs.len();
    let mut progress = BatchProgress::new(total);
    let mut summary = BatchSummary {
        success_count: 0,
        failure_count: 0,
        total,
        failed_items: Vec::new(),
    };

    reporter.report(Event::info(format!(
        "Preparing to download {} selected items...",
        total
    )));

    for (index, job) in jobs.iter().enumerate() {
        let position = index + 1;
        reporter.report(Event::info(format!(
            "--- Starting ({}/{}): {} ---",
            position,
            total,
            truncate_title(&job.title, 50)
        )));
        reporter.report(Event::status(format!(
            "Downloading {}/{}: {}",
            position,
            total,
            truncate_title(&job.title, 30)
        )));

        match run_job(backend, job, settings, reporter).await {
            Ok(()) => {
                summary.success_count += 1;
                reporter.report(Event::info(format!("Downloaded: {}", job.title)));
            }
            Err(e) => {
                summary.failure_count += 1;
                reporter.report(Event::warning(format!(
                    "Failed: {} | Error: {}",
                    job.title, e
                )));
                summary.failed_items.push(FailedItem {
                    title: job.title.clone(),
                    error: e.to_string(),
                });
            }
        }

        reporter.report(Event::OverallProgress(progress.complete_job()));
    }

    reporter.report(Event::info(format!(
        "All download tasks finished. Succeeded: {}, failed: {}, total: {}",
        summary.success_count, summary.failure_count, summary.total
    )));
    for failed in &summary.failed_items {
        reporter.report(Event::warning(format!(
            "  - {}: {}",
            failed.title, failed.error
        )));
    }

    let message = format!(
        "Download complete! Succeeded: {}, failed: {}",
        summary.success_count, summary.failure_count
    );
    finish(&summary, message, reporter);
    summary
}

fn finish(summary: &BatchSummary, message: String, reporter: &SharedReporter) {
    reporter.report(Event::BatchSummary(summary.clone()));
    reporter.report(Event::Success(message));
    reporter.report(Event::status("Download finished"));
}

/// Retrieve one job with retries, feeding its progress to a fresh tracker
async fn run_job<B: Backend + ?Sized>(
    backend: &B,
    job: &DownloadJob,
    settings: &DownloadSettings,
    reporter: &SharedReporter,
) -> Result<(), DownloadError> {
    let options = job.retrieve_options(settings.tool_location.as_deref());

    if job.selection.needs_merge() {
        reporter.report(Event::info(
            "Selected format has no audio; video and audio will be downloaded separately and merged.",
        ));
    }

    let item = Mutex::new(ItemProgress::start(reporter.clone()));
    let sink = |event: BackendEvent| {
        if let Ok(mut item) = item.lock() {
            item.handle(event);
        }
    };

    let url = job.target_url.as_str();
    let options = &options;
    let sink = &sink;
    run_with_retry(
        &settings.policy,
        reporter,
        |e: &ExtractionError| e.kind() == FailureKind::Extraction,
        move |_| backend.retrieve(url, options, sink),
    )
    .await
    .map_err(|failure| {
        let title = job.title.clone();
        let (attempts, source) = (failure.attempts, failure.last_error);
        if failure.exhausted {
            DownloadError::RetryExhausted { title, attempts, source }
        } else {
            DownloadError::Aborted { title, attempts, source }
        }
    })?;

    if job.selection.is_audio_only() {
        reporter.report(Event::info("MP3 conversion finished."));
    }
    Ok(())
}
