// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted in-memory backend shared by the engine's tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Backend, BackendEvent, MediaInfo, ProgressSink, ProgressUpdate, RetrieveOptions};
use crate::error::ExtractionError;

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    probes: HashMap<String, Result<MediaInfo, String>>,
    singles: HashMap<String, Result<MediaInfo, String>>,
    listings: HashMap<String, Result<MediaInfo, String>>,
    /// Remaining failures per URL; `u32::MAX` fails forever
    failures: Mutex<HashMap<String, u32>>,
    unlaunchable: HashSet<String>,
    progress: Vec<ProgressUpdate>,
    calls: Mutex<Vec<String>>,
    retrievals: Mutex<Vec<(String, RetrieveOptions)>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_probe(mut self, url: &str, result: Result<MediaInfo, &str>) -> Self {
        self.probes
            .insert(url.to_string(), result.map_err(String::from));
        self
    }

    pub(crate) fn with_single(mut self, url: &str, result: Result<MediaInfo, &str>) -> Self {
        self.singles
            .insert(url.to_string(), result.map_err(String::from));
        self
    }

    pub(crate) fn with_listing(mut self, url: &str, result: Result<MediaInfo, &str>) -> Self {
        self.listings
            .insert(url.to_string(), result.map_err(String::from));
        self
    }

    /// Make retrievals of `url` fail `times` times before succeeding
    pub(crate) fn failing(self, url: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
        self
    }

    /// Make retrievals of `url` fail as if the backend program could not start
    pub(crate) fn failing_to_launch(mut self, url: &str) -> Self {
        self.unlaunchable.insert(url.to_string());
        self
    }

    /// Progress callbacks replayed on every successful retrieval
    pub(crate) fn with_progress(mut self, updates: Vec<ProgressUpdate>) -> Self {
        self.progress = updates;
        self
    }

    /// Every backend call, as `"<method> <url>"`
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn retrieve_attempts(&self, url: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| *c == &format!("retrieve {}", url))
            .count()
    }

    pub(crate) fn retrievals(&self) -> Vec<(String, RetrieveOptions)> {
        self.retrievals.lock().unwrap().clone()
    }

    fn record(&self, method: &str, url: &str) {
        self.calls.lock().unwrap().push(format!("{} {}", method, url));
    }

    fn lookup(
        table: &HashMap<String, Result<MediaInfo, String>>,
        url: &str,
    ) -> Result<MediaInfo, ExtractionError> {
        match table.get(url) {
            Some(Ok(info)) => Ok(info.clone()),
            Some(Err(message)) => Err(ExtractionError::failed(message.clone())),
            None => Err(ExtractionError::failed(format!("Unsupported URL: {}", url))),
        }
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn probe_metadata(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        self.record("probe", url);
        Self::lookup(&self.probes, url)
    }

    async fn fetch_single_metadata(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        self.record("single", url);
        Self::lookup(&self.singles, url)
    }

    async fn fetch_flat_listing(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        self.record("listing", url);
        Self::lookup(&self.listings, url)
    }

    async fn retrieve(
        &self,
        url: &str,
        options: &RetrieveOptions,
        sink: ProgressSink<'_>,
    ) -> Result<(), ExtractionError> {
        self.record("retrieve", url);
        self.retrievals
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        if self.unlaunchable.contains(url) {
            return Err(ExtractionError::LaunchFailed {
                program: "yt-dlp".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url)
                && *remaining > 0
            {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(ExtractionError::failed(format!("HTTP Error 503 for {}", url)));
            }
        }

        for update in &self.progress {
            sink(BackendEvent::Progress(update.clone()));
        }
        Ok(())
    }
}

/// Build a progress callback the way the backend would report it
pub(crate) fn progress(status: &str, downloaded: Option<u64>, total: Option<u64>) -> ProgressUpdate {
    ProgressUpdate {
        stage: super::ProgressStage::Download,
        status: status.to_string(),
        downloaded_bytes: downloaded.map(serde_json::Value::from),
        total_bytes: total.map(serde_json::Value::from),
        total_bytes_estimate: None,
        postprocessor: None,
    }
}
