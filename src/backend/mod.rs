// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The extraction/retrieval backend, treated as an opaque capability.
//!
//! The engine only sees the [`Backend`] trait and the raw metadata records it
//! returns. [`YtDlp`] is the production implementation.

mod options;
mod ytdlp;

#[cfg(test)]
pub(crate) mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;
use log::Level;
use serde::Deserialize;

use crate::error::ExtractionError;

pub use options::{AudioExtraction, CaptionRequest, RetrieveOptions};
pub use ytdlp::YtDlp;

/// Metadata record returned by the backend for an item or a collection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub channel_id: Option<String>,
    pub thumbnail: Option<String>,
    pub thumbnails: Option<Vec<Thumbnail>>,
    pub duration: Option<f64>,
    pub formats: Option<Vec<FormatRecord>>,
    pub subtitles: Option<BTreeMap<String, Vec<SubtitleRecord>>>,
    pub entries: Option<Vec<Option<EntryRecord>>>,
}

impl MediaInfo {
    /// Best thumbnail URL: the explicit one, else the last listed
    pub fn thumbnail_url(&self) -> Option<String> {
        self.thumbnail.clone().or_else(|| {
            self.thumbnails
                .as_ref()
                .and_then(|list| list.iter().rev().find_map(|t| t.url.clone()))
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: Option<String>,
}

/// One per-format record of a single item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatRecord {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub resolution: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tbr: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

/// One track of a caption language
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubtitleRecord {
    pub ext: Option<String>,
    pub name: Option<String>,
}

/// One entry of a flat collection listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub webpage_url: Option<String>,
}

/// Stage a progress callback belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Download,
    PostProcess,
}

/// Raw byte-level progress callback from the backend.
///
/// Size fields are kept as loose JSON values; the progress aggregator decides
/// what is usable.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressUpdate {
    #[serde(skip, default = "default_stage")]
    pub stage: ProgressStage,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub downloaded_bytes: Option<serde_json::Value>,
    #[serde(default)]
    pub total_bytes: Option<serde_json::Value>,
    #[serde(default)]
    pub total_bytes_estimate: Option<serde_json::Value>,
    #[serde(default)]
    pub postprocessor: Option<String>,
}

fn default_stage() -> ProgressStage {
    ProgressStage::Download
}

/// Something the backend reports while a retrieval is running
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Progress(ProgressUpdate),
    Message { level: Level, text: String },
}

/// Callback receiving backend events during a retrieval
pub type ProgressSink<'a> = &'a (dyn Fn(BackendEvent) + Send + Sync);

/// Extraction/retrieval capability consumed by the engine
#[async_trait]
pub trait Backend: Send + Sync {
    /// Lightweight, non-downloading metadata probe
    async fn probe_metadata(&self, url: &str) -> Result<MediaInfo, ExtractionError>;

    /// Full metadata of a single item, including formats and captions
    async fn fetch_single_metadata(&self, url: &str) -> Result<MediaInfo, ExtractionError>;

    /// Shallow listing of a collection's entries
    async fn fetch_flat_listing(&self, url: &str) -> Result<MediaInfo, ExtractionError>;

    /// Retrieve content to local storage, reporting progress through `sink`
    async fn retrieve(
        &self,
        url: &str,
        options: &RetrieveOptions,
        sink: ProgressSink<'_>,
    ) -> Result<(), ExtractionError>;
}
