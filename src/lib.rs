// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod analysis;
pub mod backend;
pub mod classify;
pub mod config;
pub mod download;
pub mod error;
pub mod events;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod session;

// Re-export main types for convenience
pub use analysis::{AnalysisResult, CaptionTracks, CollectionEntry, Rendition, analyze};
pub use backend::{Backend, YtDlp};
pub use classify::{Classification, classify};
pub use config::Config;
pub use download::{Batch, BatchKind, BatchSummary, DownloadJob, MediaSelection, download_batch};
pub use error::{
    AnalysisError, ConfigError, DownloadError, ExtractionError, FailureKind, StartError,
};
pub use events::{
    Event, EventReceiver, NoopReporter, Reporter, SharedReporter, UiState, event_channel,
};
pub use retry::RetryPolicy;
pub use session::Session;
