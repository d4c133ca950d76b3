// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Download jobs, output naming and the batch orchestrator

mod batch;
mod job;
mod naming;

pub use batch::{BatchSummary, DownloadSettings, FailedItem, download_batch};
pub use job::{
    Batch, BatchKind, COLLECTION_MAX_HEIGHT, DownloadJob, MediaSelection, parse_selection,
};
pub use naming::{output_name, output_template, truncate_title};
