// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::analysis::{CollectionEntry, Rendition};
use crate::backend::{AudioExtraction, CaptionRequest, RetrieveOptions};
use crate::error::StartError;

use super::naming::output_template;

/// Height cap applied to every job of a collection download
pub const COLLECTION_MAX_HEIGHT: u32 = 1080;

const BEST_AUDIO: &str = "bestaudio[ext=m4a]/bestaudio";
const MERGE_CONTAINER: &str = "mp4";
const CAPTION_FORMAT: &str = "vtt";
const AUDIO_CODEC: &str = "mp3";
const AUDIO_QUALITY: &str = "192";

/// What to retrieve for one item
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSelection {
    /// A specific rendition chosen from the analysis
    Rendition(Rendition),
    /// Best compatible video up to a height, with best audio
    BestUpTo { max_height: u32 },
    /// Audio only, transcoded at a fixed quality
    AudioOnly,
}

impl MediaSelection {
    /// Choose for a single item from its analyzed renditions.
    ///
    /// Audio wins over `format_id`. Without either, the highest rendition is
    /// taken; an item with no compatible renditions needs an explicit choice.
    pub fn for_single(
        renditions: &[Rendition],
        audio_only: bool,
        format_id: Option<&str>,
    ) -> Result<Self, StartError> {
        if audio_only {
            return Ok(Self::AudioOnly);
        }

        match format_id {
            Some(id) => renditions
                .iter()
                .find(|r| r.format_id == id)
                .cloned()
                .map(Self::Rendition)
                .ok_or_else(|| StartError::UnknownFormat(id.to_string())),
            None => renditions
                .first()
                .cloned()
                .map(Self::Rendition)
                .ok_or(StartError::NoCompatibleFormats),
        }
    }

    /// Backend format selector expression
    pub fn format_selector(&self) -> String {
        match self {
            Self::Rendition(rendition) if rendition.has_embedded_audio => {
                rendition.format_id.clone()
            }
            Self::Rendition(rendition) => format!("{}+{}", rendition.format_id, BEST_AUDIO),
            Self::BestUpTo { max_height } => format!(
                "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                h = max_height
            ),
            Self::AudioOnly => BEST_AUDIO.to_string(),
        }
    }

    /// Height used in the output name; 0 when unknown
    pub fn target_height(&self) -> u32 {
        match self {
            Self::Rendition(rendition) => rendition.height_px,
            Self::BestUpTo { max_height } => *max_height,
            Self::AudioOnly => 0,
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::AudioOnly)
    }

    /// True when the backend has to merge separate video and audio streams
    pub fn needs_merge(&self) -> bool {
        matches!(self, Self::Rendition(rendition) if !rendition.has_embedded_audio)
    }
}

/// One item to retrieve
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub target_url: String,
    pub title: String,
    pub selection: MediaSelection,
    pub caption_code: Option<String>,
    /// Absolute directory the output lands in
    pub output_directory: PathBuf,
}

impl DownloadJob {
    pub fn rendition(&self) -> Option<&Rendition> {
        match &self.selection {
            MediaSelection::Rendition(rendition) => Some(rendition),
            _ => None,
        }
    }

    /// Options for the backend's retrieve call
    pub fn retrieve_options(&self, tool_location: Option<&Path>) -> RetrieveOptions {
        let mut options = RetrieveOptions::new(
            self.output_directory.clone(),
            output_template(self.selection.target_height()),
            self.selection.format_selector(),
        );

        if self.selection.is_audio_only() {
            options.audio_extraction = Some(AudioExtraction {
                codec: AUDIO_CODEC.to_string(),
                quality: AUDIO_QUALITY.to_string(),
            });
        } else {
            options.merge_container = Some(MERGE_CONTAINER.to_string());
        }

        options.captions = self.caption_code.as_ref().map(|code| CaptionRequest {
            languages: vec![code.clone()],
            format: CAPTION_FORMAT.to_string(),
        });
        options.tool_location = tool_location.map(Path::to_path_buf);
        options
    }
}

/// How failures inside a batch are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// One ordinary item; any failure fails the whole batch
    Single,
    /// Chosen collection entries; failures are counted and skipped
    Collection,
}

/// Ordered jobs of one orchestrator run
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub kind: BatchKind,
    pub jobs: Vec<DownloadJob>,
}

impl Batch {
    pub fn single(job: DownloadJob) -> Self {
        Self {
            kind: BatchKind::Single,
            jobs: vec![job],
        }
    }

    /// One job per selected entry, in `selected` order, sharing a capped
    /// video selection and the caption choice.
    pub fn collection(
        entries: &[CollectionEntry],
        selected: &[usize],
        caption_code: Option<&str>,
        output_directory: &Path,
    ) -> Result<Self, StartError> {
        if selected.is_empty() {
            return Err(StartError::NothingSelected);
        }

        let jobs = selected
            .iter()
            .map(|&index| {
                let entry = entries.get(index).ok_or(StartError::EntryOutOfRange {
                    index: index + 1,
                    len: entries.len(),
                })?;
                Ok(DownloadJob {
                    target_url: entry.item_url.clone(),
                    title: entry.title.clone(),
                    selection: MediaSelection::BestUpTo {
                        max_height: COLLECTION_MAX_HEIGHT,
                    },
                    caption_code: caption_code.map(String::from),
                    output_directory: output_directory.to_path_buf(),
                })
            })
            .collect::<Result<Vec<_>, StartError>>()?;

        Ok(Self {
            kind: BatchKind::Collection,
            jobs,
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Parse a 1-based entry selection such as `1,3-5` or `all`.
///
/// Returns 0-based indices in listing order without duplicates.
pub fn parse_selection(input: &str, len: usize) -> Result<Vec<usize>, StartError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Ok((0..len).collect());
    }

    let mut chosen = vec![false; len];

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_index(start, input)?, parse_index(end, input)?),
            None => {
                let index = parse_index(part, input)?;
                (index, index)
            }
        };

        if start > end {
            return Err(StartError::InvalidSelection(input.to_string()));
        }

        for index in start..=end {
            if index == 0 || index > len {
                return Err(StartError::EntryOutOfRange { index, len });
            }
            chosen[index - 1] = true;
        }
    }

    let indices: Vec<usize> = chosen
        .iter()
        .enumerate()
        .filter_map(|(i, &picked)| picked.then_some(i))
        .collect();

    if indices.is_empty() {
        return Err(StartError::NothingSelected);
    }
    Ok(indices)
}

fn parse_index(raw: &str, input: &str) -> Result<usize, StartError> {
    raw.trim()
        .parse()
        .map_err(|_| StartError::InvalidSelection(input.to_string()))
}
