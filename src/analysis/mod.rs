// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod captions;
mod renditions;

pub use captions::{CaptionTrack, CaptionTracks, NO_CAPTIONS, resolve_captions};
pub use renditions::{MAX_RENDITIONS, Rendition, VideoCodec, extract_renditions};

use crate::backend::{Backend, MediaInfo};
use crate::classify::classify;
use crate::error::AnalysisError;
use crate::events::{Event, SharedReporter};

const UNTITLED: &str = "Untitled";

/// One item of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    pub title: String,
    /// Never empty
    pub item_url: String,
}

/// Presentation-ready outcome of analyzing a URL
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Single {
        title: String,
        thumbnail_url: Option<String>,
        renditions: Vec<Rendition>,
        captions: CaptionTracks,
    },
    Collection {
        title: String,
        thumbnail_url: Option<String>,
        entries: Vec<CollectionEntry>,
    },
}

impl AnalysisResult {
    pub fn title(&self) -> &str {
        match self {
            Self::Single { title, .. } | Self::Collection { title, .. } => title,
        }
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        match self {
            Self::Single { thumbnail_url, .. } | Self::Collection { thumbnail_url, .. } => {
                thumbnail_url.as_deref()
            }
        }
    }
}

/// Build collection entries from a flat listing, dropping entries without URL
pub fn collection_entries(info: &MediaInfo) -> Vec<CollectionEntry> {
    info.entries
        .iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let item_url = entry
                .webpage_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .or_else(|| entry.url.as_deref().filter(|url| !url.is_empty()))?;

            Some(CollectionEntry {
                title: entry.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
                item_url: item_url.to_string(),
            })
        })
        .collect()
}

/// Analyze a URL: classify it, fetch its metadata, and report the results.
///
/// Classification problems never fail the analysis; only a failing metadata
/// fetch against the resolved URL does.
pub async fn analyze<B: Backend + ?Sized>(
    backend: &B,
    url: &str,
    reporter: &SharedReporter,
) -> Result<AnalysisResult, AnalysisError> {
    let classification = classify(backend, url, reporter).await;
    let target = classification.url();

    if classification.is_collection() {
        let info = backend
            .fetch_flat_listing(target)
            .await
            .map_err(|e| AnalysisError::FetchFailed {
                url: target.to_string(),
                source: e,
            })?;

        reporter.report(Event::status("Analyzing collection..."));

        let title = info.title.clone().unwrap_or_else(|| UNTITLED.to_string());
        let entries = collection_entries(&info);
        let count = entries.len();

        reporter.report(Event::Title(title.clone()));
        // Captions are chosen per entry later on, never at collection level.
        reporter.report(Event::CaptionOptions(CaptionTracks::none_only()));

        let result = AnalysisResult::Collection {
            title,
            thumbnail_url: info.thumbnail_url(),
            entries,
        };
        reporter.report(Event::AnalysisResult(result.clone()));
        reporter.report(Event::status(format!("Found {} items", count)));

        Ok(result)
    } else {
        let info = backend
            .fetch_single_metadata(target)
            .await
            .map_err(|e| AnalysisError::FetchFailed {
                url: target.to_string(),
                source: e,
            })?;

        reporter.report(Event::status("Analyzing formats..."));

        let title = info.title.clone().unwrap_or_else(|| UNTITLED.to_string());
        let renditions = extract_renditions(&info);
        let captions = resolve_captions(info.subtitles.as_ref());
        let count = renditions.len();

        reporter.report(Event::Title(title.clone()));
        reporter.report(Event::CaptionOptions(captions.clone()));

        let result = AnalysisResult::Single {
            title,
            thumbnail_url: info.thumbnail_url(),
            renditions,
            captions,
        };
        reporter.report(Event::AnalysisResult(result.clone()));
        reporter.report(Event::status(format!("Found {} formats", count)));

        Ok(result)
    }
}

/// Resolve the caption options of one collection entry.
///
/// A failed lookup is reported as a log line and yields only the "none"
/// option.
pub async fn fetch_entry_captions<B: Backend + ?Sized>(
    backend: &B,
    entry: &CollectionEntry,
    reporter: &SharedReporter,
) -> CaptionTracks {
    reporter.report(Event::status("Loading item details..."));

    let captions = match backend.fetch_single_metadata(&entry.item_url).await {
        Ok(info) => {
            reporter.report(Event::status("Item details loaded"));
            resolve_captions(info.subtitles.as_ref())
        }
        Err(e) => {
            reporter.report(Event::warning(format!(
                "Could not load details of '{}': {}",
                entry.title, e
            )));
            reporter.report(Event::status("Loading item details failed"));
            CaptionTracks::none_only()
        }
    };

    reporter.report(Event::CaptionOptions(captions.clone()));
    captions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::backend::mock::ScriptedBackend;
    use crate::backend::{EntryRecord, FormatRecord, SubtitleRecord};
    use crate::error::FailureKind;
    use crate::events::event_channel;

    const VIDEO: &str = "https://www.youtube.com/watch?v=abc";
    const PLAYLIST: &str = "https://www.youtube.com/playlist?list=PL1";

    fn entry(title: Option<&str>, url: Option<&str>, webpage_url: Option<&str>) -> Option<EntryRecord> {
        Some(EntryRecord {
            id: None,
            title: title.map(String::from),
            url: url.map(String::from),
            webpage_url: webpage_url.map(String::from),
        })
    }

    fn listing() -> MediaInfo {
        MediaInfo {
            title: Some("Demo Playlist".to_string()),
            thumbnail: Some("https://i/playlist.jpg".to_string()),
            entries: Some(vec![
                entry(Some("First"), Some("https://www.youtube.com/watch?v=1"), None),
                None,
                entry(Some("No URL"), None, None),
                entry(Some("Empty URL"), Some(""), None),
                entry(None, None, Some("https://www.youtube.com/watch?v=4")),
            ]),
            ..Default::default()
        }
    }

    fn single() -> MediaInfo {
        let mut subtitles = BTreeMap::new();
        subtitles.insert(
            "en".to_string(),
            vec![SubtitleRecord {
                ext: Some("vtt".to_string()),
                name: Some("English".to_string()),
            }],
        );

        MediaInfo {
            title: Some("Demo".to_string()),
            duration: Some(120.0),
            formats: Some(vec![
                FormatRecord {
                    format_id: Some("18".to_string()),
                    ext: Some("mp4".to_string()),
                    vcodec: Some("avc1.42001E".to_string()),
                    acodec: Some("mp4a.40.2".to_string()),
                    height: Some(360),
                    ..Default::default()
                },
                FormatRecord {
                    format_id: Some("137".to_string()),
                    ext: Some("mp4".to_string()),
                    vcodec: Some("avc1.640028".to_string()),
                    acodec: Some("none".to_string()),
                    height: Some(1080),
                    ..Default::default()
                },
            ]),
            subtitles: Some(subtitles),
            ..Default::default()
        }
    }

    #[test]
    fn entries_without_url_are_dropped() {
        let entries = collection_entries(&listing());

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| !e.item_url.is_empty()));
        assert_eq!(entries[0].title, "First");
        assert_eq!(entries[1].title, UNTITLED);
        assert_eq!(entries[1].item_url, "https://www.youtube.com/watch?v=4");
    }

    #[tokio::test]
    async fn collection_analysis_reports_entries() {
        let backend = ScriptedBackend::new().with_listing(PLAYLIST, Ok(listing()));
        let (reporter, mut rx) = event_channel();

        let result = analyze(&backend, PLAYLIST, &reporter.shared()).await.unwrap();

        match &result {
            AnalysisResult::Collection {
                title,
                thumbnail_url,
                entries,
            } => {
                assert_eq!(title, "Demo Playlist");
                assert_eq!(thumbnail_url.as_deref(), Some("https://i/playlist.jpg"));
                assert_eq!(entries.len(), 2);
            }
            other => panic!("Expected collection, got {:?}", other),
        }

        let events = rx.drain();
        assert!(events.iter().any(|e| matches!(e, Event::Title(t) if t == "Demo Playlist")));
        assert!(events.iter().any(
            |e| matches!(e, Event::CaptionOptions(c) if *c == CaptionTracks::none_only())
        ));
        assert!(events.iter().any(|e| matches!(e, Event::Status(s) if s == "Found 2 items")));
        assert!(events.iter().any(|e| matches!(e, Event::AnalysisResult(_))));
    }

    #[tokio::test]
    async fn single_analysis_reports_renditions_and_captions() {
        let backend = ScriptedBackend::new().with_single(VIDEO, Ok(single()));
        let (reporter, mut rx) = event_channel();

        let result = analyze(&backend, VIDEO, &reporter.shared()).await.unwrap();

        match &result {
            AnalysisResult::Single {
                title,
                renditions,
                captions,
                ..
            } => {
                assert_eq!(title, "Demo");
                assert_eq!(renditions.len(), 2);
                assert_eq!(renditions[0].height_px, 1080);
                assert_eq!(captions.code_for("English (manual)"), Some("en"));
            }
            other => panic!("Expected single, got {:?}", other),
        }

        let events = rx.drain();
        assert!(events.iter().any(|e| matches!(e, Event::Status(s) if s == "Found 2 formats")));
        assert!(events.iter().any(|e| matches!(e, Event::CaptionOptions(c) if c.offers_tracks())));
    }

    #[tokio::test]
    async fn channel_analysis_lists_uploads_collection() {
        let channel = "https://www.youtube.com/channel/UC1234567890123456789012";
        let uploads = "https://www.youtube.com/playlist?list=UU1234567890123456789012";
        let backend = ScriptedBackend::new()
            .with_probe(
                channel,
                Ok(MediaInfo {
                    channel_id: Some("UC1234567890123456789012".to_string()),
                    ..Default::default()
                }),
            )
            .with_listing(uploads, Ok(listing()));

        let result = analyze(&backend, channel, &crate::events::NoopReporter::shared())
            .await
            .unwrap();

        assert!(matches!(result, AnalysisResult::Collection { .. }));
        assert_eq!(
            backend.calls(),
            vec![format!("probe {}", channel), format!("listing {}", uploads)]
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_an_analysis_error() {
        let backend = ScriptedBackend::new().with_single(VIDEO, Err("Video unavailable"));

        let err = analyze(&backend, VIDEO, &crate::events::NoopReporter::shared())
            .await
            .unwrap_err();

        assert_eq!(err.backend_message(), "Video unavailable");
        assert_eq!(err.kind(), FailureKind::Extraction);
    }

    #[tokio::test]
    async fn degraded_channel_failure_reports_listing_error_only() {
        let channel = "https://www.youtube.com/@gone";
        let backend = ScriptedBackend::new()
            .with_probe(channel, Err("probe failed"))
            .with_listing("https://www.youtube.com/@gone/videos", Err("This channel does not exist"));

        let err = analyze(&backend, channel, &crate::events::NoopReporter::shared())
            .await
            .unwrap_err();

        assert_eq!(err.backend_message(), "This channel does not exist");
    }

    #[tokio::test]
    async fn entry_captions_fall_back_to_none_on_failure() {
        let backend = ScriptedBackend::new();
        let (reporter, mut rx) = event_channel();
        let entry = CollectionEntry {
            title: "Gone".to_string(),
            item_url: "https://www.youtube.com/watch?v=gone".to_string(),
        };

        let captions = fetch_entry_captions(&backend, &entry, &reporter.shared()).await;

        assert_eq!(captions, CaptionTracks::none_only());
        let events = rx.drain();
        assert!(events.iter().any(|e| matches!(e, Event::Log { .. })));
        assert!(!events.iter().any(|e| matches!(e, Event::Error(_))));
    }

    #[tokio::test]
    async fn entry_captions_resolve_from_item_metadata() {
        let backend = ScriptedBackend::new().with_single(VIDEO, Ok(single()));
        let entry = CollectionEntry {
            title: "Demo".to_string(),
            item_url: VIDEO.to_string(),
        };

        let captions =
            fetch_entry_captions(&backend, &entry, &crate::events::NoopReporter::shared()).await;

        assert_eq!(captions.code_for("English (manual)"), Some("en"));
    }
}
