// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::backend::Backend;
use crate::error::FailureKind;
use crate::events::{Event, SharedReporter};

/// Channel, user and custom-handle path segments
static CHANNEL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(channel|user|c/|@)").expect("valid channel regex"));

/// Prefix of canonical channel identifiers
const CHANNEL_ID_PREFIX: &str = "UC";
/// Prefix of the channel's uploads collection identifier
const UPLOADS_ID_PREFIX: &str = "UU";
/// Query parameter that identifies a collection
const COLLECTION_PARAM: &str = "list";
/// Path appended when the uploads collection cannot be resolved
const VIDEOS_SUFFIX: &str = "/videos";

/// How an input URL is going to be analyzed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A single media item
    Single(String),
    /// A URL that names a collection directly
    ExplicitCollection(String),
    /// A channel URL resolved into a collection URL.
    ///
    /// `degraded` is set when the canonical uploads collection could not be
    /// resolved and the videos listing of the channel page is used instead.
    ChannelHeuristic { url: String, degraded: bool },
}

impl Classification {
    /// The URL metadata should be fetched from
    pub fn url(&self) -> &str {
        match self {
            Self::Single(url) | Self::ExplicitCollection(url) => url,
            Self::ChannelHeuristic { url, .. } => url,
        }
    }

    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::Single(_))
    }

    /// [`FailureKind::ClassificationDegraded`] when the fallback was used
    pub fn degradation(&self) -> Option<FailureKind> {
        matches!(self, Self::ChannelHeuristic { degraded: true, .. })
            .then_some(FailureKind::ClassificationDegraded)
    }
}

/// Check whether a URL carries a collection-identifying query parameter
pub fn is_collection_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.query_pairs().any(|(key, _)| key == COLLECTION_PARAM),
        Err(_) => url.contains("list="),
    }
}

/// Check whether a URL points at a channel, user or handle page
pub fn is_channel_url(url: &str) -> bool {
    CHANNEL_PATH.is_match(url)
}

/// Map a canonical channel identifier to its uploads collection identifier.
///
/// Returns `None` for identifiers without the canonical channel prefix.
pub fn uploads_collection_id(channel_id: &str) -> Option<String> {
    channel_id
        .strip_prefix(CHANNEL_ID_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(|rest| format!("{}{}", UPLOADS_ID_PREFIX, rest))
}

pub fn collection_url(collection_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={}", collection_id)
}

/// Decide how `url` is going to be analyzed.
///
/// Channel URLs cost one lightweight probe. A failing probe is never an
/// error here: it degrades to the channel's videos listing with a warning.
pub async fn classify<B: Backend + ?Sized>(
    backend: &B,
    url: &str,
    reporter: &SharedReporter,
) -> Classification {
    if is_collection_url(url) {
        reporter.report(Event::info("Collection URL detected, scanning..."));
        return Classification::ExplicitCollection(url.to_string());
    }

    if !is_channel_url(url) {
        reporter.report(Event::info(
            "Single item URL detected, fetching details...",
        ));
        return Classification::Single(url.to_string());
    }

    reporter.report(Event::info(
        "Channel URL detected, resolving its uploads collection...",
    ));

    let resolved = match backend.probe_metadata(url).await {
        Ok(info) => info
            .channel_id
            .or(info.id)
            .ok_or_else(|| "probe returned no channel identifier".to_string())
            .and_then(|id| {
                uploads_collection_id(&id)
                    .ok_or_else(|| format!("'{}' is not a valid channel identifier", id))
            }),
        Err(e) => Err(e.to_string()),
    };

    match resolved {
        Ok(uploads_id) => {
            let url = collection_url(&uploads_id);
            reporter.report(Event::info(format!(
                "Resolved uploads collection, scanning {}",
                url
            )));
            Classification::ChannelHeuristic {
                url,
                degraded: false,
            }
        }
        Err(reason) => {
            reporter.report(Event::warning(format!(
                "Could not resolve the uploads collection ({}).",
                reason
            )));
            reporter.report(Event::warning(
                "Falling back to the channel's videos page, which may be incomplete.",
            ));
            Classification::ChannelHeuristic {
                url: format!("{}{}", url.trim_end_matches('/'), VIDEOS_SUFFIX),
                degraded: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MediaInfo;
    use crate::backend::mock::ScriptedBackend;
    use crate::events::event_channel;
    use log::Level;

    const CHANNEL: &str = "https://www.youtube.com/@demo";

    fn probe(channel_id: Option<&str>, id: Option<&str>) -> MediaInfo {
        MediaInfo {
            channel_id: channel_id.map(String::from),
            id: id.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn detects_collection_parameter() {
        assert!(is_collection_url("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_collection_url(
            "https://www.youtube.com/watch?v=abc&list=PL123"
        ));
        assert!(!is_collection_url("https://www.youtube.com/watch?v=abc"));
        assert!(!is_collection_url("https://www.youtube.com/watch?v=abc&playlist=x"));
    }

    #[test]
    fn detects_channel_paths() {
        assert!(is_channel_url("https://www.youtube.com/channel/UC123"));
        assert!(is_channel_url("https://www.youtube.com/user/someone"));
        assert!(is_channel_url("https://www.youtube.com/c/Custom"));
        assert!(is_channel_url("https://www.youtube.com/@Handle"));
        assert!(is_channel_url("https://www.youtube.com/CHANNEL/UC123"));
        assert!(!is_channel_url("https://www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn uploads_id_replaces_channel_prefix() {
        assert_eq!(
            uploads_collection_id("UC1234567890123456789012").as_deref(),
            Some("UU1234567890123456789012")
        );
        assert_eq!(uploads_collection_id("HC123"), None);
        assert_eq!(uploads_collection_id("UC"), None);
    }

    #[tokio::test]
    async fn single_item_needs_no_probe() {
        let backend = ScriptedBackend::new();
        let (reporter, mut rx) = event_channel();

        let result = classify(
            &backend,
            "https://www.youtube.com/watch?v=abc",
            &reporter.shared(),
        )
        .await;

        assert_eq!(
            result,
            Classification::Single("https://www.youtube.com/watch?v=abc".to_string())
        );
        assert!(backend.calls().is_empty());
        assert!(matches!(rx.drain().as_slice(), [Event::Log { .. }]));
    }

    #[tokio::test]
    async fn collection_wins_over_channel_path() {
        let backend = ScriptedBackend::new();
        let url = "https://www.youtube.com/@demo/playlist?list=PL1";

        let result = classify(&backend, url, &crate::events::NoopReporter::shared()).await;

        assert_eq!(result, Classification::ExplicitCollection(url.to_string()));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn channel_resolves_to_uploads_collection() {
        let backend = ScriptedBackend::new()
            .with_probe(CHANNEL, Ok(probe(Some("UC1234567890123456789012"), None)));
        let (reporter, mut rx) = event_channel();

        let result = classify(&backend, CHANNEL, &reporter.shared()).await;

        assert_eq!(
            result,
            Classification::ChannelHeuristic {
                url: "https://www.youtube.com/playlist?list=UU1234567890123456789012".to_string(),
                degraded: false,
            }
        );
        assert_eq!(backend.calls(), vec![format!("probe {}", CHANNEL)]);
        assert_eq!(result.degradation(), None);

        let events = rx.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Log { level: Level::Info, message } if message.starts_with("Resolved uploads collection")
        )));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, Event::Log { level: Level::Warn, .. }))
        );
    }

    #[tokio::test]
    async fn channel_id_falls_back_to_record_id() {
        let backend = ScriptedBackend::new()
            .with_probe(CHANNEL, Ok(probe(None, Some("UCabcdefghijklmnopqrstuv"))));

        let result = classify(&backend, CHANNEL, &crate::events::NoopReporter::shared()).await;

        assert_eq!(
            result.url(),
            "https://www.youtube.com/playlist?list=UUabcdefghijklmnopqrstuv"
        );
    }

    #[tokio::test]
    async fn failing_probe_degrades_to_videos_listing() {
        let backend = ScriptedBackend::new().with_probe(CHANNEL, Err("HTTP Error 404"));
        let (reporter, mut rx) = event_channel();

        let result = classify(&backend, &format!("{}/", CHANNEL), &reporter.shared()).await;

        assert_eq!(
            result,
            Classification::ChannelHeuristic {
                url: format!("{}/videos", CHANNEL),
                degraded: true,
            }
        );
        assert!(result.is_collection());
        assert_eq!(
            result.degradation(),
            Some(FailureKind::ClassificationDegraded)
        );
        assert!(
            rx.drain()
                .iter()
                .any(|e| matches!(e, Event::Log { level: Level::Warn, .. }))
        );
    }

    #[tokio::test]
    async fn unusable_identifier_degrades_to_videos_listing() {
        let backend = ScriptedBackend::new().with_probe(CHANNEL, Ok(probe(Some("demo"), None)));

        let result = classify(&backend, CHANNEL, &crate::events::NoopReporter::shared()).await;

        assert_eq!(
            result,
            Classification::ChannelHeuristic {
                url: format!("{}/videos", CHANNEL),
                degraded: true,
            }
        );
    }

    #[tokio::test]
    async fn missing_identifier_degrades_to_videos_listing() {
        let backend = ScriptedBackend::new().with_probe(CHANNEL, Ok(probe(None, None)));

        let result = classify(&backend, CHANNEL, &crate::events::NoopReporter::shared()).await;

        assert_eq!(result.url(), format!("{}/videos", CHANNEL));
    }
}
