// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use crate::backend::SubtitleRecord;

/// Label of the entry meaning "no captions requested"
pub const NO_CAPTIONS: &str = "none";

/// A caption option: a display label and the backend language code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub label: String,
    /// `None` only for the "no captions" entry
    pub code: Option<String>,
}

/// Caption options of an item, always starting with the "none" entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTracks {
    tracks: Vec<CaptionTrack>,
}

impl Default for CaptionTracks {
    fn default() -> Self {
        Self::none_only()
    }
}

impl CaptionTracks {
    /// Only the "no captions" entry
    pub fn none_only() -> Self {
        Self {
            tracks: vec![CaptionTrack {
                label: NO_CAPTIONS.to_string(),
                code: None,
            }],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaptionTrack> {
        self.tracks.iter()
    }

    /// True when anything besides the "none" entry is offered
    pub fn offers_tracks(&self) -> bool {
        self.tracks.len() > 1
    }

    /// Look up the code for a label; `None` for "none" or unknown labels
    pub fn code_for(&self, label: &str) -> Option<&str> {
        self.tracks
            .iter()
            .find(|track| track.label == label)
            .and_then(|track| track.code.as_deref())
    }

    /// Find a track by its display label or its language code
    pub fn find(&self, label_or_code: &str) -> Option<&CaptionTrack> {
        self.tracks.iter().find(|track| {
            track.label == label_or_code || track.code.as_deref() == Some(label_or_code)
        })
    }
}

/// Resolve the caption options of an item.
///
/// Only English and Chinese languages are offered, and a language is dropped
/// entirely if any of its tracks is auto-generated.
pub fn resolve_captions(subtitles: Option<&BTreeMap<String, Vec<SubtitleRecord>>>) -> CaptionTracks {
    let mut result = CaptionTracks::none_only();

    let Some(subtitles) = subtitles else {
        return result;
    };

    for (code, tracks) in subtitles {
        if !(code.starts_with("en") || code.starts_with("zh")) {
            continue;
        }

        let auto_generated = tracks.iter().any(|track| {
            track
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains("auto"))
        });
        if auto_generated {
            continue;
        }

        result.tracks.push(CaptionTrack {
            label: format!("{} (manual)", language_name(code)),
            code: Some(code.clone()),
        });
    }

    result
}

fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "zh-Hant" => "Traditional Chinese",
        "zh-Hans" => "Simplified Chinese",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str) -> SubtitleRecord {
        SubtitleRecord {
            ext: Some("vtt".to_string()),
            name: Some(name.to_string()),
        }
    }

    fn subtitles(entries: &[(&str, Vec<SubtitleRecord>)]) -> BTreeMap<String, Vec<SubtitleRecord>> {
        entries
            .iter()
            .map(|(code, tracks)| (code.to_string(), tracks.clone()))
            .collect()
    }

    #[test]
    fn sentinel_is_present_without_subtitles() {
        let tracks = resolve_captions(None);
        assert_eq!(tracks.iter().count(), 1);
        assert!(!tracks.offers_tracks());
        assert_eq!(tracks.iter().next().unwrap().label, NO_CAPTIONS);

        let tracks = resolve_captions(Some(&BTreeMap::new()));
        assert_eq!(tracks, CaptionTracks::none_only());
    }

    #[test]
    fn known_languages_get_display_names() {
        let raw = subtitles(&[
            ("en", vec![track("English")]),
            ("zh-Hant", vec![track("Chinese (Traditional)")]),
            ("zh-Hans", vec![track("Chinese (Simplified)")]),
            ("en-GB", vec![track("English (UK)")]),
        ]);

        let tracks = resolve_captions(Some(&raw));

        assert_eq!(tracks.iter().count(), 5);
        assert!(tracks.offers_tracks());
        assert_eq!(tracks.code_for("English (manual)"), Some("en"));
        assert_eq!(tracks.code_for("Traditional Chinese (manual)"), Some("zh-Hant"));
        assert_eq!(tracks.code_for("Simplified Chinese (manual)"), Some("zh-Hans"));
        assert_eq!(tracks.code_for("en-GB (manual)"), Some("en-GB"));
        assert_eq!(tracks.code_for(NO_CAPTIONS), None);
    }

    #[test]
    fn other_languages_are_ignored() {
        let raw = subtitles(&[("de", vec![track("German")]), ("ja", vec![track("Japanese")])]);

        assert_eq!(resolve_captions(Some(&raw)), CaptionTracks::none_only());
    }

    #[test]
    fn auto_generated_languages_are_excluded() {
        let raw = subtitles(&[
            ("en", vec![track("English"), track("English (Auto-generated)")]),
            ("zh-Hans", vec![track("Chinese")]),
        ]);

        let tracks = resolve_captions(Some(&raw));

        assert_eq!(tracks.iter().count(), 2);
        assert!(tracks.find("en").is_none());
        assert_eq!(
            tracks.find("zh-Hans").map(|t| t.label.as_str()),
            Some("Simplified Chinese (manual)")
        );
    }

    #[test]
    fn sentinel_stays_first() {
        let raw = subtitles(&[("en", vec![track("English")])]);

        let first = resolve_captions(Some(&raw)).iter().next().cloned().unwrap();

        assert_eq!(first.label, NO_CAPTIONS);
        assert_eq!(first.code, None);
    }
}
