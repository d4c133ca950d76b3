// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use serde::Deserialize;

/// Captions to fetch alongside the media
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptionRequest {
    /// Backend language codes, e.g. `en` or `zh-Hant`
    pub languages: Vec<String>,
    /// Caption file format, e.g. `vtt`
    pub format: String,
}

/// Extract the audio track and transcode it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioExtraction {
    /// Target codec, e.g. `mp3`
    pub codec: String,
    /// Codec quality, e.g. `192` (kbps)
    pub quality: String,
}

/// Everything a retrieval call recognizes.
///
/// Deserializing from an unknown key is an error, so misspelled options never
/// get silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrieveOptions {
    /// Absolute directory the output lands in
    pub output_directory: PathBuf,
    /// Backend naming template relative to `output_directory`
    pub output_template: String,
    /// Format/rendition selector expression
    pub format_selector: String,
    /// Container used when two streams are merged
    #[serde(default)]
    pub merge_container: Option<String>,
    #[serde(default)]
    pub captions: Option<CaptionRequest>,
    #[serde(default)]
    pub audio_extraction: Option<AudioExtraction>,
    /// Location of the muxing/transcoding tool used by the backend
    #[serde(default)]
    pub tool_location: Option<PathBuf>,
}

impl RetrieveOptions {
    pub fn new(
        output_directory: impl Into<PathBuf>,
        output_template: impl Into<String>,
        format_selector: impl Into<String>,
    ) -> Self {
        Self {
            output_directory: output_directory.into(),
            output_template: output_template.into(),
            format_selector: format_selector.into(),
            merge_container: None,
            captions: None,
            audio_extraction: None,
            tool_location: None,
        }
    }

    /// Render as yt-dlp command line arguments (without the URL)
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.format_selector.clone(),
            "-P".to_string(),
            self.output_directory.to_string_lossy().into_owned(),
            "-o".to_string(),
            self.output_template.clone(),
        ];

        if let Some(container) = &self.merge_container {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        if let Some(captions) = &self.captions {
            args.push("--write-subs".to_string());
            args.push("--sub-langs".to_string());
            args.push(captions.languages.join(","));
            args.push("--sub-format".to_string());
            args.push(captions.format.clone());
        }

        if let Some(audio) = &self.audio_extraction {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push(audio.codec.clone());
            args.push("--audio-quality".to_string());
            args.push(format!("{}K", audio.quality));
        }

        if let Some(location) = &self.tool_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().into_owned());
        }

        args
    }
}
