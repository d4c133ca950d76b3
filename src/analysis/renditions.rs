// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use crate::backend::{FormatRecord, MediaInfo};

/// Maximum number of renditions offered for one item
pub const MAX_RENDITIONS: usize = 30;

/// Normalized video codec of a rendition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoCodec {
    Vp9,
    Av1,
    H264,
    /// Any other codec, passed through as reported (lowercased)
    Other(String),
}

impl VideoCodec {
    /// Normalize a backend codec string; `None` for missing or `none`
    pub fn normalize(raw: &str) -> Option<Self> {
        let codec = raw.trim().to_lowercase();
        if codec.is_empty() || codec == "none" {
            return None;
        }

        Some(if codec.starts_with("vp09") || codec == "vp9" {
            Self::Vp9
        } else if codec.starts_with("av01") {
            Self::Av1
        } else if codec.starts_with("avc1") {
            Self::H264
        } else {
            Self::Other(codec)
        })
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vp9 => write!(f, "vp9"),
            Self::Av1 => write!(f, "av1"),
            Self::H264 => write!(f, "h264"),
            Self::Other(codec) => write!(f, "{}", codec),
        }
    }
}

/// One selectable quality/format variant of a single item
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub resolution_label: String,
    pub video_codec: VideoCodec,
    pub bitrate_kbps: Option<f64>,
    pub has_embedded_audio: bool,
    pub height_px: u32,
    pub approx_size_bytes: Option<u64>,
    pub format_id: String,
}

impl Rendition {
    /// Size for display, e.g. `12.3 MB`
    pub fn size_label(&self) -> String {
        match self.approx_size_bytes {
            Some(bytes) => format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0),
            None => "unknown".to_string(),
        }
    }
}

/// Build the rendition list of an item.
///
/// Only mp4 records with a video track are kept. The result is sorted by
/// height, tallest first, and capped at [`MAX_RENDITIONS`]; the first entry
/// is the default selection.
pub fn extract_renditions(info: &MediaInfo) -> Vec<Rendition> {
    let Some(formats) = info.formats.as_deref() else {
        return Vec::new();
    };

    let mut renditions: Vec<Rendition> = formats
        .iter()
        .filter_map(|format| to_rendition(format, info.duration))
        .collect();

    // Stable sort keeps backend order among equal heights.
    renditions.sort_by(|a, b| b.height_px.cmp(&a.height_px));
    renditions.truncate(MAX_RENDITIONS);
    renditions
}

fn to_rendition(format: &FormatRecord, duration: Option<f64>) -> Option<Rendition> {
    if format.ext.as_deref() != Some("mp4") {
        return None;
    }

    let video_codec = VideoCodec::normalize(format.vcodec.as_deref()?)?;

    let resolution_label = format.resolution.clone().unwrap_or_else(|| {
        let width = format.width.map_or("?".to_string(), |w| w.to_string());
        let height = format.height.map_or("?".to_string(), |h| h.to_string());
        format!("{}x{}", width, height)
    });
    if resolution_label == "audio only" {
        return None;
    }

    let has_embedded_audio = format
        .acodec
        .as_deref()
        .is_some_and(|codec| !codec.is_empty() && codec != "none");

    Some(Rendition {
        resolution_label,
        video_codec,
        bitrate_kbps: format.tbr,
        has_embedded_audio,
        height_px: format.height.unwrap_or(0),
        approx_size_bytes: approx_size(format, duration),
        format_id: format.format_id.clone().unwrap_or_default(),
    })
}

/// Declared size, or an estimate from bitrate and duration
fn approx_size(format: &FormatRecord, duration: Option<f64>) -> Option<u64> {
    let declared = format
        .filesize
        .or(format.filesize_approx)
        .filter(|size| *size > 0.0);

    let size = declared.or_else(|| match (format.tbr, duration) {
        (Some(kbps), Some(seconds)) if kbps > 0.0 && seconds > 0.0 => {
            Some(kbps * seconds * 1000.0 / 8.0)
        }
        _ => None,
    })?;

    Some(size.round() as u64)
}
